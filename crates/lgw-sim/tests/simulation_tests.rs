//! Integration tests for the virtual network
//!
//! These tests run node actors and the RX poller against a concentrator on a
//! manual clock, with tokio time paused.

use std::time::Duration;

use lgw_hal::{Concentrator, CrcStatus, HalError, ManualClock, RxPacket, SpreadingFactor, TxMode};
use lgw_sim::medium::{demod_snr_floor_db, path_loss_db};
use lgw_sim::{
    downlink_for, eu868_plan, run_rx_poller_task, run_virtual_node_task, NodeCommand, NodeConfig,
    NodeEvent, PollerCommand, RadioMedium, VirtualNode,
};
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn running() -> (Concentrator, ManualClock) {
        let clock = ManualClock::new();
        let conc = Concentrator::with_clock(clock.clone());
        eu868_plan().apply(&conc).unwrap();
        conc.start().unwrap();
        (conc, clock)
    }

    /// Spawn every node of the stock plan and the poller, then collect
    /// `count` packets
    pub async fn collect_uplinks(conc: &Concentrator, count: usize) -> Vec<RxPacket> {
        let plan = eu868_plan();
        let (event_tx, _event_rx) = broadcast::channel::<NodeEvent>(64);
        let mut node_cmds = Vec::new();
        for cfg in &plan.nodes {
            let (cmd_tx, cmd_rx) = mpsc::channel(4);
            tokio::spawn(run_virtual_node_task(
                VirtualNode::from_config(cfg.clone()).unwrap(),
                conc.clone(),
                RadioMedium::new(),
                Duration::from_secs(10),
                cmd_rx,
                event_tx.clone(),
            ));
            node_cmds.push(cmd_tx);
        }

        let (poll_tx, poll_rx) = mpsc::channel(1);
        let (packet_tx, mut packet_rx) = mpsc::channel(16);
        let poller = tokio::spawn(run_rx_poller_task(
            conc.clone(),
            Duration::from_millis(100),
            poll_rx,
            packet_tx,
        ));

        let mut packets = Vec::new();
        while packets.len() < count {
            let packet = tokio::time::timeout(Duration::from_secs(5), packet_rx.recv())
                .await
                .unwrap()
                .unwrap();
            packets.push(packet);
        }

        for cmd_tx in node_cmds {
            cmd_tx.send(NodeCommand::Shutdown).await.unwrap();
        }
        poll_tx.send(PollerCommand::Shutdown).await.unwrap();
        poller.await.unwrap().unwrap();
        packets
    }

    pub fn dev_addr(packet: &RxPacket) -> u32 {
        u32::from_le_bytes(packet.payload[1..5].try_into().unwrap())
    }
}

use helpers::*;

// ============================================================================
// Uplink Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_stock_node_heard() {
    let (conc, _clock) = running();
    let mut packets = collect_uplinks(&conc, 4).await;
    packets.sort_by_key(dev_addr);

    for (i, packet) in packets.iter().enumerate() {
        assert_eq!(dev_addr(packet), 0x2601_1000 + i as u32);
        assert_eq!(packet.status, CrcStatus::Ok);
        assert!(packet.if_chain <= 2, "join channels live on radio 1");
        assert_eq!(packet.rf_chain, 1);

        // calibrated RSSI matches the link budget
        let expected = 14.0 - path_loss_db(500.0 * (i + 1) as f32);
        assert!((packet.rssi - expected).abs() < 0.5, "{} vs {}", packet.rssi, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_uplink_acknowledged_with_downlink() {
    let (conc, clock) = running();
    clock.advance(5_000);
    let packets = collect_uplinks(&conc, 2).await;

    let first = downlink_for(&packets[0], 1_000_000).unwrap();
    let TxMode::Timestamped { count_us } = first.tx_mode else {
        panic!("downlink must be timestamped");
    };
    assert_eq!(count_us, packets[0].count_us + 1_000_000);
    assert_eq!(conc.send(first).unwrap(), count_us);
    assert!(conc.tx_in_flight().is_some());

    // a single TX slot: the second answer has to wait
    let second = downlink_for(&packets[1], 1_000_000).unwrap();
    assert!(matches!(conc.send(second), Err(HalError::Busy)));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_reach_node_never_heard() {
    let (conc, _clock) = running();
    let (event_tx, mut event_rx) = broadcast::channel(8);
    let (_cmd_tx, cmd_rx) = mpsc::channel(4);
    let far = NodeConfig {
        distance_m: 50_000.0,
        ..Default::default()
    };
    let handle = tokio::spawn(run_virtual_node_task(
        VirtualNode::from_config(far).unwrap(),
        conc.clone(),
        RadioMedium::new(),
        Duration::from_secs(10),
        cmd_rx,
        event_tx,
    ));

    let event = event_rx.recv().await.unwrap();
    assert!(matches!(event, NodeEvent::Uplink { fcnt: 0, .. }));
    assert_eq!(conc.rx_pending(), 0);
    handle.abort();
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use lgw_hal::{Bandwidth, CodeRate};
    use lgw_sim::Uplink;
    use proptest::prelude::*;

    fn sf_strategy() -> impl Strategy<Value = SpreadingFactor> {
        prop_oneof![
            Just(SpreadingFactor::Sf7),
            Just(SpreadingFactor::Sf8),
            Just(SpreadingFactor::Sf9),
            Just(SpreadingFactor::Sf10),
            Just(SpreadingFactor::Sf11),
            Just(SpreadingFactor::Sf12),
        ]
    }

    fn uplink(sf: SpreadingFactor) -> Uplink {
        Uplink {
            node_id: "prop".into(),
            dev_addr: 0,
            fcnt: 0,
            freq_hz: 868_100_000,
            spreading_factor: sf,
            bandwidth: Bandwidth::Khz125,
            coderate: CodeRate::Cr4_5,
            tx_power_dbm: 14,
            airtime_us: 0,
            payload: vec![1, 2, 3],
        }
    }

    proptest! {
        /// Whatever is delivered is above the demodulator floor
        #[test]
        fn delivered_frames_above_floor(sf in sf_strategy(), distance in 1.0f32..100_000.0) {
            let config = eu868_plan().to_config_store().unwrap();
            if let Ok(frame) = RadioMedium::new().deliver(&uplink(sf), distance, &config) {
                prop_assert!(frame.snr >= demod_snr_floor_db(sf));
            }
        }

        /// Path loss grows with distance
        #[test]
        fn path_loss_monotonic(a in 1.0f32..100_000.0, b in 1.0f32..100_000.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(path_loss_db(near) <= path_loss_db(far));
        }
    }
}
