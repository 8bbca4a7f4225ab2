//! RX poller task
//!
//! Drains the concentrator's RX FIFO on a fixed period, the way a packet
//! forwarder polls `receive`, and forwards every packet on a channel.

use std::time::Duration;

use lgw_hal::{Concentrator, RxPacket, RX_FIFO_CAPACITY};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::error::SimError;

/// Commands that can be sent to the poller
#[derive(Debug, Clone)]
pub enum PollerCommand {
    /// Change the polling period
    SetPeriod(Duration),
    /// Shutdown the poller
    Shutdown,
}

/// Run the RX poller task
///
/// Ends on `Shutdown` or when the command channel closes. Fails with
/// [`SimError::ChannelClosed`] when nobody listens for packets anymore.
pub async fn run_rx_poller_task(
    concentrator: Concentrator,
    period: Duration,
    mut cmd_rx: mpsc::Receiver<PollerCommand>,
    packet_tx: mpsc::Sender<RxPacket>,
) -> Result<(), SimError> {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut forwarded: u64 = 0;

    info!("Starting RX poller every {:?}", period);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let batch = concentrator.receive(RX_FIFO_CAPACITY as u8);
                if batch.len() > 0 {
                    trace!("polled {} packet(s)", batch.len());
                }
                for packet in batch {
                    if packet_tx.send(packet).await.is_err() {
                        return Err(SimError::ChannelClosed("rx packets"));
                    }
                    forwarded += 1;
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PollerCommand::SetPeriod(p)) => {
                        debug!("RX poll period set to {:?}", p);
                        timer = interval(p);
                        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                    Some(PollerCommand::Shutdown) | None => break,
                }
            }
        }
    }

    info!("RX poller ended after {} packet(s)", forwarded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::eu868_plan;
    use lgw_hal::{CodeRate, CrcStatus, ManualClock, RxFrame, SpreadingFactor};

    fn frame(if_chain: u8) -> RxFrame {
        RxFrame {
            if_chain,
            raw_rssi: 50.0,
            snr: 7.0,
            spreading_factor: Some(SpreadingFactor::Sf9),
            coderate: CodeRate::Cr4_5,
            status: CrcStatus::Ok,
            crc: 0,
            payload: vec![0xAA; 4],
        }
    }

    fn running_concentrator() -> Concentrator {
        let conc = Concentrator::with_clock(ManualClock::new());
        eu868_plan().apply(&conc).unwrap();
        conc.start().unwrap();
        conc
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_fifo_contents() {
        let conc = running_concentrator();
        for chain in [0, 3, 5] {
            assert!(conc.inject(frame(chain)).unwrap());
        }
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (packet_tx, mut packet_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_rx_poller_task(
            conc.clone(),
            Duration::from_millis(100),
            cmd_rx,
            packet_tx,
        ));

        let chains: Vec<u8> = [
            packet_rx.recv().await.unwrap(),
            packet_rx.recv().await.unwrap(),
            packet_rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|p| p.if_chain)
        .collect();
        assert_eq!(chains, vec![0, 3, 5]);
        assert_eq!(conc.rx_pending(), 0);

        cmd_tx.send(PollerCommand::Shutdown).await.unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_packets_picked_up() {
        let conc = running_concentrator();
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let (packet_tx, mut packet_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_rx_poller_task(
            conc.clone(),
            Duration::from_millis(100),
            cmd_rx,
            packet_tx,
        ));

        tokio::time::sleep(Duration::from_millis(250)).await;
        conc.inject(frame(2)).unwrap();
        let packet = tokio::time::timeout(Duration::from_secs(1), packet_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(packet.if_chain, 2);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_concentrator_polls_nothing() {
        let conc = running_concentrator();
        conc.inject(frame(0)).unwrap();
        conc.stop().unwrap();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (packet_tx, mut packet_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_rx_poller_task(
            conc,
            Duration::from_millis(10),
            cmd_rx,
            packet_tx,
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(packet_rx.try_recv().is_err());
        drop(cmd_tx);
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_listener_ends_poller() {
        let conc = running_concentrator();
        conc.inject(frame(0)).unwrap();
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let (packet_tx, packet_rx) = mpsc::channel(16);
        drop(packet_rx);

        let result =
            run_rx_poller_task(conc, Duration::from_millis(10), cmd_rx, packet_tx).await;
        assert!(matches!(result, Err(SimError::ChannelClosed(_))));
    }
}
