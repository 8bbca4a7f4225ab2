//! Virtual LoRa gateway
//!
//! Runs a virtual concentrator with a set of virtual nodes, logs every
//! received uplink and acknowledges it with a timestamped downlink.
//!
//! Usage: `lgw-sim [plan.json]`. Without a file the stock EU868 plan is used.

use std::time::Duration;

use anyhow::Context;
use lgw_hal::{counter_elapsed, Concentrator, HalError, StatusChannel};
use lgw_sim::{
    downlink_for, run_rx_poller_task, run_virtual_node_task, window_open, NodeCommand, NodeEvent,
    PollerCommand, RadioMedium, SimConfig, UplinkOutcome, VirtualNode,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STATUS_PERIOD: Duration = Duration::from_secs(30);

fn load_config() -> anyhow::Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading plan {path}"))?;
            let config = serde_json::from_str(&text).with_context(|| format!("parsing plan {path}"))?;
            info!("Loaded plan from {}", path);
            Ok(config)
        }
        None => Ok(SimConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lgw_sim=info,lgw_hal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting virtual LoRa gateway ({})", lgw_hal::version_info());

    let config = load_config()?;
    debug!("plan: {}", serde_json::to_string(&config)?);

    let concentrator = Concentrator::new();
    config.apply(&concentrator).context("configuring concentrator")?;
    concentrator.start().context("starting concentrator")?;

    let medium = RadioMedium::new();
    let (event_tx, mut event_rx) = broadcast::channel::<NodeEvent>(64);
    let mut node_cmds = Vec::new();
    let mut node_handles = Vec::new();
    for node_config in &config.nodes {
        let node = VirtualNode::from_config(node_config.clone())?;
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        node_handles.push(tokio::spawn(run_virtual_node_task(
            node,
            concentrator.clone(),
            medium,
            Duration::from_millis(config.uplink_interval_ms),
            cmd_rx,
            event_tx.clone(),
        )));
        node_cmds.push(cmd_tx);
    }

    let (poll_cmd_tx, poll_cmd_rx) = mpsc::channel(1);
    let (packet_tx, mut packet_rx) = mpsc::channel(64);
    let poller = tokio::spawn(run_rx_poller_task(
        concentrator.clone(),
        Duration::from_millis(config.poll_interval_ms),
        poll_cmd_rx,
        packet_tx,
    ));

    let mut status_timer = tokio::time::interval(STATUS_PERIOD);

    loop {
        tokio::select! {
            Some(packet) = packet_rx.recv() => {
                info!("uplink {}", packet);
                answer(&concentrator, &packet, config.downlink_delay_us);
            }

            Ok(event) = event_rx.recv() => match event {
                NodeEvent::Uplink { node_id, fcnt, outcome: UplinkOutcome::Lost(loss) } => {
                    warn!("{} fcnt {} lost: {}", node_id, fcnt, loss);
                }
                NodeEvent::Uplink { node_id, fcnt, outcome: UplinkOutcome::Dropped } => {
                    warn!("{} fcnt {} dropped by the concentrator", node_id, fcnt);
                }
                other => debug!("{:?}", other),
            },

            _ = status_timer.tick() => {
                info!(
                    "status: RX {} TX {}, {} pending, {} dropped, counter {:?}",
                    concentrator.status(StatusChannel::Rx),
                    concentrator.status(StatusChannel::Tx),
                    concentrator.rx_pending(),
                    concentrator.rx_dropped(),
                    concentrator.trigger_count().ok()
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    for cmd_tx in &node_cmds {
        let _ = cmd_tx.send(NodeCommand::Shutdown).await;
    }
    let _ = poll_cmd_tx.send(PollerCommand::Shutdown).await;
    for handle in node_handles {
        match handle.await {
            Ok(Err(e)) if e.is_fatal() => error!("node task failed: {}", e),
            Ok(Err(e)) => warn!("node task ended early: {}", e),
            Err(e) => error!("node task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }
    match poller.await {
        Ok(Err(e)) if e.is_fatal() => error!("RX poller failed: {}", e),
        Ok(Err(e)) => warn!("RX poller ended early: {}", e),
        Err(e) => error!("RX poller panicked: {}", e),
        Ok(Ok(())) => {}
    }

    concentrator.stop().context("stopping concentrator")?;
    info!("Virtual gateway stopped");
    Ok(())
}

/// Schedule the acknowledgement of an uplink
fn answer(concentrator: &Concentrator, uplink: &lgw_hal::RxPacket, delay_us: u32) {
    let Some(packet) = downlink_for(uplink, delay_us) else {
        return;
    };
    if let Ok(now) = concentrator.trigger_count() {
        debug!("answering {} us after the uplink", counter_elapsed(uplink.count_us, now));
        if !window_open(&packet, now) {
            warn!("RX1 window missed, downlink skipped");
            return;
        }
    }
    match concentrator.send(packet) {
        Ok(start) => info!("downlink scheduled at {} us", start),
        Err(HalError::Busy) => warn!("TX slot busy, downlink skipped"),
        Err(e) => warn!("downlink refused: {}", e),
    }
}
