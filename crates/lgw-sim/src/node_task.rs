//! Virtual node actor task
//!
//! This module provides an async task that owns a VirtualNode and feeds its
//! uplinks into a concentrator. The task uses a select! loop to:
//! - Send an uplink every interval, subject to the node's duty cycle
//! - Handle interval changes, moves, on-demand uplinks and shutdown from a channel
//! - Emit what happened to each uplink via a broadcast channel

use std::time::Duration;

use lgw_hal::{Concentrator, HalError};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::medium::{Loss, RadioMedium};
use crate::node::VirtualNode;

/// Commands that can be sent to a virtual node actor
#[derive(Debug, Clone)]
pub enum NodeCommand {
    /// Change the uplink period; the next uplink is one period away
    SetInterval(Duration),
    /// Send an uplink now if the duty cycle allows
    SendNow,
    /// Move the node to a new distance from the gateway (m)
    MoveTo(f32),
    /// Shutdown the virtual node actor
    Shutdown,
}

/// What became of one uplink
#[derive(Debug, Clone, PartialEq)]
pub enum UplinkOutcome {
    /// Queued in the concentrator's RX FIFO
    Delivered { if_chain: u8 },
    /// Heard but dropped by the RX pipeline
    Dropped,
    /// Never reached a demodulator
    Lost(Loss),
    /// Concentrator not running
    GatewayOff,
}

/// Event emitted by a virtual node actor
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Uplink {
        node_id: String,
        fcnt: u32,
        outcome: UplinkOutcome,
    },
    /// Uplink refused by the duty cycle
    DutyCycleDeferred { node_id: String, wait_us: u64 },
}

fn uplink_timer(period: Duration, first: Instant) -> Interval {
    let mut timer = tokio::time::interval_at(first, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Run the virtual node actor task
///
/// The first uplink goes out immediately. The task ends on `Shutdown`, when
/// the command channel closes, or with an error when the concentrator
/// reports a hardware fault.
pub async fn run_virtual_node_task(
    mut node: VirtualNode,
    concentrator: Concentrator,
    medium: RadioMedium,
    period: Duration,
    mut cmd_rx: mpsc::Receiver<NodeCommand>,
    event_tx: broadcast::Sender<NodeEvent>,
) -> Result<(), SimError> {
    let origin = Instant::now();
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Starting virtual node task for {} ({} Hz, {})",
        node.id(),
        node.config().freq_hz,
        node.config().spreading_factor
    );

    loop {
        tokio::select! {
            _ = timer.tick() => {
                transmit(&mut node, &concentrator, &medium, origin, &event_tx)?;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(NodeCommand::SetInterval(period)) => {
                        info!("Virtual node {} interval set to {:?}", node.id(), period);
                        timer = uplink_timer(period, Instant::now() + period);
                    }
                    Some(NodeCommand::MoveTo(distance_m)) => {
                        info!("Virtual node {} moved to {} m", node.id(), distance_m);
                        node.set_distance(distance_m);
                    }
                    Some(NodeCommand::SendNow) => {
                        transmit(&mut node, &concentrator, &medium, origin, &event_tx)?;
                    }
                    Some(NodeCommand::Shutdown) => {
                        info!("Shutdown requested for virtual node {}", node.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual node {}", node.id());
                        break;
                    }
                }
            }
        }
    }

    info!("Virtual node task ended for {}", node.id());
    Ok(())
}

/// Build one uplink, push it through the medium and into the concentrator
fn transmit(
    node: &mut VirtualNode,
    concentrator: &Concentrator,
    medium: &RadioMedium,
    origin: Instant,
    event_tx: &broadcast::Sender<NodeEvent>,
) -> Result<(), SimError> {
    let now_us = origin.elapsed().as_micros() as u64;
    if node.queue_uplink(now_us).is_none() {
        let _ = event_tx.send(NodeEvent::DutyCycleDeferred {
            node_id: node.id().to_string(),
            wait_us: node.duty_cycle_wait(now_us),
        });
        return Ok(());
    }

    while let Some(uplink) = node.take_uplink() {
        let outcome = match medium.deliver(&uplink, node.distance_m(), &concentrator.config()) {
            Err(loss) => {
                debug!("Virtual node {} fcnt {} lost: {}", node.id(), uplink.fcnt, loss);
                UplinkOutcome::Lost(loss)
            }
            Ok(frame) => {
                let if_chain = frame.if_chain;
                match concentrator.inject(frame) {
                    Ok(true) => UplinkOutcome::Delivered { if_chain },
                    Ok(false) => UplinkOutcome::Dropped,
                    Err(HalError::NotRunning) => UplinkOutcome::GatewayOff,
                    Err(e) if e.is_recoverable() => {
                        warn!("Virtual node {} uplink rejected: {}", node.id(), e);
                        UplinkOutcome::Dropped
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        let _ = event_tx.send(NodeEvent::Uplink {
            node_id: uplink.node_id,
            fcnt: uplink.fcnt,
            outcome,
        });
    }
    Ok(())
}
