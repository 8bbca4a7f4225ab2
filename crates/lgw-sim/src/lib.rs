//! Virtual LoRa network around the virtual concentrator
//!
//! This crate drives an `lgw_hal::Concentrator` without any radio hardware.
//! It includes:
//!
//! - **VirtualNode**: an end-node building uplinks under a 1 % duty cycle
//! - **RadioMedium**: link budget and IF chain routing from node to concentrator
//! - **Actor tasks**: one task per node, plus an RX poller draining the FIFO
//! - **SimConfig**: channel plan and node list, loadable from JSON
//!
//! # Example
//!
//! ```rust
//! use lgw_hal::{Concentrator, ManualClock};
//! use lgw_sim::{eu868_plan, NodeConfig, RadioMedium, VirtualNode};
//!
//! let conc = Concentrator::with_clock(ManualClock::new());
//! eu868_plan().apply(&conc).unwrap();
//! conc.start().unwrap();
//!
//! let mut node = VirtualNode::from_config(NodeConfig::default()).unwrap();
//! node.queue_uplink(0);
//! let uplink = node.take_uplink().unwrap();
//!
//! let frame = RadioMedium::new()
//!     .deliver(&uplink, node.distance_m(), &conc.config())
//!     .unwrap();
//! assert!(conc.inject(frame).unwrap());
//! assert_eq!(conc.receive(8).len(), 1);
//! ```

pub mod downlink;
pub mod error;
pub mod medium;
pub mod node;
pub mod node_task;
pub mod plan;
pub mod poller;

pub use downlink::{downlink_for, window_open};
pub use error::SimError;
pub use medium::{Loss, RadioMedium};
pub use node::{NodeConfig, Uplink, VirtualNode};
pub use node_task::{run_virtual_node_task, NodeCommand, NodeEvent, UplinkOutcome};
pub use plan::{eu868_plan, SimConfig};
pub use poller::{run_rx_poller_task, PollerCommand};
