//! Error types for the simulator

use lgw_hal::HalError;
use thiserror::Error;

/// Errors that can occur while simulating nodes
#[derive(Debug, Error)]
pub enum SimError {
    /// Concentrator rejected an operation
    #[error("concentrator error: {0}")]
    Hal(#[from] HalError),

    /// Node configuration is unusable
    #[error("invalid node {node}: {reason}")]
    InvalidNode {
        /// Node identifier
        node: String,
        /// What is wrong with it
        reason: String,
    },

    /// The other end of a channel went away
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

impl SimError {
    /// Whether the simulation can carry on after this error
    pub fn is_fatal(&self) -> bool {
        match self {
            SimError::Hal(e) => !e.is_recoverable(),
            SimError::InvalidNode { .. } => true,
            SimError::ChannelClosed(_) => false,
        }
    }
}
