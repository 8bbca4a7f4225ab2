//! Error types for the concentrator HAL

use thiserror::Error;

/// Errors returned by concentrator operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HalError {
    /// Malformed or out-of-range configuration or packet field
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `start` called without enough configuration
    #[error("concentrator not configured: {0}")]
    NotConfigured(String),

    /// Operation requires a running concentrator
    #[error("concentrator is not running")]
    NotRunning,

    /// `start` called on a running concentrator
    #[error("concentrator is already running")]
    AlreadyRunning,

    /// TX slot already holds a packet
    #[error("TX slot busy")]
    Busy,

    /// Requested TX power is above the gain table
    #[error("requested power {requested} dBm above maximum {max} dBm")]
    PowerUnavailable {
        /// Requested power (dBm)
        requested: i8,
        /// Highest power in the gain table (dBm)
        max: i8,
    },

    /// Unrecoverable for the current session; only `stop` then `start` clears it
    #[error("hardware fault: {0}")]
    HardwareFault(String),
}

impl HalError {
    /// Whether the caller can retry after correcting input or call order
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, HalError::HardwareFault(_))
    }
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_hardware_fault_is_fatal() {
        assert!(HalError::Busy.is_recoverable());
        assert!(HalError::NotRunning.is_recoverable());
        assert!(HalError::PowerUnavailable { requested: 30, max: 27 }.is_recoverable());
        assert!(!HalError::HardwareFault("pll".into()).is_recoverable());
    }

    #[test]
    fn test_power_error_message() {
        let err = HalError::PowerUnavailable { requested: 30, max: 27 };
        assert_eq!(err.to_string(), "requested power 30 dBm above maximum 27 dBm");
    }
}
