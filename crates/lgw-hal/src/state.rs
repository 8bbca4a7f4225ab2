//! Concentrator lifecycle state

use std::fmt;

/// Lifecycle of a concentrator
///
/// ```text
/// Unconfigured --config--> Configured --start--> Running --stop--> Stopped
///                                           |                        |
///                                           +--(PLL fault)--> Faulted --stop--+
/// ```
///
/// Stopped behaves like Configured: configuration may change and `start`
/// is legal again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConcentratorState {
    /// Fresh instance, no usable RF + IF configuration yet
    #[default]
    Unconfigured,
    /// At least one RF chain and one IF chain configured
    Configured,
    /// Started; RX/TX operations are legal
    Running,
    /// Stopped after running
    Stopped,
    /// Start failed on a hardware fault; only `stop` is legal
    Faulted,
}

impl ConcentratorState {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unconfigured => "Unconfigured",
            Self::Configured => "Configured",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Faulted => "Faulted",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether configuration setters are accepted
    pub fn accepts_config(&self) -> bool {
        !matches!(self, Self::Running | Self::Faulted)
    }

    /// Whether `stop` has something to stop
    pub fn is_stoppable(&self) -> bool {
        matches!(self, Self::Running | Self::Faulted)
    }
}

impl fmt::Display for ConcentratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
