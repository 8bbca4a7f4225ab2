//! RX/TX status reporting

use std::fmt;

use crate::state::ConcentratorState;
use crate::tx::TxPhase;

/// Which side of the concentrator to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusChannel {
    Rx,
    Tx,
}

/// Status reported by `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusCode {
    /// Receivers listening
    RxOn,
    /// Receivers muted by an ongoing half-duplex emission
    RxSuspended,
    /// Radio keyed for TX outside of a scheduled packet
    TxOn,
    /// No packet loaded
    TxFree,
    /// Packet on air
    TxEmitting,
    /// Packet loaded, waiting for its start time
    TxScheduled,
    /// Concentrator not running
    StatusUnknown,
}

impl StatusCode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RxOn => "RX_ON",
            Self::RxSuspended => "RX_SUSPENDED",
            Self::TxOn => "TX_ON",
            Self::TxFree => "TX_FREE",
            Self::TxEmitting => "TX_EMITTING",
            Self::TxScheduled => "TX_SCHEDULED",
            Self::StatusUnknown => "STATUS_UNKNOWN",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map lifecycle state and TX phase to a status code
pub(crate) fn report(
    channel: StatusChannel,
    state: ConcentratorState,
    tx: TxPhase,
    full_duplex: bool,
) -> StatusCode {
    if !state.is_running() {
        return StatusCode::StatusUnknown;
    }
    match channel {
        StatusChannel::Rx if !full_duplex && tx == TxPhase::Emitting => StatusCode::RxSuspended,
        StatusChannel::Rx => StatusCode::RxOn,
        StatusChannel::Tx => match tx {
            TxPhase::Free => StatusCode::TxFree,
            TxPhase::Scheduled => StatusCode::TxScheduled,
            TxPhase::Emitting => StatusCode::TxEmitting,
        },
    }
}
