//! Virtual LoRa Concentrator HAL
//!
//! This crate models an SX1301-class LoRa gateway concentrator without the
//! hardware: two RF chains, ten IF chains, a free-running 32-bit µs trigger
//! counter, a single-slot TX scheduler and an RX FIFO.
//!
//! # Lifecycle
//!
//! A [`Concentrator`] starts Unconfigured. Board, RF chain, IF chain and TX
//! gain settings are validated as they are set. `start` computes the radio
//! register images, programs them through a [`RadioFrontEnd`] and starts the
//! trigger counter; `stop` tears everything down but keeps the configuration.
//!
//! # Timing
//!
//! Every packet carries a trigger counter timestamp. TX packets either go
//! out immediately or at a counter value; in both cases radiation never
//! starts earlier than [`TX_START_DELAY_US`] after the `send` call.
//!
//! # Example
//!
//! ```rust
//! use lgw_hal::{
//!     Concentrator, IfChainConfig, IfModemConfig, ManualClock, RfChainConfig,
//!     StatusChannel, StatusCode,
//! };
//!
//! let clock = ManualClock::new();
//! let conc = Concentrator::with_clock(clock.clone());
//!
//! conc.set_rf_chain_config(0, RfChainConfig {
//!     enable: true,
//!     freq_hz: 867_500_000,
//!     tx_enable: true,
//!     ..Default::default()
//! })?;
//! conc.set_if_chain_config(0, IfChainConfig {
//!     enable: true,
//!     rf_chain: 0,
//!     freq_offset_hz: -400_000,
//!     modem: IfModemConfig::LoraMulti,
//! })?;
//!
//! conc.start()?;
//! clock.advance(10_000);
//! assert_eq!(conc.trigger_count()?, 10_000);
//! assert_eq!(conc.status(StatusChannel::Tx), StatusCode::TxFree);
//! conc.stop()?;
//! # Ok::<(), lgw_hal::HalError>(())
//! ```

pub mod airtime;
pub mod concentrator;
pub mod config;
pub mod error;
pub mod frontend;
pub mod packet;
pub mod regmath;
pub mod rx;
pub mod state;
pub mod status;
pub mod time;
pub mod tx;
pub mod types;

pub use concentrator::Concentrator;
pub use config::{
    BoardConfig, ConfigStore, IfChainConfig, IfModemConfig, RfChainConfig, TxGainEntry, TxGainLut,
};
pub use error::{HalError, Result};
pub use frontend::{PllBehavior, ProgrammedRegisters, RadioFrontEnd, VirtualFrontEnd};
pub use packet::{CrcStatus, RxFrame, RxPacket, TxMode, TxModulation, TxPacket};
pub use rx::{RxBatch, RX_FIFO_CAPACITY};
pub use state::ConcentratorState;
pub use status::{StatusChannel, StatusCode};
pub use time::{counter_elapsed, counter_offset, counter_reached, ManualClock, MonotonicClock, TimeSource};
pub use tx::{ScheduledTx, TX_START_DELAY_US};
pub use types::{
    Bandwidth, CodeRate, Datarate, ModemKind, Modulation, RadioType, SpreadingFactor, IF_CHAIN_NB,
    MAX_PAYLOAD_SIZE, RF_CHAIN_NB,
};

/// Library version string
pub const VERSION_STRING: &str = concat!("Version: ", env!("CARGO_PKG_VERSION"), "; Options: virtual;");

/// Version and build options of this HAL
pub fn version_info() -> &'static str {
    VERSION_STRING
}
