//! Single-slot TX scheduler
//!
//! Holds at most one packet. Times are kept as microseconds since the
//! concentrator started (64-bit, no wrap); the 32-bit trigger counter is
//! only used at the API edge.

use tracing::{debug, error, warn};

use crate::config::{ConfigStore, TxGainEntry};
use crate::error::{HalError, Result};
use crate::packet::{TxMode, TxModulation, TxPacket};
use crate::regmath::{pll_register, resolve_ppm};
use crate::time::counter_offset;
use crate::types::{
    check_fsk_datarate, check_rf_frequency, Datarate, MAX_PAYLOAD_SIZE, RF_CHAIN_NB,
};

/// Delay between a TX command and the start of radiation (µs)
pub const TX_START_DELAY_US: u32 = 1_500;

/// FSK frequency deviation bounds (kHz)
const FSK_FDEV_MIN_KHZ: u8 = 1;
const FSK_FDEV_MAX_KHZ: u8 = 200;

/// Where the TX slot is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    /// Nothing loaded
    Free,
    /// Loaded, waiting for its start time
    Scheduled,
    /// On air
    Emitting,
}

/// A packet accepted by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTx {
    /// Packet as sent, preamble resolved
    pub packet: TxPacket,
    /// Index of the gain table entry used
    pub gain_index: usize,
    pub gain: TxGainEntry,
    /// Actual power (dBm)
    pub rf_power: i8,
    /// PPM compensation forced on
    pub ppm_offset: bool,
    /// PLL register of the carrier
    pub freq_reg: u32,
    /// Trigger counter value at which radiation starts
    pub start_count_us: u32,
    pub(crate) start_at: u64,
    pub(crate) end_at: u64,
}

impl ScheduledTx {
    /// Airtime of the packet (µs)
    pub fn duration_us(&self) -> u64 {
        self.end_at - self.start_at
    }
}

/// Single-slot scheduler
#[derive(Debug, Default)]
pub struct TxScheduler {
    slot: Option<ScheduledTx>,
}

impl TxScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase at `now`, releasing the slot once its packet is fully sent
    pub fn phase(&mut self, now: u64) -> TxPhase {
        let Some(tx) = &self.slot else {
            return TxPhase::Free;
        };
        if now >= tx.end_at {
            debug!("TX done at count {} ({} us on air)", tx.start_count_us, tx.duration_us());
            self.slot = None;
            TxPhase::Free
        } else if now >= tx.start_at {
            TxPhase::Emitting
        } else {
            TxPhase::Scheduled
        }
    }

    /// Packet currently loaded, if any
    pub fn in_flight(&self) -> Option<&ScheduledTx> {
        self.slot.as_ref()
    }

    /// Drop whatever is loaded; returns it
    pub fn abort(&mut self) -> Option<ScheduledTx> {
        self.slot.take()
    }

    /// Validate a packet and load it into the slot
    pub fn submit(&mut self, packet: TxPacket, config: &ConfigStore, now: u64) -> Result<&ScheduledTx> {
        if self.phase(now) != TxPhase::Free {
            warn!("TX slot busy, rejecting packet for {} Hz", packet.freq_hz);
            return Err(HalError::Busy);
        }

        let packet = validate(packet, config).inspect_err(|e| error!("TX rejected: {}", e))?;

        let (gain_index, gain) = config
            .tx_gain_lut()
            .select(packet.rf_power)
            .inspect_err(|e| error!("TX rejected: {}", e))?;

        let ppm_offset = match packet.modulation {
            TxModulation::Lora {
                bandwidth,
                spreading_factor,
                ..
            } => resolve_ppm(bandwidth, Datarate::Lora(spreading_factor)),
            TxModulation::Fsk { .. } => false,
        };

        let radio_type = config
            .rf_chain(packet.rf_chain)
            .map(|rf| rf.radio_type)
            .unwrap_or_default();
        let freq_reg = pll_register(packet.freq_hz, radio_type)
            .inspect_err(|e| error!("TX rejected: {}", e))?;

        let start_at = start_time(packet.tx_mode, now);
        let end_at = start_at + packet.time_on_air_us(config.fsk_sync_word_size()) as u64;

        debug!(
            "TX loaded: {} Hz, {} dBm (LUT {}), start {} us, ends {} us, ppm {}",
            packet.freq_hz, gain.rf_power, gain_index, start_at, end_at, ppm_offset
        );

        Ok(self.slot.insert(ScheduledTx {
            rf_power: gain.rf_power,
            gain_index,
            gain,
            ppm_offset,
            freq_reg,
            start_count_us: start_at as u32,
            start_at,
            end_at,
            packet,
        }))
    }
}

/// When radiation starts, never inside the start delay
fn start_time(mode: TxMode, now: u64) -> u64 {
    let earliest = now + TX_START_DELAY_US as u64;
    match mode {
        TxMode::Immediate => earliest,
        TxMode::Timestamped { count_us } => {
            let offset = counter_offset(now as u32, count_us);
            if offset < TX_START_DELAY_US as i32 {
                warn!(
                    "TX timestamp {} is {} us from now, inside the {} us start delay; delaying",
                    count_us, offset, TX_START_DELAY_US
                );
                earliest
            } else {
                now + offset as u64
            }
        }
    }
}

/// Check packet fields, resolving the preamble length
fn validate(mut packet: TxPacket, config: &ConfigStore) -> Result<TxPacket> {
    if packet.rf_chain as usize >= RF_CHAIN_NB {
        return Err(HalError::InvalidArgument(format!(
            "RF chain {} out of range",
            packet.rf_chain
        )));
    }
    let rf = config
        .rf_chain(packet.rf_chain)
        .copied()
        .unwrap_or_default();
    if !rf.enable {
        return Err(HalError::InvalidArgument(format!(
            "RF chain {} is disabled",
            packet.rf_chain
        )));
    }
    if !rf.tx_enable {
        return Err(HalError::InvalidArgument(format!(
            "RF chain {} is disabled for TX",
            packet.rf_chain
        )));
    }
    check_rf_frequency(packet.freq_hz)?;
    if packet.payload.len() > MAX_PAYLOAD_SIZE {
        return Err(HalError::InvalidArgument(format!(
            "payload of {} bytes exceeds {MAX_PAYLOAD_SIZE}",
            packet.payload.len()
        )));
    }

    if let TxModulation::Fsk {
        datarate,
        f_dev_khz,
    } = packet.modulation
    {
        check_fsk_datarate(datarate)?;
        if !(FSK_FDEV_MIN_KHZ..=FSK_FDEV_MAX_KHZ).contains(&f_dev_khz) {
            return Err(HalError::InvalidArgument(format!(
                "FSK deviation {f_dev_khz} kHz outside {FSK_FDEV_MIN_KHZ}..={FSK_FDEV_MAX_KHZ}"
            )));
        }
    }

    let (default, minimum) = packet.modulation.preamble_bounds();
    if packet.preamble == 0 {
        packet.preamble = default;
    } else if packet.preamble < minimum {
        warn!(
            "preamble length {} below {} minimum {}, clamping",
            packet.preamble,
            packet.modulation.modulation(),
            minimum
        );
        packet.preamble = minimum;
    }

    Ok(packet)
}
