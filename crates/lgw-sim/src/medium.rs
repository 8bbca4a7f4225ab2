//! Radio medium between virtual nodes and a concentrator
//!
//! Turns an [`Uplink`] into the [`RxFrame`] the concentrator's demodulators
//! would produce, or explains why nothing was heard.
//!
//! ```text
//! PL(d)  = 40 + 27 * log10(d_m)            (dB)
//! N      = -174 + 10 * log10(BW_hz) + NF   (dBm)
//! RSSI   = P_tx - PL(d)
//! SNR    = RSSI - N
//! ```

use std::fmt;

use crc::{Crc, CRC_16_XMODEM};
use lgw_hal::regmath::unresolve_rssi;
use lgw_hal::{Bandwidth, ConfigStore, CrcStatus, IfModemConfig, ModemKind, RxFrame, SpreadingFactor};
use tracing::trace;

use crate::node::Uplink;

/// LoRa payload CRC (CCITT polynomial, zero init)
const PAYLOAD_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Receiver noise figure (dB)
pub const NOISE_FIGURE_DB: f32 = 6.0;

/// Path loss at `distance_m` (dB)
pub fn path_loss_db(distance_m: f32) -> f32 {
    40.0 + 27.0 * distance_m.max(1.0).log10()
}

/// Thermal noise floor over a channel (dBm)
pub fn noise_floor_dbm(bandwidth: Bandwidth) -> f32 {
    -174.0 + 10.0 * (bandwidth.hz() as f32).log10() + NOISE_FIGURE_DB
}

/// Lowest SNR the demodulator can work with (dB)
pub fn demod_snr_floor_db(sf: SpreadingFactor) -> f32 {
    match sf {
        SpreadingFactor::Sf7 => -7.5,
        SpreadingFactor::Sf8 => -10.0,
        SpreadingFactor::Sf9 => -12.5,
        SpreadingFactor::Sf10 => -15.0,
        SpreadingFactor::Sf11 => -17.5,
        SpreadingFactor::Sf12 => -20.0,
    }
}

/// Why an uplink never reached the RX pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Loss {
    /// No enabled IF chain listens on that frequency and modulation
    NoChannel,
    /// Signal too weak for the spreading factor
    BelowSensitivity { snr_db: f32 },
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loss::NoChannel => f.write_str("no IF chain on channel"),
            Loss::BelowSensitivity { snr_db } => write!(f, "below sensitivity (SNR {snr_db:.1} dB)"),
        }
    }
}

/// Propagation model shared by every node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioMedium {
    /// SNR margin above the demodulator floor under which CRCs fail (dB)
    pub crc_error_margin_db: f32,
}

impl Default for RadioMedium {
    fn default() -> Self {
        Self {
            crc_error_margin_db: 1.0,
        }
    }
}

impl RadioMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demodulator output for an uplink heard at `distance_m`
    pub fn deliver(
        &self,
        uplink: &Uplink,
        distance_m: f32,
        config: &ConfigStore,
    ) -> Result<RxFrame, Loss> {
        let (if_chain, kind) = route(uplink, config).ok_or(Loss::NoChannel)?;

        let rssi = uplink.tx_power_dbm as f32 - path_loss_db(distance_m);
        let snr = rssi - noise_floor_dbm(uplink.bandwidth);
        let margin = snr - demod_snr_floor_db(uplink.spreading_factor);
        if margin < 0.0 {
            trace!("{} fcnt {} lost at SNR {:.1} dB", uplink.node_id, uplink.fcnt, snr);
            return Err(Loss::BelowSensitivity { snr_db: snr });
        }

        let rssi_offset = config
            .if_chain(if_chain)
            .and_then(|c| config.rf_chain(c.rf_chain))
            .map(|rf| rf.rssi_offset)
            .unwrap_or_default();

        let crc = PAYLOAD_CRC.checksum(&uplink.payload);
        let (status, crc) = if margin < self.crc_error_margin_db {
            (CrcStatus::Bad, !crc)
        } else {
            (CrcStatus::Ok, crc)
        };

        trace!(
            "{} fcnt {} -> IF{} rssi {:.1} snr {:.1} {:?}",
            uplink.node_id,
            uplink.fcnt,
            if_chain,
            rssi,
            snr,
            status
        );

        Ok(RxFrame {
            if_chain,
            raw_rssi: unresolve_rssi(rssi, kind) - rssi_offset,
            snr,
            spreading_factor: Some(uplink.spreading_factor),
            coderate: uplink.coderate,
            status,
            crc,
            payload: uplink.payload.clone(),
        })
    }
}

/// IF chain listening for the uplink; a matching stand-alone modem wins
/// over the multi-SF correlators
fn route(uplink: &Uplink, config: &ConfigStore) -> Option<(u8, ModemKind)> {
    let mut multi = None;
    for (chain, ifc) in config.enabled_if_chains() {
        let Some(rf) = config.rf_chain(ifc.rf_chain) else {
            continue;
        };
        if ifc.center_freq(rf.freq_hz) != uplink.freq_hz {
            continue;
        }
        match ifc.modem {
            IfModemConfig::LoraStd {
                bandwidth,
                spreading_factor,
            } if bandwidth == uplink.bandwidth && spreading_factor == uplink.spreading_factor => {
                return Some((chain, ModemKind::LoraStd));
            }
            IfModemConfig::LoraMulti if uplink.bandwidth == Bandwidth::Khz125 => {
                multi.get_or_insert(chain);
            }
            _ => {}
        }
    }
    multi.map(|chain| (chain, ModemKind::LoraMulti))
}
