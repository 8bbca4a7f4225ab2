//! Received and transmitted packet records

use std::fmt;

use crate::airtime::{fsk_time_on_air_us, lora_time_on_air_us};
use crate::types::{Bandwidth, CodeRate, Datarate, Modulation, SpreadingFactor};

/// Default LoRa preamble length (symbols)
pub const STD_LORA_PREAMBLE: u16 = 6;
/// Shortest LoRa preamble the modem accepts
pub const MIN_LORA_PREAMBLE: u16 = 4;
/// Default FSK preamble length (bytes)
pub const STD_FSK_PREAMBLE: u16 = 5;
/// Shortest FSK preamble the modem accepts
pub const MIN_FSK_PREAMBLE: u16 = 3;

/// CRC check result of a received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrcStatus {
    /// CRC present and valid
    Ok,
    /// CRC present and invalid
    Bad,
    /// Packet carried no CRC
    NoCrc,
}

/// A packet delivered by `receive`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RxPacket {
    /// IF chain that demodulated the packet
    pub if_chain: u8,
    /// RF chain the packet came through
    pub rf_chain: u8,
    /// Center frequency of the IF chain (Hz)
    pub freq_hz: u32,
    pub status: CrcStatus,
    /// Trigger counter at reception (µs)
    pub count_us: u32,
    pub modulation: Modulation,
    pub bandwidth: Bandwidth,
    pub datarate: Datarate,
    /// LoRa only
    pub coderate: Option<CodeRate>,
    /// Calibrated RSSI (dBm)
    pub rssi: f32,
    /// LoRa only (dB)
    pub snr: Option<f32>,
    /// CRC value carried by the packet
    pub crc: u16,
    pub payload: Vec<u8>,
}

impl fmt::Display for RxPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IF{} {:.3} MHz {} {} {} rssi {:.1} dBm, {} bytes @ {} us ({:?})",
            self.if_chain,
            self.freq_hz as f64 / 1_000_000.0,
            self.modulation,
            self.datarate,
            self.bandwidth,
            self.rssi,
            self.payload.len(),
            self.count_us,
            self.status
        )
    }
}

/// Demodulator output handed to the RX pipeline
///
/// This is what a virtual radio front-end produces: everything the hardware
/// would know about a frame before calibration and timestamping.
#[derive(Debug, Clone, PartialEq)]
pub struct RxFrame {
    /// IF chain the frame landed on
    pub if_chain: u8,
    /// Uncalibrated RSSI reading
    pub raw_rssi: f32,
    /// LoRa only (dB)
    pub snr: f32,
    /// Required on LoRa chains, ignored on the FSK chain
    pub spreading_factor: Option<SpreadingFactor>,
    pub coderate: CodeRate,
    pub status: CrcStatus,
    pub crc: u16,
    pub payload: Vec<u8>,
}

/// When a packet should go on air
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxMode {
    /// As soon as the start delay allows
    Immediate,
    /// At an absolute trigger counter value (µs)
    Timestamped { count_us: u32 },
}

/// Modulation settings of a packet to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxModulation {
    Lora {
        bandwidth: Bandwidth,
        spreading_factor: SpreadingFactor,
        coderate: CodeRate,
    },
    Fsk {
        /// Bit rate (bps)
        datarate: u32,
        /// Frequency deviation (kHz)
        f_dev_khz: u8,
    },
}

impl TxModulation {
    pub fn modulation(&self) -> Modulation {
        match self {
            TxModulation::Lora { .. } => Modulation::Lora,
            TxModulation::Fsk { .. } => Modulation::Fsk,
        }
    }

    /// Default and minimum preamble length
    pub fn preamble_bounds(&self) -> (u16, u16) {
        match self {
            TxModulation::Lora { .. } => (STD_LORA_PREAMBLE, MIN_LORA_PREAMBLE),
            TxModulation::Fsk { .. } => (STD_FSK_PREAMBLE, MIN_FSK_PREAMBLE),
        }
    }
}

/// A packet submitted to `send`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TxPacket {
    /// RF chain to transmit on
    pub rf_chain: u8,
    /// Carrier frequency (Hz)
    pub freq_hz: u32,
    pub tx_mode: TxMode,
    /// Requested power (dBm)
    pub rf_power: i8,
    pub modulation: TxModulation,
    /// Inverted LoRa chirps (downlinks)
    pub invert_pol: bool,
    /// Preamble length, 0 for the modem default
    pub preamble: u16,
    pub no_crc: bool,
    /// Implicit header (LoRa only)
    pub no_header: bool,
    pub payload: Vec<u8>,
}

impl TxPacket {
    /// Airtime with the preamble the packet carries
    ///
    /// `fsk_sync_word_size` (bytes) only matters for FSK packets.
    pub fn time_on_air_us(&self, fsk_sync_word_size: u8) -> u32 {
        match self.modulation {
            TxModulation::Lora {
                bandwidth,
                spreading_factor,
                coderate,
            } => lora_time_on_air_us(
                bandwidth,
                spreading_factor,
                coderate,
                self.preamble,
                self.no_header,
                self.no_crc,
                self.payload.len(),
            ),
            TxModulation::Fsk { datarate, .. } => fsk_time_on_air_us(
                datarate,
                self.preamble,
                fsk_sync_word_size,
                self.no_crc,
                self.payload.len(),
            ),
        }
    }
}
