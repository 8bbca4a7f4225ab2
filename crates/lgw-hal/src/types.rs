//! Radio parameter types and hardware capability tables

use std::fmt;

use crate::error::HalError;

/// Number of RF chains (radio front-ends)
pub const RF_CHAIN_NB: usize = 2;
/// Number of IF chains (demodulator paths)
pub const IF_CHAIN_NB: usize = 10;
/// Maximum number of TX gain table entries
pub const TX_GAIN_LUT_SIZE_MAX: usize = 16;
/// Maximum payload size for LoRa and FSK packets
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Radio reference oscillator frequency
pub const XTAL_FREQ_HZ: u32 = 32_000_000;

/// Lowest accepted RF center frequency
pub const RF_FREQ_MIN_HZ: u32 = 100_000_000;
/// Highest accepted RF center frequency
pub const RF_FREQ_MAX_HZ: u32 = 1_000_000_000;

/// Instantaneous RX bandwidth of each RF chain
pub const RF_RX_BANDWIDTH: [u32; RF_CHAIN_NB] = [1_000_000, 1_000_000];

/// FSK datarate bounds (bps)
pub const FSK_DATARATE_MIN: u32 = 500;
pub const FSK_DATARATE_MAX: u32 = 250_000;

/// Modem wired behind each IF chain
pub const IFMOD_CONFIG: [ModemKind; IF_CHAIN_NB] = [
    ModemKind::LoraMulti,
    ModemKind::LoraMulti,
    ModemKind::LoraMulti,
    ModemKind::LoraMulti,
    ModemKind::LoraMulti,
    ModemKind::LoraMulti,
    ModemKind::LoraMulti,
    ModemKind::LoraMulti,
    ModemKind::LoraStd,
    ModemKind::Fsk,
];

/// Kind of demodulator behind an IF chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModemKind {
    /// LoRa receiver with multi-SF capability, fixed 125 kHz
    LoraMulti,
    /// Stand-alone single-SF LoRa modem
    LoraStd,
    /// FSK modem
    Fsk,
}

impl ModemKind {
    /// Modulation demodulated by this modem
    pub fn modulation(&self) -> Modulation {
        match self {
            ModemKind::LoraMulti | ModemKind::LoraStd => Modulation::Lora,
            ModemKind::Fsk => Modulation::Fsk,
        }
    }
}

/// Radio chip on an RF chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RadioType {
    #[cfg_attr(feature = "serde", serde(rename = "SX1255"))]
    Sx1255,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "SX1257"))]
    Sx1257,
}

impl RadioType {
    /// Fractional bits of the PLL frequency register
    pub fn frac_bits(&self) -> u32 {
        match self {
            RadioType::Sx1255 => 20,
            RadioType::Sx1257 => 19,
        }
    }
}

impl fmt::Display for RadioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioType::Sx1255 => write!(f, "SX1255"),
            RadioType::Sx1257 => write!(f, "SX1257"),
        }
    }
}

/// Packet modulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modulation {
    Lora,
    Fsk,
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modulation::Lora => write!(f, "LoRa"),
            Modulation::Fsk => write!(f, "FSK"),
        }
    }
}

/// Channel bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub enum Bandwidth {
    Khz125,
    Khz250,
    Khz500,
}

impl Bandwidth {
    /// Bandwidth in Hz
    pub fn hz(&self) -> u32 {
        match self {
            Bandwidth::Khz125 => 125_000,
            Bandwidth::Khz250 => 250_000,
            Bandwidth::Khz500 => 500_000,
        }
    }
}

impl TryFrom<u32> for Bandwidth {
    type Error = HalError;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            125_000 => Ok(Bandwidth::Khz125),
            250_000 => Ok(Bandwidth::Khz250),
            500_000 => Ok(Bandwidth::Khz500),
            _ => Err(HalError::InvalidArgument(format!("unsupported bandwidth {hz} Hz"))),
        }
    }
}

impl From<Bandwidth> for u32 {
    fn from(bw: Bandwidth) -> Self {
        bw.hz()
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BW{}", self.hz() / 1000)
    }
}

/// LoRa spreading factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
#[repr(u8)]
pub enum SpreadingFactor {
    Sf7 = 7,
    Sf8 = 8,
    Sf9 = 9,
    Sf10 = 10,
    Sf11 = 11,
    Sf12 = 12,
}

impl SpreadingFactor {
    /// All spreading factors, lowest first
    pub const ALL: [SpreadingFactor; 6] = [
        SpreadingFactor::Sf7,
        SpreadingFactor::Sf8,
        SpreadingFactor::Sf9,
        SpreadingFactor::Sf10,
        SpreadingFactor::Sf11,
        SpreadingFactor::Sf12,
    ];

    /// Numeric spreading factor
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for SpreadingFactor {
    type Error = HalError;

    fn try_from(sf: u8) -> Result<Self, Self::Error> {
        match sf {
            7 => Ok(SpreadingFactor::Sf7),
            8 => Ok(SpreadingFactor::Sf8),
            9 => Ok(SpreadingFactor::Sf9),
            10 => Ok(SpreadingFactor::Sf10),
            11 => Ok(SpreadingFactor::Sf11),
            12 => Ok(SpreadingFactor::Sf12),
            _ => Err(HalError::InvalidArgument(format!("unsupported spreading factor {sf}"))),
        }
    }
}

impl From<SpreadingFactor> for u8 {
    fn from(sf: SpreadingFactor) -> Self {
        sf.value()
    }
}

impl fmt::Display for SpreadingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SF{}", self.value())
    }
}

/// LoRa coding rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodeRate {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "4/5"))]
    Cr4_5,
    #[cfg_attr(feature = "serde", serde(rename = "4/6"))]
    Cr4_6,
    #[cfg_attr(feature = "serde", serde(rename = "4/7"))]
    Cr4_7,
    #[cfg_attr(feature = "serde", serde(rename = "4/8"))]
    Cr4_8,
}

impl CodeRate {
    /// Redundancy index (1 for 4/5 up to 4 for 4/8)
    pub fn index(&self) -> u8 {
        match self {
            CodeRate::Cr4_5 => 1,
            CodeRate::Cr4_6 => 2,
            CodeRate::Cr4_7 => 3,
            CodeRate::Cr4_8 => 4,
        }
    }
}

impl fmt::Display for CodeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "4/{}", 4 + self.index())
    }
}

/// Datarate of a received or transmitted packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Datarate {
    /// LoRa spreading factor
    Lora(SpreadingFactor),
    /// FSK bit rate (bps)
    Fsk(u32),
}

impl fmt::Display for Datarate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datarate::Lora(sf) => write!(f, "{sf}"),
            Datarate::Fsk(bps) => write!(f, "{bps}bps"),
        }
    }
}

/// Check an FSK datarate against the modem's range
pub(crate) fn check_fsk_datarate(datarate: u32) -> Result<(), HalError> {
    if !(FSK_DATARATE_MIN..=FSK_DATARATE_MAX).contains(&datarate) {
        return Err(HalError::InvalidArgument(format!(
            "FSK datarate {datarate} outside {FSK_DATARATE_MIN}..={FSK_DATARATE_MAX}"
        )));
    }
    Ok(())
}

/// Check an RF frequency against the supported band
pub(crate) fn check_rf_frequency(freq_hz: u32) -> Result<(), HalError> {
    if !(RF_FREQ_MIN_HZ..=RF_FREQ_MAX_HZ).contains(&freq_hz) {
        return Err(HalError::InvalidArgument(format!(
            "frequency {freq_hz} Hz outside {RF_FREQ_MIN_HZ}..={RF_FREQ_MAX_HZ}, was it given in Hz?"
        )));
    }
    Ok(())
}
