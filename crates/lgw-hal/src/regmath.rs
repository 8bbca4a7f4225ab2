//! Register arithmetic
//!
//! Pure conversions between physical settings and the register values the
//! concentrator programs at start-up. Nothing here touches state.
//!
//! SX125x PLL frequency register:
//!
//! ```text
//! F_reg = F_rf * 2^frac_bits / F_xtal
//!       = F_rf * 256 / 15625        (SX1257, 2^19, 32 MHz)
//!       = F_rf * 512 / 15625        (SX1255, 2^20, 32 MHz)
//! ```

use crate::config::{BoardConfig, IfChainConfig, IfModemConfig, RfChainConfig};
use crate::error::{HalError, Result};
use crate::types::{Bandwidth, Datarate, ModemKind, RadioType, SpreadingFactor, XTAL_FREQ_HZ};

/// Largest value of the 24-bit PLL frequency register
pub const PLL_REGISTER_MAX: u32 = 0x00FF_FFFF;

/// Irreducible denominator of 32 MHz over a power of two
pub const SX125X_32MHZ_FRAC: u32 = 15_625;

/// Difference between multi-SF and stand-alone modem RSSI offsets
pub const RSSI_MULTI_BIAS: f32 = -35.0;
/// Difference between FSK and stand-alone modem RSSI offsets
pub const RSSI_FSK_BIAS: f32 = -37.0;
/// FSK RSSI curve is linearized around this level (dBm)
pub const RSSI_FSK_REF: f32 = -70.0;
pub const RSSI_FSK_SLOPE: f32 = 0.8;

// SX125x static settings
const SX125X_TX_DAC_GAIN: u8 = 2; // 3:0, 2:-3, 1:-6, 0:-9 dBFS
const SX125X_TX_MIX_GAIN: u8 = 14; // -38 + 2*TxMixGain dB
const SX125X_TX_PLL_BW: u8 = 3; // 0:75, 1:150, 2:225, 3:300 kHz
const SX125X_RX_LNA_GAIN: u8 = 1; // 1 to 6, 1 highest gain
const SX125X_RX_BB_GAIN: u8 = 12; // 0 to 15, 15 highest gain
const SX125X_RX_ADC_BW: u8 = 7; // 7: 400 kHz < BW
const SX125X_RX_ADC_TRIM: u8 = 6; // 6 for 32 MHz reference
const SX125X_RX_PLL_BW: u8 = 0; // 0:75, 1:150, 2:225, 3:300 kHz

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Reduce `2^frac_bits / xtal_hz` to lowest terms
fn reduced_ratio(xtal_hz: u32, frac_bits: u32) -> Result<(u64, u64)> {
    if xtal_hz == 0 {
        return Err(HalError::InvalidArgument("crystal frequency is zero".into()));
    }
    if frac_bits > 31 {
        return Err(HalError::InvalidArgument(format!(
            "{frac_bits} fractional bits exceed register width"
        )));
    }
    let scale = 1u64 << frac_bits;
    let g = gcd(scale, xtal_hz as u64);
    Ok((scale / g, xtal_hz as u64 / g))
}

/// Frequency to PLL register value, `floor(freq * 2^frac_bits / xtal)`
pub fn freq_to_register(freq_hz: u32, xtal_hz: u32, frac_bits: u32) -> Result<u32> {
    let (num, den) = reduced_ratio(xtal_hz, frac_bits)?;
    let reg = freq_hz as u64 * num / den;
    u32::try_from(reg).map_err(|_| {
        HalError::InvalidArgument(format!("frequency {freq_hz} Hz overflows the register"))
    })
}

/// PLL register value back to frequency (floor)
pub fn register_to_freq(reg: u32, xtal_hz: u32, frac_bits: u32) -> Result<u32> {
    let (num, den) = reduced_ratio(xtal_hz, frac_bits)?;
    let freq = reg as u64 * den / num;
    u32::try_from(freq).map_err(|_| {
        HalError::InvalidArgument(format!("register 0x{reg:08X} overflows a frequency"))
    })
}

/// PLL register of a radio tuned to `freq_hz`
///
/// Fails when the value does not fit the 24-bit register, e.g. an SX1255
/// above ~512 MHz.
pub fn pll_register(freq_hz: u32, radio_type: RadioType) -> Result<u32> {
    let reg = freq_to_register(freq_hz, XTAL_FREQ_HZ, radio_type.frac_bits())?;
    if reg > PLL_REGISTER_MAX {
        return Err(HalError::InvalidArgument(format!(
            "{freq_hz} Hz is out of tuning range for {radio_type} (register 0x{reg:X})"
        )));
    }
    Ok(reg)
}

/// Split a 24-bit frequency register into MSB, MID and LSB bytes
pub fn split_freq_register(reg: u32) -> (u8, u8, u8) {
    ((reg >> 16) as u8, (reg >> 8) as u8, reg as u8)
}

/// IF offset to the demodulator frequency register
pub fn if_hz_to_register(offset_hz: i32) -> i32 {
    ((offset_hz as i64 * 32) / SX125X_32MHZ_FRAC as i64) as i32
}

/// Whether PPM (clock drift) compensation is needed for the combination
pub fn resolve_ppm(bandwidth: Bandwidth, datarate: Datarate) -> bool {
    matches!(
        (bandwidth, datarate),
        (Bandwidth::Khz125, Datarate::Lora(SpreadingFactor::Sf11 | SpreadingFactor::Sf12))
            | (Bandwidth::Khz250, Datarate::Lora(SpreadingFactor::Sf12))
    )
}

/// Calibrated RSSI (dBm) from a raw reading already offset for its RF chain
pub fn resolve_rssi(raw_rssi: f32, modem: ModemKind) -> f32 {
    match modem {
        ModemKind::LoraMulti => raw_rssi - RSSI_MULTI_BIAS,
        ModemKind::LoraStd => raw_rssi,
        ModemKind::Fsk => {
            let rssi = raw_rssi - RSSI_FSK_BIAS;
            RSSI_FSK_REF + RSSI_FSK_SLOPE * (rssi - RSSI_FSK_REF)
        }
    }
}

/// Inverse of [`resolve_rssi`]
pub fn unresolve_rssi(rssi_dbm: f32, modem: ModemKind) -> f32 {
    match modem {
        ModemKind::LoraMulti => rssi_dbm + RSSI_MULTI_BIAS,
        ModemKind::LoraStd => rssi_dbm,
        ModemKind::Fsk => {
            let rssi = RSSI_FSK_REF + (rssi_dbm - RSSI_FSK_REF) / RSSI_FSK_SLOPE;
            rssi + RSSI_FSK_BIAS
        }
    }
}

/// Register image programmed into one radio front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfChainRegisters {
    /// 24-bit PLL frequency register
    pub freq_reg: u32,
    pub freq_msb: u8,
    pub freq_mid: u8,
    pub freq_lsb: u8,
    pub rx_adc_trim: u8,
    pub rx_adc_bw: u8,
    pub rx_lna_gain: u8,
    pub rx_bb_gain: u8,
    pub rx_pll_bw: u8,
    pub tx_dac_gain: u8,
    pub tx_mix_gain: u8,
    pub tx_pll_bw: u8,
}

/// Board-wide modem registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardRegisters {
    /// Frame sync word of every LoRa modem, RX and TX
    pub lora_sync_word: u8,
}

/// FSK correlator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FskSyncRegisters {
    /// Sync word length (bytes)
    pub size: u8,
    /// Sync word left aligned in the 64-bit reference pattern
    pub ref_pattern: u64,
}

/// Register image for one demodulator path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfChainRegisters {
    /// Frequency offset register
    pub freq_reg: i32,
    /// PPM offset compensation enabled
    pub ppm_offset: bool,
    /// FSK chain only
    pub fsk_sync: Option<FskSyncRegisters>,
}

/// Compute the register image of an RF chain
pub fn rf_chain_registers(cfg: &RfChainConfig) -> Result<RfChainRegisters> {
    let freq_reg = pll_register(cfg.freq_hz, cfg.radio_type)?;
    let (freq_msb, freq_mid, freq_lsb) = split_freq_register(freq_reg);
    Ok(RfChainRegisters {
        freq_reg,
        freq_msb,
        freq_mid,
        freq_lsb,
        rx_adc_trim: SX125X_RX_ADC_TRIM,
        rx_adc_bw: SX125X_RX_ADC_BW,
        rx_lna_gain: SX125X_RX_LNA_GAIN,
        rx_bb_gain: SX125X_RX_BB_GAIN,
        rx_pll_bw: SX125X_RX_PLL_BW,
        tx_dac_gain: SX125X_TX_DAC_GAIN,
        tx_mix_gain: SX125X_TX_MIX_GAIN,
        tx_pll_bw: SX125X_TX_PLL_BW,
    })
}

/// Compute the board-wide registers
pub fn board_registers(cfg: &BoardConfig) -> BoardRegisters {
    BoardRegisters {
        lora_sync_word: cfg.sync_word(),
    }
}

/// Left-align a right-aligned sync word of `size` bytes in 64 bits
pub fn fsk_ref_pattern(sync_word: u64, size: u8) -> u64 {
    let shift = 8 * (8 - size.min(8) as u32);
    sync_word.checked_shl(shift).unwrap_or(0)
}

/// Compute the register image of an IF chain
pub fn if_chain_registers(cfg: &IfChainConfig) -> IfChainRegisters {
    let ppm_offset = match cfg.modem {
        // the multi-SF correlators always compensate their SF11/SF12 lanes
        IfModemConfig::LoraMulti => resolve_ppm(Bandwidth::Khz125, Datarate::Lora(SpreadingFactor::Sf12)),
        IfModemConfig::LoraStd {
            bandwidth,
            spreading_factor,
        } => resolve_ppm(bandwidth, Datarate::Lora(spreading_factor)),
        IfModemConfig::Fsk { .. } => false,
    };
    let fsk_sync = match cfg.modem {
        IfModemConfig::Fsk {
            sync_word_size,
            sync_word,
            ..
        } => Some(FskSyncRegisters {
            size: sync_word_size,
            ref_pattern: fsk_ref_pattern(sync_word, sync_word_size),
        }),
        _ => None,
    };
    IfChainRegisters {
        freq_reg: if_hz_to_register(cfg.freq_offset_hz),
        ppm_offset,
        fsk_sync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freq_to_register_868mhz() {
        assert_eq!(freq_to_register(868_000_000, 32_000_000, 19).unwrap(), 14_221_312);
        // same inputs, same answer
        assert_eq!(
            freq_to_register(868_000_000, 32_000_000, 19).unwrap(),
            freq_to_register(868_000_000, 32_000_000, 19).unwrap()
        );
    }

    #[test]
    fn test_freq_to_register_matches_fraction() {
        let freq = 867_500_000u32;
        let expected = (freq as u64 * 256 / 15_625) as u32;
        assert_eq!(freq_to_register(freq, XTAL_FREQ_HZ, 19).unwrap(), expected);
        let expected = (freq as u64 * 512 / 15_625) as u32;
        assert_eq!(freq_to_register(freq, XTAL_FREQ_HZ, 20).unwrap(), expected);
    }

    #[test]
    fn test_freq_register_bad_inputs() {
        assert!(freq_to_register(868_000_000, 0, 19).is_err());
        assert!(freq_to_register(868_000_000, XTAL_FREQ_HZ, 40).is_err());
        assert!(register_to_freq(1, 0, 19).is_err());
    }

    #[test]
    fn test_register_round_trip_within_lsb() {
        let freq = 868_100_000u32;
        let reg = freq_to_register(freq, XTAL_FREQ_HZ, 19).unwrap();
        let back = register_to_freq(reg, XTAL_FREQ_HZ, 19).unwrap();
        assert!(back <= freq);
        // one LSB is 32e6 / 2^19 = 61.03 Hz
        assert!(freq - back <= 62);
    }

    #[test]
    fn test_split_register() {
        assert_eq!(split_freq_register(14_221_312), (0xD9, 0x00, 0x00));
        assert_eq!(split_freq_register(0x00D9_1234), (0xD9, 0x12, 0x34));
    }

    #[test]
    fn test_pll_register_fits_24_bits() {
        assert_eq!(pll_register(868_000_000, RadioType::Sx1257).unwrap(), 14_221_312);
        assert_eq!(pll_register(433_000_000, RadioType::Sx1255).unwrap(), 0x00D8_8000);
        // 868 MHz needs 0x1B20000 on an SX1255
        assert!(matches!(
            pll_register(868_000_000, RadioType::Sx1255),
            Err(HalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rf_chain_registers_reject_wide_register() {
        let cfg = RfChainConfig {
            enable: true,
            freq_hz: 868_000_000,
            rssi_offset: 0.0,
            radio_type: RadioType::Sx1255,
            tx_enable: false,
        };
        assert!(rf_chain_registers(&cfg).is_err());
    }

    #[test]
    fn test_if_register() {
        assert_eq!(if_hz_to_register(0), 0);
        assert_eq!(if_hz_to_register(-187_500), -384);
        assert_eq!(if_hz_to_register(312_500), 640);
    }

    #[test]
    fn test_resolve_ppm_table() {
        assert!(resolve_ppm(Bandwidth::Khz125, Datarate::Lora(SpreadingFactor::Sf11)));
        assert!(resolve_ppm(Bandwidth::Khz125, Datarate::Lora(SpreadingFactor::Sf12)));
        assert!(!resolve_ppm(Bandwidth::Khz125, Datarate::Lora(SpreadingFactor::Sf7)));
        assert!(resolve_ppm(Bandwidth::Khz250, Datarate::Lora(SpreadingFactor::Sf12)));
        assert!(!resolve_ppm(Bandwidth::Khz250, Datarate::Lora(SpreadingFactor::Sf11)));
        assert!(!resolve_ppm(Bandwidth::Khz500, Datarate::Lora(SpreadingFactor::Sf12)));
        assert!(!resolve_ppm(Bandwidth::Khz125, Datarate::Fsk(50_000)));
    }

    #[test]
    fn test_resolve_rssi() {
        assert_eq!(resolve_rssi(-100.0, ModemKind::LoraMulti), -65.0);
        assert_eq!(resolve_rssi(-80.0, ModemKind::LoraStd), -80.0);
        // -107 + 37 = -70 sits on the reference point
        assert!((resolve_rssi(-107.0, ModemKind::Fsk) - -70.0).abs() < 1e-4);
        // 10 dB above the reference is compressed to 8 dB
        assert!((resolve_rssi(-97.0, ModemKind::Fsk) - -62.0).abs() < 1e-4);
    }

    #[test]
    fn test_unresolve_rssi_inverts() {
        for kind in [ModemKind::LoraMulti, ModemKind::LoraStd, ModemKind::Fsk] {
            let raw = unresolve_rssi(-92.5, kind);
            assert!((resolve_rssi(raw, kind) - -92.5).abs() < 1e-3);
        }
    }

    #[test]
    fn test_rf_chain_registers() {
        let cfg = RfChainConfig {
            enable: true,
            freq_hz: 868_000_000,
            rssi_offset: -166.0,
            radio_type: RadioType::Sx1257,
            tx_enable: true,
        };
        let regs = rf_chain_registers(&cfg).unwrap();
        assert_eq!(regs.freq_reg, 14_221_312);
        assert_eq!(regs.freq_msb, 0xD9);
        assert_eq!(regs.rx_adc_trim, 6);
        assert_eq!(regs.tx_mix_gain, 14);
    }

    #[test]
    fn test_if_chain_registers_ppm() {
        let std_sf12 = IfChainConfig {
            enable: true,
            rf_chain: 0,
            freq_offset_hz: 0,
            modem: IfModemConfig::LoraStd {
                bandwidth: Bandwidth::Khz250,
                spreading_factor: SpreadingFactor::Sf12,
            },
        };
        assert!(if_chain_registers(&std_sf12).ppm_offset);

        let std_sf7 = IfChainConfig {
            modem: IfModemConfig::LoraStd {
                bandwidth: Bandwidth::Khz250,
                spreading_factor: SpreadingFactor::Sf7,
            },
            ..std_sf12
        };
        assert!(!if_chain_registers(&std_sf7).ppm_offset);
        assert_eq!(if_chain_registers(&std_sf7).fsk_sync, None);
    }

    #[test]
    fn test_board_registers_sync_word() {
        let public = BoardConfig {
            lorawan_public: true,
            ..Default::default()
        };
        assert_eq!(board_registers(&public).lora_sync_word, 0x34);
        assert_eq!(board_registers(&BoardConfig::default()).lora_sync_word, 0x12);
    }

    #[test]
    fn test_fsk_sync_pattern() {
        assert_eq!(fsk_ref_pattern(0xC1_94C1, 3), 0xC194_C100_0000_0000);
        assert_eq!(fsk_ref_pattern(0x0102_0304_0506_0708, 8), 0x0102_0304_0506_0708);
        assert_eq!(fsk_ref_pattern(0xAB, 1), 0xAB00_0000_0000_0000);

        let fsk = IfChainConfig {
            enable: true,
            rf_chain: 1,
            freq_offset_hz: 300_000,
            modem: IfModemConfig::Fsk {
                bandwidth: Bandwidth::Khz125,
                datarate: 50_000,
                sync_word_size: 2,
                sync_word: 0x2DD4,
            },
        };
        assert_eq!(
            if_chain_registers(&fsk).fsk_sync,
            Some(FskSyncRegisters {
                size: 2,
                ref_pattern: 0x2DD4_0000_0000_0000,
            })
        );
    }
}
