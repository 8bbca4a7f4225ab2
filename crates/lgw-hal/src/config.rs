//! Board, RF chain, IF chain and TX gain configuration
//!
//! [`ConfigStore`] validates each setter call on its own and keeps the
//! cross-chain invariants: an enabled IF chain always points at an enabled
//! RF chain, and stays inside that chain's instantaneous bandwidth.

use tracing::{debug, error};

use crate::error::{HalError, Result};
use crate::regmath::pll_register;
use crate::types::{
    check_fsk_datarate, check_rf_frequency, Bandwidth, ModemKind, RadioType, SpreadingFactor,
    IFMOD_CONFIG, IF_CHAIN_NB, RF_CHAIN_NB, RF_RX_BANDWIDTH, TX_GAIN_LUT_SIZE_MAX,
};

/// LoRa sync word for public (LoRaWAN) networks
pub const LORA_SYNC_WORD_PUBLIC: u8 = 0x34;
/// LoRa sync word for private networks
pub const LORA_SYNC_WORD_PRIVATE: u8 = 0x12;

/// Default FSK sync word (right aligned)
pub const FSK_SYNC_WORD_DEFAULT: u64 = 0xC1_94C1;
/// Length of [`FSK_SYNC_WORD_DEFAULT`] (bytes)
pub const FSK_SYNC_WORD_SIZE_DEFAULT: u8 = 3;

/// Board-level settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardConfig {
    /// Use the LoRaWAN public sync word
    pub lorawan_public: bool,
    /// RF chain providing the reference clock
    pub clksrc: u8,
    /// Keep receiving while transmitting
    #[cfg_attr(feature = "serde", serde(default))]
    pub full_duplex: bool,
}

impl BoardConfig {
    /// LoRa sync word selected by `lorawan_public`
    pub fn sync_word(&self) -> u8 {
        if self.lorawan_public {
            LORA_SYNC_WORD_PUBLIC
        } else {
            LORA_SYNC_WORD_PRIVATE
        }
    }
}

/// Settings of one radio front-end
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RfChainConfig {
    pub enable: bool,
    /// Center frequency (Hz)
    #[cfg_attr(feature = "serde", serde(rename = "freq"))]
    pub freq_hz: u32,
    /// Board-specific RSSI correction (dB)
    #[cfg_attr(feature = "serde", serde(default))]
    pub rssi_offset: f32,
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub radio_type: RadioType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tx_enable: bool,
}

/// Modem settings of an IF chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "modem", rename_all = "snake_case"))]
pub enum IfModemConfig {
    /// Multi-SF LoRa correlators, 125 kHz
    LoraMulti,
    /// Single-SF LoRa modem
    LoraStd {
        bandwidth: Bandwidth,
        spreading_factor: SpreadingFactor,
    },
    /// FSK modem
    Fsk {
        bandwidth: Bandwidth,
        /// Bit rate (bps)
        datarate: u32,
        /// Sync word length in bytes
        sync_word_size: u8,
        sync_word: u64,
    },
}

impl IfModemConfig {
    /// Stock settings for a modem kind
    pub fn default_for(kind: ModemKind) -> Self {
        match kind {
            ModemKind::LoraMulti => IfModemConfig::LoraMulti,
            ModemKind::LoraStd => IfModemConfig::LoraStd {
                bandwidth: Bandwidth::Khz250,
                spreading_factor: SpreadingFactor::Sf7,
            },
            ModemKind::Fsk => IfModemConfig::Fsk {
                bandwidth: Bandwidth::Khz125,
                datarate: 50_000,
                sync_word_size: FSK_SYNC_WORD_SIZE_DEFAULT,
                sync_word: FSK_SYNC_WORD_DEFAULT,
            },
        }
    }

    pub fn kind(&self) -> ModemKind {
        match self {
            IfModemConfig::LoraMulti => ModemKind::LoraMulti,
            IfModemConfig::LoraStd { .. } => ModemKind::LoraStd,
            IfModemConfig::Fsk { .. } => ModemKind::Fsk,
        }
    }

    /// Channel bandwidth demodulated by this modem
    pub fn bandwidth(&self) -> Bandwidth {
        match self {
            IfModemConfig::LoraMulti => Bandwidth::Khz125,
            IfModemConfig::LoraStd { bandwidth, .. } | IfModemConfig::Fsk { bandwidth, .. } => {
                *bandwidth
            }
        }
    }
}

/// Settings of one demodulator path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IfChainConfig {
    pub enable: bool,
    /// Parent RF chain
    #[cfg_attr(feature = "serde", serde(rename = "radio"))]
    pub rf_chain: u8,
    /// Offset from the RF chain center frequency (Hz)
    #[cfg_attr(feature = "serde", serde(rename = "if"))]
    pub freq_offset_hz: i32,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub modem: IfModemConfig,
}

impl IfChainConfig {
    /// Disabled chain carrying the stock settings of a modem kind
    pub fn disabled(kind: ModemKind) -> Self {
        Self {
            enable: false,
            rf_chain: 0,
            freq_offset_hz: 0,
            modem: IfModemConfig::default_for(kind),
        }
    }

    /// Absolute center frequency given the parent RF center
    pub fn center_freq(&self, rf_freq_hz: u32) -> u32 {
        (rf_freq_hz as i64 + self.freq_offset_hz as i64) as u32
    }
}

/// One TX gain setting and the power it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TxGainEntry {
    /// Concentrator digital gain (2 bits)
    #[cfg_attr(feature = "serde", serde(default))]
    pub dig_gain: u8,
    /// Radio DAC gain (2 bits)
    #[cfg_attr(feature = "serde", serde(default))]
    pub dac_gain: u8,
    /// Radio mixer gain (4 bits)
    pub mix_gain: u8,
    /// External PA gain (2 bits)
    #[cfg_attr(feature = "serde", serde(default))]
    pub pa_gain: u8,
    /// Measured power at the board connector (dBm)
    pub rf_power: i8,
}

impl TxGainEntry {
    fn validate(&self) -> Result<()> {
        if self.dig_gain > 3 {
            return Err(HalError::InvalidArgument("digital gain must be 0..=3".into()));
        }
        if self.dac_gain > 3 {
            return Err(HalError::InvalidArgument("DAC gain must be 0..=3".into()));
        }
        if self.mix_gain > 15 {
            return Err(HalError::InvalidArgument("mixer gain must be 0..=15".into()));
        }
        if self.pa_gain > 3 {
            return Err(HalError::InvalidArgument("PA gain must be 0..=3".into()));
        }
        Ok(())
    }
}

/// TX gain table, strictly increasing in power
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxGainLut {
    entries: Vec<TxGainEntry>,
}

impl Default for TxGainLut {
    fn default() -> Self {
        Self {
            entries: vec![
                TxGainEntry {
                    dig_gain: 0,
                    dac_gain: 3,
                    mix_gain: 10,
                    pa_gain: 2,
                    rf_power: 14,
                },
                TxGainEntry {
                    dig_gain: 0,
                    dac_gain: 3,
                    mix_gain: 14,
                    pa_gain: 3,
                    rf_power: 27,
                },
            ],
        }
    }
}

impl TxGainLut {
    /// Validate and build a table
    pub fn new(entries: &[TxGainEntry]) -> Result<Self> {
        if entries.is_empty() || entries.len() > TX_GAIN_LUT_SIZE_MAX {
            return Err(HalError::InvalidArgument(format!(
                "TX gain LUT needs 1..={TX_GAIN_LUT_SIZE_MAX} entries, got {}",
                entries.len()
            )));
        }
        for entry in entries {
            entry.validate()?;
        }
        if entries.windows(2).any(|w| w[1].rf_power <= w[0].rf_power) {
            return Err(HalError::InvalidArgument(
                "TX gain LUT must be strictly increasing in rf_power".into(),
            ));
        }
        Ok(Self {
            entries: entries.to_vec(),
        })
    }

    pub fn entries(&self) -> &[TxGainEntry] {
        &self.entries
    }

    /// Highest achievable power (dBm)
    pub fn max_power(&self) -> i8 {
        self.entries.last().map(|e| e.rf_power).unwrap_or(i8::MIN)
    }

    /// Entry for a requested power
    ///
    /// Picks the highest entry not above `requested`, or the lowest entry when
    /// `requested` is below the whole table.
    pub fn select(&self, requested: i8) -> Result<(usize, TxGainEntry)> {
        let max = self.max_power();
        if requested > max {
            return Err(HalError::PowerUnavailable { requested, max });
        }
        let index = self
            .entries
            .iter()
            .rposition(|e| e.rf_power <= requested)
            .unwrap_or(0);
        Ok((index, self.entries[index]))
    }
}

/// Validated configuration of a concentrator
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigStore {
    board: BoardConfig,
    rf_chains: [RfChainConfig; RF_CHAIN_NB],
    if_chains: [IfChainConfig; IF_CHAIN_NB],
    tx_gain_lut: TxGainLut,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            rf_chains: [RfChainConfig::default(); RF_CHAIN_NB],
            if_chains: std::array::from_fn(|i| IfChainConfig::disabled(IFMOD_CONFIG[i])),
            tx_gain_lut: TxGainLut::default(),
        }
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }

    /// RF chain settings, `None` for an out-of-range index
    pub fn rf_chain(&self, chain: u8) -> Option<&RfChainConfig> {
        self.rf_chains.get(chain as usize)
    }

    /// IF chain settings, `None` for an out-of-range index
    pub fn if_chain(&self, chain: u8) -> Option<&IfChainConfig> {
        self.if_chains.get(chain as usize)
    }

    pub fn tx_gain_lut(&self) -> &TxGainLut {
        &self.tx_gain_lut
    }

    /// Enabled RF chains with their index
    pub fn enabled_rf_chains(&self) -> impl Iterator<Item = (u8, &RfChainConfig)> {
        self.rf_chains
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enable)
            .map(|(i, c)| (i as u8, c))
    }

    /// Enabled IF chains with their index
    pub fn enabled_if_chains(&self) -> impl Iterator<Item = (u8, &IfChainConfig)> {
        self.if_chains
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enable)
            .map(|(i, c)| (i as u8, c))
    }

    /// Sync word length of the FSK modem, the default one when disabled
    pub fn fsk_sync_word_size(&self) -> u8 {
        self.enabled_if_chains()
            .find_map(|(_, c)| match c.modem {
                IfModemConfig::Fsk { sync_word_size, .. } => Some(sync_word_size),
                _ => None,
            })
            .unwrap_or(FSK_SYNC_WORD_SIZE_DEFAULT)
    }

    /// At least one enabled RF chain and one enabled IF chain
    pub fn is_configured(&self) -> bool {
        self.enabled_rf_chains().next().is_some() && self.enabled_if_chains().next().is_some()
    }

    pub fn set_board_config(&mut self, conf: BoardConfig) -> Result<()> {
        if conf.clksrc as usize >= RF_CHAIN_NB {
            error!("clock source {} is not a valid RF chain", conf.clksrc);
            return Err(HalError::InvalidArgument(format!(
                "clock source {} is not a valid RF chain",
                conf.clksrc
            )));
        }
        self.board = conf;
        debug!(
            "board configuration: lorawan_public={} clksrc={} full_duplex={}",
            conf.lorawan_public, conf.clksrc, conf.full_duplex
        );
        Ok(())
    }

    pub fn set_rf_chain_config(&mut self, chain: u8, conf: RfChainConfig) -> Result<()> {
        if chain as usize >= RF_CHAIN_NB {
            error!("{} is not a valid RF chain number", chain);
            return Err(HalError::InvalidArgument(format!("RF chain {chain} out of range")));
        }

        if conf.enable {
            check_rf_frequency(conf.freq_hz)
                .and_then(|_| pll_register(conf.freq_hz, conf.radio_type))
                .inspect_err(|e| error!("RF chain {}: {}", chain, e))?;
        } else if let Some((if_chain, _)) =
            self.enabled_if_chains().find(|(_, c)| c.rf_chain == chain)
        {
            error!("RF chain {} still feeds IF chain {}", chain, if_chain);
            return Err(HalError::InvalidArgument(format!(
                "RF chain {chain} is referenced by enabled IF chain {if_chain}"
            )));
        }

        self.rf_chains[chain as usize] = conf;
        debug!(
            "rf_chain {} configuration; en:{} freq:{} rssi_offset:{} radio_type:{} tx_enable:{}",
            chain, conf.enable, conf.freq_hz, conf.rssi_offset, conf.radio_type, conf.tx_enable
        );
        Ok(())
    }

    pub fn set_if_chain_config(&mut self, chain: u8, conf: IfChainConfig) -> Result<()> {
        let Some(&expected) = IFMOD_CONFIG.get(chain as usize) else {
            error!("{} is not a valid IF chain number", chain);
            return Err(HalError::InvalidArgument(format!("IF chain {chain} out of range")));
        };

        if !conf.enable {
            self.if_chains[chain as usize] = IfChainConfig::disabled(expected);
            debug!("if_chain {} disabled", chain);
            return Ok(());
        }

        self.validate_if_chain(chain, expected, &conf)
            .inspect_err(|e| error!("IF chain {}: {}", chain, e))?;

        self.if_chains[chain as usize] = conf;
        debug!(
            "if_chain {} configuration; radio:{} offset:{} modem:{:?}",
            chain, conf.rf_chain, conf.freq_offset_hz, conf.modem
        );
        Ok(())
    }

    fn validate_if_chain(&self, chain: u8, expected: ModemKind, conf: &IfChainConfig) -> Result<()> {
        if conf.modem.kind() != expected {
            return Err(HalError::InvalidArgument(format!(
                "IF chain {chain} is wired to a {expected:?} modem, not {:?}",
                conf.modem.kind()
            )));
        }

        let rf_enabled = self
            .rf_chain(conf.rf_chain)
            .map(|rf| rf.enable)
            .unwrap_or(false);
        if !rf_enabled {
            return Err(HalError::InvalidArgument(format!(
                "RF chain {} is not enabled",
                conf.rf_chain
            )));
        }

        let half_rf = RF_RX_BANDWIDTH[conf.rf_chain as usize] as i64 / 2;
        let half_bw = conf.modem.bandwidth().hz() as i64 / 2;
        let offset = conf.freq_offset_hz as i64;
        if offset + half_bw > half_rf {
            return Err(HalError::InvalidArgument(format!("IF frequency {offset} too high")));
        }
        if offset - half_bw < -half_rf {
            return Err(HalError::InvalidArgument(format!("IF frequency {offset} too low")));
        }

        if let IfModemConfig::Fsk {
            datarate,
            sync_word_size,
            sync_word,
            ..
        } = conf.modem
        {
            check_fsk_datarate(datarate)?;
            if !(1..=8).contains(&sync_word_size) {
                return Err(HalError::InvalidArgument(format!(
                    "FSK sync word size {sync_word_size} outside 1..=8"
                )));
            }
            if sync_word.checked_shr(8 * sync_word_size as u32).unwrap_or(0) != 0 {
                return Err(HalError::InvalidArgument(format!(
                    "FSK sync word 0x{sync_word:X} longer than {sync_word_size} bytes"
                )));
            }
        }
        Ok(())
    }

    pub fn set_tx_gain_lut(&mut self, entries: &[TxGainEntry]) -> Result<()> {
        let lut = TxGainLut::new(entries).inspect_err(|e| error!("{}", e))?;
        debug!("TX gain LUT set with {} entries", lut.entries().len());
        self.tx_gain_lut = lut;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rf(freq_hz: u32) -> RfChainConfig {
        RfChainConfig {
            enable: true,
            freq_hz,
            rssi_offset: -166.0,
            radio_type: RadioType::Sx1257,
            tx_enable: true,
        }
    }

    fn multi(rf_chain: u8, offset: i32) -> IfChainConfig {
        IfChainConfig {
            enable: true,
            rf_chain,
            freq_offset_hz: offset,
            modem: IfModemConfig::LoraMulti,
        }
    }

    fn gain(rf_power: i8) -> TxGainEntry {
        TxGainEntry {
            dig_gain: 0,
            dac_gain: 3,
            mix_gain: 10,
            pa_gain: 1,
            rf_power,
        }
    }

    #[test]
    fn test_default_store_not_configured() {
        let store = ConfigStore::new();
        assert!(!store.is_configured());
        assert_eq!(store.enabled_rf_chains().count(), 0);
        assert_eq!(store.if_chain(9).unwrap().modem.kind(), ModemKind::Fsk);
    }

    #[test]
    fn test_rf_chain_index_checked() {
        let mut store = ConfigStore::new();
        assert!(matches!(
            store.set_rf_chain_config(2, rf(868_000_000)),
            Err(HalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rf_chain_frequency_checked() {
        let mut store = ConfigStore::new();
        assert!(store.set_rf_chain_config(0, rf(868_000)).is_err());
        // disabled chain ignores its frequency
        let disabled = RfChainConfig {
            enable: false,
            ..rf(0)
        };
        assert!(store.set_rf_chain_config(0, disabled).is_ok());
    }

    #[test]
    fn test_rf_chain_tuning_range_per_radio() {
        let mut store = ConfigStore::new();
        let sx1255 = |freq_hz| RfChainConfig {
            radio_type: RadioType::Sx1255,
            ..rf(freq_hz)
        };
        // 868 MHz overflows the SX1255's 24-bit PLL register
        assert!(matches!(
            store.set_rf_chain_config(0, sx1255(868_000_000)),
            Err(HalError::InvalidArgument(_))
        ));
        assert!(!store.rf_chain(0).unwrap().enable);
        assert!(store.set_rf_chain_config(0, sx1255(433_000_000)).is_ok());
        assert!(store.set_rf_chain_config(1, rf(868_000_000)).is_ok());
    }

    #[test]
    fn test_if_chain_requires_enabled_rf() {
        let mut store = ConfigStore::new();
        assert!(store.set_if_chain_config(0, multi(0, 0)).is_err());
        store.set_rf_chain_config(0, rf(867_500_000)).unwrap();
        assert!(store.set_if_chain_config(0, multi(0, 0)).is_ok());
        assert!(store.set_if_chain_config(1, multi(1, 0)).is_err());
        assert!(store.is_configured());
    }

    #[test]
    fn test_if_chain_index_and_modem_checked() {
        let mut store = ConfigStore::new();
        store.set_rf_chain_config(0, rf(867_500_000)).unwrap();
        assert!(store.set_if_chain_config(10, multi(0, 0)).is_err());
        // chain 8 is the stand-alone LoRa modem
        assert!(store.set_if_chain_config(8, multi(0, 0)).is_err());
        let std = IfChainConfig {
            modem: IfModemConfig::default_for(ModemKind::LoraStd),
            ..multi(0, 0)
        };
        assert!(store.set_if_chain_config(8, std).is_ok());
        assert!(store.set_if_chain_config(9, std).is_err());
    }

    #[test]
    fn test_if_offset_within_rf_bandwidth() {
        let mut store = ConfigStore::new();
        store.set_rf_chain_config(0, rf(867_500_000)).unwrap();
        // 437.5 kHz + 62.5 kHz = 500 kHz, exactly the edge
        assert!(store.set_if_chain_config(0, multi(0, 437_500)).is_ok());
        assert!(store.set_if_chain_config(1, multi(0, 437_501)).is_err());
        assert!(store.set_if_chain_config(1, multi(0, -437_500)).is_ok());
        assert!(store.set_if_chain_config(2, multi(0, -437_501)).is_err());

        // a 250 kHz stand-alone channel has less room
        let std = IfChainConfig {
            modem: IfModemConfig::LoraStd {
                bandwidth: Bandwidth::Khz250,
                spreading_factor: SpreadingFactor::Sf7,
            },
            ..multi(0, 400_000)
        };
        assert!(store.set_if_chain_config(8, std).is_err());
    }

    #[test]
    fn test_fsk_parameters_checked() {
        let mut store = ConfigStore::new();
        store.set_rf_chain_config(1, rf(868_500_000)).unwrap();
        let fsk = |datarate, sync_word_size| IfChainConfig {
            enable: true,
            rf_chain: 1,
            freq_offset_hz: 300_000,
            modem: IfModemConfig::Fsk {
                bandwidth: Bandwidth::Khz125,
                datarate,
                sync_word_size,
                sync_word: FSK_SYNC_WORD_DEFAULT,
            },
        };
        assert!(store.set_if_chain_config(9, fsk(50_000, 3)).is_ok());
        assert!(store.set_if_chain_config(9, fsk(100, 3)).is_err());
        assert!(store.set_if_chain_config(9, fsk(50_000, 0)).is_err());
        // 0xC194C1 does not fit two bytes
        assert!(store.set_if_chain_config(9, fsk(50_000, 2)).is_err());
        assert!(store.set_if_chain_config(9, fsk(50_000, 8)).is_ok());
        assert_eq!(store.fsk_sync_word_size(), 8);
    }

    #[test]
    fn test_fsk_sync_word_size_defaults_when_disabled() {
        let store = ConfigStore::new();
        assert_eq!(store.fsk_sync_word_size(), FSK_SYNC_WORD_SIZE_DEFAULT);
    }

    #[test]
    fn test_disabling_referenced_rf_chain_rejected() {
        let mut store = ConfigStore::new();
        store.set_rf_chain_config(0, rf(867_500_000)).unwrap();
        store.set_if_chain_config(3, multi(0, 0)).unwrap();
        let off = RfChainConfig {
            enable: false,
            ..rf(867_500_000)
        };
        assert!(store.set_rf_chain_config(0, off).is_err());

        store.set_if_chain_config(3, IfChainConfig::disabled(ModemKind::LoraMulti)).unwrap();
        assert!(store.set_rf_chain_config(0, off).is_ok());
    }

    #[test]
    fn test_board_clock_source_checked() {
        let mut store = ConfigStore::new();
        let board = BoardConfig {
            lorawan_public: true,
            clksrc: 1,
            full_duplex: false,
        };
        assert!(store.set_board_config(board).is_ok());
        assert_eq!(store.board().sync_word(), LORA_SYNC_WORD_PUBLIC);
        assert!(store.set_board_config(BoardConfig { clksrc: 2, ..board }).is_err());
    }

    #[test]
    fn test_tx_gain_lut_validation() {
        let mut store = ConfigStore::new();
        assert!(store.set_tx_gain_lut(&[]).is_err());
        assert!(store.set_tx_gain_lut(&vec![gain(10); 17]).is_err());
        assert!(store.set_tx_gain_lut(&[gain(14), gain(10)]).is_err());
        assert!(store.set_tx_gain_lut(&[gain(14), gain(14)]).is_err());
        let bad = TxGainEntry {
            mix_gain: 16,
            ..gain(14)
        };
        assert!(store.set_tx_gain_lut(&[bad]).is_err());

        let entries: Vec<_> = (0..16).map(|p| gain(p as i8 + 10)).collect();
        assert!(store.set_tx_gain_lut(&entries).is_ok());
        assert_eq!(store.tx_gain_lut().max_power(), 25);
    }

    #[test]
    fn test_tx_gain_select() {
        let lut = TxGainLut::new(&[gain(10), gain(14), gain(20), gain(27)]).unwrap();
        assert_eq!(lut.select(14).unwrap().0, 1);
        assert_eq!(lut.select(19).unwrap().0, 1);
        assert_eq!(lut.select(27).unwrap().0, 3);
        // below the table falls back to the lowest entry
        assert_eq!(lut.select(2).unwrap().0, 0);
        assert_eq!(
            lut.select(30),
            Err(HalError::PowerUnavailable { requested: 30, max: 27 })
        );
    }

    #[test]
    fn test_center_freq() {
        let chain = multi(0, -187_500);
        assert_eq!(chain.center_freq(867_500_000), 867_312_500);
    }
}
