//! Channel plans and simulation settings

use lgw_hal::{
    Bandwidth, BoardConfig, CodeRate, Concentrator, ConfigStore, IfChainConfig, IfModemConfig,
    RadioType, RfChainConfig, SpreadingFactor, TxGainEntry,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SimError;
use crate::node::NodeConfig;

/// Everything needed to run a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub board: BoardConfig,
    /// Indexed by RF chain
    pub rf_chains: Vec<RfChainConfig>,
    /// Indexed by IF chain; missing entries stay disabled
    pub if_chains: Vec<IfChainConfig>,
    /// Empty keeps the concentrator's default table
    pub tx_gain_lut: Vec<TxGainEntry>,
    pub nodes: Vec<NodeConfig>,
    /// Period between uplinks of each node (ms)
    pub uplink_interval_ms: u64,
    /// Period between `receive` polls (ms)
    pub poll_interval_ms: u64,
    /// Delay between an uplink and its downlink (µs)
    pub downlink_delay_us: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        eu868_plan()
    }
}

impl SimConfig {
    /// Validate the radio settings into a configuration store
    pub fn to_config_store(&self) -> Result<ConfigStore, SimError> {
        let mut store = ConfigStore::new();
        store.set_board_config(self.board)?;
        for (chain, rf) in self.rf_chains.iter().enumerate() {
            store.set_rf_chain_config(chain as u8, *rf)?;
        }
        for (chain, ifc) in self.if_chains.iter().enumerate() {
            store.set_if_chain_config(chain as u8, *ifc)?;
        }
        if !self.tx_gain_lut.is_empty() {
            store.set_tx_gain_lut(&self.tx_gain_lut)?;
        }
        Ok(store)
    }

    /// Configure a concentrator with the radio settings
    pub fn apply(&self, concentrator: &Concentrator) -> Result<(), SimError> {
        let store = self.to_config_store()?;
        concentrator.apply_config(&store)?;
        info!(
            "applied plan: {} RF chain(s), {} IF chain(s)",
            store.enabled_rf_chains().count(),
            store.enabled_if_chains().count()
        );
        Ok(())
    }
}

fn radio(freq_hz: u32, tx_enable: bool) -> RfChainConfig {
    RfChainConfig {
        enable: true,
        freq_hz,
        rssi_offset: -166.0,
        radio_type: RadioType::Sx1257,
        tx_enable,
    }
}

fn multi_sf(rf_chain: u8, freq_offset_hz: i32) -> IfChainConfig {
    IfChainConfig {
        enable: true,
        rf_chain,
        freq_offset_hz,
        modem: IfModemConfig::LoraMulti,
    }
}

/// Stock EU868 gateway layout with a handful of nodes
///
/// | IF | radio | offset  | channel     |
/// |----|-------|---------|-------------|
/// | 0  | 1     | -400k   | 868.1 multi |
/// | 1  | 1     | -200k   | 868.3 multi |
/// | 2  | 1     | 0       | 868.5 multi |
/// | 3  | 0     | -400k   | 867.1 multi |
/// | 4  | 0     | -200k   | 867.3 multi |
/// | 5  | 0     | 0       | 867.5 multi |
/// | 6  | 0     | +200k   | 867.7 multi |
/// | 7  | 0     | +400k   | 867.9 multi |
/// | 8  | 1     | -200k   | 868.3 SF7BW250 |
/// | 9  | 1     | +300k   | 868.8 FSK 50 kbps |
pub fn eu868_plan() -> SimConfig {
    let mut if_chains = vec![
        multi_sf(1, -400_000),
        multi_sf(1, -200_000),
        multi_sf(1, 0),
        multi_sf(0, -400_000),
        multi_sf(0, -200_000),
        multi_sf(0, 0),
        multi_sf(0, 200_000),
        multi_sf(0, 400_000),
    ];
    if_chains.push(IfChainConfig {
        enable: true,
        rf_chain: 1,
        freq_offset_hz: -200_000,
        modem: IfModemConfig::LoraStd {
            bandwidth: Bandwidth::Khz250,
            spreading_factor: SpreadingFactor::Sf7,
        },
    });
    if_chains.push(IfChainConfig {
        enable: true,
        rf_chain: 1,
        freq_offset_hz: 300_000,
        modem: IfModemConfig::Fsk {
            bandwidth: Bandwidth::Khz125,
            datarate: 50_000,
            sync_word_size: 3,
            sync_word: lgw_hal::config::FSK_SYNC_WORD_DEFAULT,
        },
    });

    SimConfig {
        board: BoardConfig {
            lorawan_public: true,
            clksrc: 1,
            full_duplex: false,
        },
        rf_chains: vec![radio(867_500_000, true), radio(868_500_000, false)],
        if_chains,
        tx_gain_lut: Vec::new(),
        nodes: default_nodes(),
        uplink_interval_ms: 10_000,
        poll_interval_ms: 100,
        downlink_delay_us: 1_000_000,
    }
}

/// Four nodes spread over the 868.1/868.3/868.5 MHz join channels
fn default_nodes() -> Vec<NodeConfig> {
    let channels = [868_100_000, 868_300_000, 868_500_000];
    let sfs = [
        SpreadingFactor::Sf7,
        SpreadingFactor::Sf8,
        SpreadingFactor::Sf9,
        SpreadingFactor::Sf10,
    ];
    sfs.iter()
        .enumerate()
        .map(|(i, &spreading_factor)| NodeConfig {
            id: format!("node-{i}"),
            dev_addr: 0x2601_1000 + i as u32,
            freq_hz: channels[i % channels.len()],
            spreading_factor,
            bandwidth: Bandwidth::Khz125,
            coderate: CodeRate::Cr4_5,
            tx_power_dbm: 14,
            distance_m: 500.0 * (i + 1) as f32,
            app_payload_len: 12,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgw_hal::{ConcentratorState, ManualClock, IF_CHAIN_NB};

    #[test]
    fn test_eu868_plan_is_valid() {
        let store = eu868_plan().to_config_store().unwrap();
        assert_eq!(store.enabled_rf_chains().count(), 2);
        assert_eq!(store.enabled_if_chains().count(), IF_CHAIN_NB);
        let ifc = store.if_chain(9).unwrap();
        let rf = store.rf_chain(ifc.rf_chain).unwrap();
        assert_eq!(ifc.center_freq(rf.freq_hz), 868_800_000);
    }

    #[test]
    fn test_apply_configures_concentrator() {
        let conc = Concentrator::with_clock(ManualClock::new());
        eu868_plan().apply(&conc).unwrap();
        assert_eq!(conc.state(), ConcentratorState::Configured);
        assert_eq!(conc.config().board().clksrc, 1);
        conc.start().unwrap();
    }

    #[test]
    fn test_bad_plan_rejected() {
        let mut plan = eu868_plan();
        plan.rf_chains[1].enable = false;
        assert!(matches!(plan.to_config_store(), Err(SimError::Hal(_))));

        let conc = Concentrator::with_clock(ManualClock::new());
        assert!(plan.apply(&conc).is_err());
        assert_eq!(conc.state(), ConcentratorState::Unconfigured);
    }

    #[test]
    fn test_default_nodes_on_plan_channels() {
        let plan = SimConfig::default();
        assert_eq!(plan.nodes.len(), 4);
        assert!(plan
            .nodes
            .iter()
            .all(|n| [868_100_000, 868_300_000, 868_500_000].contains(&n.freq_hz)));
    }

    #[test]
    fn test_json_round_trip_and_defaults() {
        let plan = eu868_plan();
        let json = serde_json::to_string(&plan).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);

        let partial: SimConfig = serde_json::from_str(r#"{"poll_interval_ms": 5}"#).unwrap();
        assert_eq!(partial.poll_interval_ms, 5);
        assert_eq!(partial.rf_chains, plan.rf_chains);
    }
}
