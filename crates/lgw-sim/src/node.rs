//! Virtual end-node
//!
//! A node builds LoRaWAN-shaped uplinks, respects a 1 % duty cycle and queues
//! what it sends until the caller hands it to the radio medium.

use std::collections::VecDeque;

use lgw_hal::airtime::lora_time_on_air_us;
use lgw_hal::{Bandwidth, CodeRate, SpreadingFactor, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SimError;

/// Unconfirmed data up MHDR
const MHDR_UNCONFIRMED_UP: u8 = 0x40;
/// MHDR + DevAddr + FCtrl + FCnt + FPort
const FRAME_HEADER_LEN: usize = 9;
/// Uplink preamble (symbols)
const UPLINK_PREAMBLE: u16 = 8;
/// Off-time per unit of airtime at 1 % duty cycle
const DUTY_CYCLE_OFF_FACTOR: u64 = 99;

/// A transmission leaving a node
#[derive(Debug, Clone, PartialEq)]
pub struct Uplink {
    /// Sending node
    pub node_id: String,
    pub dev_addr: u32,
    pub fcnt: u32,
    pub freq_hz: u32,
    pub spreading_factor: SpreadingFactor,
    pub bandwidth: Bandwidth,
    pub coderate: CodeRate,
    /// Radiated power (dBm)
    pub tx_power_dbm: i8,
    /// Time on air (µs)
    pub airtime_us: u32,
    pub payload: Vec<u8>,
}

/// Configuration for creating a virtual node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Display name/identifier
    pub id: String,
    pub dev_addr: u32,
    /// Uplink frequency (Hz)
    pub freq_hz: u32,
    pub spreading_factor: SpreadingFactor,
    pub bandwidth: Bandwidth,
    pub coderate: CodeRate,
    pub tx_power_dbm: i8,
    /// Distance to the gateway (m)
    pub distance_m: f32,
    /// Application payload length (bytes)
    pub app_payload_len: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "node-0".to_string(),
            dev_addr: 0x2601_1000,
            freq_hz: 868_100_000,
            spreading_factor: SpreadingFactor::Sf7,
            bandwidth: Bandwidth::Khz125,
            coderate: CodeRate::Cr4_5,
            tx_power_dbm: 14,
            distance_m: 1_000.0,
            app_payload_len: 12,
        }
    }
}

/// A simulated LoRa end-node
#[derive(Debug)]
pub struct VirtualNode {
    config: NodeConfig,
    /// Next frame counter
    fcnt: u32,
    /// Earliest time the duty cycle allows another uplink (µs)
    next_allowed_us: u64,
    /// Uplinks built but not yet put on air
    pending: VecDeque<Uplink>,
    /// Uplinks refused by the duty cycle
    deferred: u64,
}

impl VirtualNode {
    /// Create a node from configuration
    pub fn from_config(config: NodeConfig) -> Result<Self, SimError> {
        let max_app = MAX_PAYLOAD_SIZE - FRAME_HEADER_LEN;
        if config.app_payload_len > max_app {
            return Err(SimError::InvalidNode {
                node: config.id,
                reason: format!("application payload above {max_app} bytes"),
            });
        }
        if !config.distance_m.is_finite() || config.distance_m <= 0.0 {
            return Err(SimError::InvalidNode {
                node: config.id,
                reason: format!("distance {} m is not positive", config.distance_m),
            });
        }
        Ok(Self {
            config,
            fcnt: 0,
            next_allowed_us: 0,
            pending: VecDeque::new(),
            deferred: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn distance_m(&self) -> f32 {
        self.config.distance_m
    }

    /// Frame counter of the next uplink
    pub fn fcnt(&self) -> u32 {
        self.fcnt
    }

    /// Uplinks refused by the duty cycle so far
    pub fn deferred(&self) -> u64 {
        self.deferred
    }

    /// Move the node
    pub fn set_distance(&mut self, distance_m: f32) {
        self.config.distance_m = distance_m;
    }

    /// Time on air of one uplink (µs)
    pub fn airtime_us(&self) -> u32 {
        lora_time_on_air_us(
            self.config.bandwidth,
            self.config.spreading_factor,
            self.config.coderate,
            UPLINK_PREAMBLE,
            false,
            false,
            FRAME_HEADER_LEN + self.config.app_payload_len,
        )
    }

    /// Microseconds until the duty cycle allows an uplink
    pub fn duty_cycle_wait(&self, now_us: u64) -> u64 {
        self.next_allowed_us.saturating_sub(now_us)
    }

    /// Build the next uplink and queue it
    ///
    /// Returns the frame counter used, or `None` when the duty cycle does
    /// not allow a transmission at `now_us`.
    pub fn queue_uplink(&mut self, now_us: u64) -> Option<u32> {
        let wait = self.duty_cycle_wait(now_us);
        if wait > 0 {
            self.deferred += 1;
            debug!("node {} deferred by duty cycle for {} us", self.config.id, wait);
            return None;
        }

        let fcnt = self.fcnt;
        let airtime_us = self.airtime_us();
        let uplink = Uplink {
            node_id: self.config.id.clone(),
            dev_addr: self.config.dev_addr,
            fcnt,
            freq_hz: self.config.freq_hz,
            spreading_factor: self.config.spreading_factor,
            bandwidth: self.config.bandwidth,
            coderate: self.config.coderate,
            tx_power_dbm: self.config.tx_power_dbm,
            airtime_us,
            payload: self.build_payload(fcnt),
        };
        self.fcnt = self.fcnt.wrapping_add(1);
        self.next_allowed_us = now_us + airtime_us as u64 * (1 + DUTY_CYCLE_OFF_FACTOR);
        debug!(
            "node {} queued uplink fcnt {} ({} us on air)",
            self.config.id, fcnt, airtime_us
        );
        self.pending.push_back(uplink);
        Some(fcnt)
    }

    /// Take the oldest queued uplink
    pub fn take_uplink(&mut self) -> Option<Uplink> {
        self.pending.pop_front()
    }

    pub fn has_uplink(&self) -> bool {
        !self.pending.is_empty()
    }

    /// MHDR | DevAddr (LE) | FCtrl | FCnt (LE, 16 bits) | FPort | app payload
    fn build_payload(&self, fcnt: u32) -> Vec<u8> {
        let mut payload = Vec::with_capacity(FRAME_HEADER_LEN + self.config.app_payload_len);
        payload.push(MHDR_UNCONFIRMED_UP);
        payload.extend_from_slice(&self.config.dev_addr.to_le_bytes());
        payload.push(0x00);
        payload.extend_from_slice(&(fcnt as u16).to_le_bytes());
        payload.push(0x01);
        payload.extend((0..self.config.app_payload_len).map(|i| (fcnt as usize + i) as u8));
        payload
    }
}
