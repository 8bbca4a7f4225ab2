//! RX pipeline: calibrates demodulator output and buffers it for `receive`

use std::collections::VecDeque;

use tracing::debug;

use crate::config::{ConfigStore, IfModemConfig};
use crate::error::{HalError, Result};
use crate::packet::{RxFrame, RxPacket};
use crate::regmath::resolve_rssi;
use crate::types::{Bandwidth, Datarate, IF_CHAIN_NB, MAX_PAYLOAD_SIZE};

/// Packets held at most; further frames are dropped and counted until `receive` drains
pub const RX_FIFO_CAPACITY: usize = 16;

/// Packets returned by one `receive` call, oldest first
#[derive(Debug, Default)]
pub struct RxBatch {
    packets: std::vec::IntoIter<RxPacket>,
}

impl RxBatch {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<Vec<RxPacket>> for RxBatch {
    fn from(packets: Vec<RxPacket>) -> Self {
        Self {
            packets: packets.into_iter(),
        }
    }
}

impl Iterator for RxBatch {
    type Item = RxPacket;

    fn next(&mut self) -> Option<RxPacket> {
        self.packets.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.packets.size_hint()
    }
}

impl ExactSizeIterator for RxBatch {}

/// Bounded FIFO of calibrated packets
#[derive(Debug, Default)]
pub struct RxPipeline {
    fifo: VecDeque<RxPacket>,
    dropped: u64,
}

impl RxPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending packets
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Frames discarded since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.fifo.clear();
    }

    /// Turn a demodulated frame into a packet and queue it
    ///
    /// Returns `Ok(false)` when the frame is dropped the way the hardware
    /// would drop it: SF mismatch on the stand-alone modem, receivers muted
    /// by a half-duplex emission, or a full FIFO. Frames that could never
    /// come out of a demodulator are rejected.
    pub fn ingest(
        &mut self,
        frame: RxFrame,
        config: &ConfigStore,
        count_us: u32,
        rx_suspended: bool,
    ) -> Result<bool> {
        let Some(if_conf) = config.if_chain(frame.if_chain).copied() else {
            return Err(HalError::InvalidArgument(format!(
                "IF chain {} out of range (0..{IF_CHAIN_NB})",
                frame.if_chain
            )));
        };
        if !if_conf.enable {
            return Err(HalError::InvalidArgument(format!(
                "IF chain {} is disabled",
                frame.if_chain
            )));
        }
        if frame.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(HalError::InvalidArgument(format!(
                "payload of {} bytes exceeds {MAX_PAYLOAD_SIZE}",
                frame.payload.len()
            )));
        }

        let (bandwidth, datarate) = match if_conf.modem {
            IfModemConfig::LoraMulti => {
                let sf = frame.spreading_factor.ok_or_else(|| {
                    HalError::InvalidArgument("LoRa frame without spreading factor".into())
                })?;
                (Bandwidth::Khz125, Datarate::Lora(sf))
            }
            IfModemConfig::LoraStd {
                bandwidth,
                spreading_factor,
            } => {
                if frame.spreading_factor != Some(spreading_factor) {
                    debug!(
                        "IF{}: frame at {:?} does not match {}, dropped",
                        frame.if_chain, frame.spreading_factor, spreading_factor
                    );
                    return Ok(self.drop_frame());
                }
                (bandwidth, Datarate::Lora(spreading_factor))
            }
            IfModemConfig::Fsk {
                bandwidth,
                datarate,
                ..
            } => (bandwidth, Datarate::Fsk(datarate)),
        };

        if rx_suspended {
            debug!("IF{}: receivers suspended by TX, frame dropped", frame.if_chain);
            return Ok(self.drop_frame());
        }
        if self.fifo.len() >= RX_FIFO_CAPACITY {
            debug!("RX FIFO full, frame on IF{} dropped", frame.if_chain);
            return Ok(self.drop_frame());
        }

        let rf = config
            .rf_chain(if_conf.rf_chain)
            .copied()
            .unwrap_or_default();
        let kind = if_conf.modem.kind();
        let is_lora = matches!(datarate, Datarate::Lora(_));

        let packet = RxPacket {
            if_chain: frame.if_chain,
            rf_chain: if_conf.rf_chain,
            freq_hz: if_conf.center_freq(rf.freq_hz),
            status: frame.status,
            count_us,
            modulation: kind.modulation(),
            bandwidth,
            datarate,
            coderate: is_lora.then_some(frame.coderate),
            rssi: resolve_rssi(frame.raw_rssi + rf.rssi_offset, kind),
            snr: is_lora.then_some(frame.snr),
            crc: frame.crc,
            payload: frame.payload,
        };
        debug!("RX queued: {}", packet);
        self.fifo.push_back(packet);
        Ok(true)
    }

    /// Pop up to `max` packets, oldest first
    pub fn drain(&mut self, max: u8) -> RxBatch {
        let n = self.fifo.len().min(max as usize);
        RxBatch::from(self.fifo.drain(..n).collect::<Vec<_>>())
    }

    fn drop_frame(&mut self) -> bool {
        self.dropped += 1;
        false
    }
}
