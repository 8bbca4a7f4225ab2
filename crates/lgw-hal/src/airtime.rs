//! Time-on-air of LoRa and FSK packets

use crate::regmath::resolve_ppm;
use crate::types::{Bandwidth, CodeRate, Datarate, SpreadingFactor};

/// LoRa packet duration in microseconds
///
/// Standard SX127x/SX130x formula; low datarate optimisation is on for the
/// same combinations that need PPM compensation.
pub fn lora_time_on_air_us(
    bandwidth: Bandwidth,
    sf: SpreadingFactor,
    coderate: CodeRate,
    preamble: u16,
    no_header: bool,
    no_crc: bool,
    payload_len: usize,
) -> u32 {
    let sf_val = sf.value() as f64;
    let symbol_us = (1u64 << sf.value()) as f64 * 1e6 / bandwidth.hz() as f64;
    let de = if resolve_ppm(bandwidth, Datarate::Lora(sf)) { 1.0 } else { 0.0 };
    let ih = if no_header { 1.0 } else { 0.0 };
    let crc = if no_crc { 0.0 } else { 1.0 };

    let numerator = 8.0 * payload_len as f64 - 4.0 * sf_val + 28.0 + 16.0 * crc - 20.0 * ih;
    let denominator = 4.0 * (sf_val - 2.0 * de);
    let payload_symbols =
        8.0 + ((numerator / denominator).ceil() * (coderate.index() as f64 + 4.0)).max(0.0);

    let preamble_us = (preamble as f64 + 4.25) * symbol_us;
    (preamble_us + payload_symbols * symbol_us).ceil() as u32
}

/// FSK packet duration in microseconds
///
/// Counts preamble, sync word, length byte, payload and optional CRC.
pub fn fsk_time_on_air_us(
    datarate: u32,
    preamble: u16,
    sync_word_size: u8,
    no_crc: bool,
    payload_len: usize,
) -> u32 {
    let crc_bytes = if no_crc { 0 } else { 2 };
    let bytes = preamble as u64 + sync_word_size as u64 + 1 + payload_len as u64 + crc_bytes;
    ((bytes * 8 * 1_000_000).div_ceil(datarate.max(1) as u64)) as u32
}
