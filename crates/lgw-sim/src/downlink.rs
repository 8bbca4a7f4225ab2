//! Downlinks answering received uplinks

use lgw_hal::{
    counter_reached, CodeRate, CrcStatus, Datarate, RxPacket, TxMode, TxModulation, TxPacket,
    TX_START_DELAY_US,
};

/// Unconfirmed data down MHDR
const MHDR_UNCONFIRMED_DOWN: u8 = 0x60;
/// FCtrl with the ACK bit set
const FCTRL_ACK: u8 = 0x20;

/// RF chain used for downlinks
pub const DOWNLINK_RF_CHAIN: u8 = 0;
/// Downlink power (dBm)
pub const DOWNLINK_POWER_DBM: i8 = 14;

/// Downlink acknowledging `uplink`, sent `delay_us` after it was received
///
/// Only LoRa uplinks with a good CRC and a full frame header get an answer.
/// The reply reuses the uplink's frequency and datarate with inverted
/// polarity, as in a LoRaWAN RX1 window.
pub fn downlink_for(uplink: &RxPacket, delay_us: u32) -> Option<TxPacket> {
    if uplink.status != CrcStatus::Ok {
        return None;
    }
    let Datarate::Lora(spreading_factor) = uplink.datarate else {
        return None;
    };
    let dev_addr = uplink.payload.get(1..5)?;
    let fcnt = uplink.payload.get(6..8)?;

    let mut payload = Vec::with_capacity(8);
    payload.push(MHDR_UNCONFIRMED_DOWN);
    payload.extend_from_slice(dev_addr);
    payload.push(FCTRL_ACK);
    payload.extend_from_slice(fcnt);

    Some(TxPacket {
        rf_chain: DOWNLINK_RF_CHAIN,
        freq_hz: uplink.freq_hz,
        tx_mode: TxMode::Timestamped {
            count_us: uplink.count_us.wrapping_add(delay_us),
        },
        rf_power: DOWNLINK_POWER_DBM,
        modulation: TxModulation::Lora {
            bandwidth: uplink.bandwidth,
            spreading_factor,
            coderate: uplink.coderate.unwrap_or(CodeRate::Cr4_5),
        },
        invert_pol: true,
        preamble: 8,
        no_crc: true,
        no_header: false,
        payload,
    })
}

/// Whether `packet` can still go out on time when the counter reads `now`
///
/// A timestamped downlink misses its window once the counter has reached
/// its start time minus the TX start delay.
pub fn window_open(packet: &TxPacket, now: u32) -> bool {
    match packet.tx_mode {
        TxMode::Timestamped { count_us } => {
            !counter_reached(now, count_us.wrapping_sub(TX_START_DELAY_US))
        }
        _ => true,
    }
}
