//! # QSP Payload Decoder
//!
//! Decodes RC channel, receiver health, ping and bind payloads delivered by
//! the frame parser.

use super::encoder::{high_shift, low_shift};
use super::protocol::*;
use crate::error::{QspError, Result};

/// Destination for decoded RC channel values
#[cfg_attr(test, mockall::automock)]
pub trait ChannelSink {
    /// Receive the decoded value of channel `index`
    ///
    /// `value` is relative to `default_value` (the channel minimum, 1000), so
    /// an output stage reconstructs microseconds as `value + default_value`.
    fn set_channel_value(&mut self, index: usize, value: u16, default_value: u16);
}

/// Stores raw decoded values; indices past the end are ignored
impl ChannelSink for [u16] {
    fn set_channel_value(&mut self, index: usize, value: u16, _default_value: u16) {
        if let Some(slot) = self.get_mut(index) {
            *slot = value;
        }
    }
}

fn ensure_len(frame: &'static str, payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() < expected {
        return Err(QspError::PayloadTooShort {
            frame,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Decode a 9-byte RC data payload into a channel sink
///
/// Exact inverse of the encoder's bit packing. Channels 4-9 are widened by
/// the shift used to narrow them, so every channel reports on the same
/// 0-1023 scale. No clamping is applied.
///
/// # Errors
///
/// Returns error if the payload is shorter than 9 bytes
pub fn decode_rc_data_payload<S>(payload: &[u8], sink: &mut S) -> Result<()>
where
    S: ChannelSink + ?Sized,
{
    ensure_len("RC data", payload, QSP_RC_DATA_PAYLOAD_SIZE)?;

    let data: [u16; QSP_RC_DATA_PAYLOAD_SIZE] = std::array::from_fn(|i| payload[i] as u16);

    for i in 0..4 {
        let high = high_shift(i);
        let low = low_shift(i);
        let byte_index = i + i / 4;

        let value = ((data[byte_index] << high) & (0x03FFu16 & (0x03FFu16 << high)))
            | ((data[byte_index + 1] >> low) & (0xFFu16 >> low));

        sink.set_channel_value(i, value, QSP_CHANNEL_DEFAULT);
    }

    sink.set_channel_value(4, data[5] << 2, QSP_CHANNEL_DEFAULT);
    sink.set_channel_value(5, data[6] << 2, QSP_CHANNEL_DEFAULT);
    sink.set_channel_value(6, ((data[7] >> 4) & 0x0F) << 6, QSP_CHANNEL_DEFAULT);
    sink.set_channel_value(7, (data[7] & 0x0F) << 6, QSP_CHANNEL_DEFAULT);
    sink.set_channel_value(8, ((data[8] >> 4) & 0x0F) << 6, QSP_CHANNEL_DEFAULT);
    sink.set_channel_value(9, (data[8] & 0x0F) << 6, QSP_CHANNEL_DEFAULT);

    Ok(())
}

/// Decode a 9-byte RC data payload into raw channel values
///
/// # Returns
///
/// * `Result<RcChannels>` - Values relative to [`QSP_CHANNEL_DEFAULT`]
pub fn decode_rc_channels(payload: &[u8]) -> Result<RcChannels> {
    let mut channels = [0u16; QSP_NUM_CHANNELS];
    decode_rc_data_payload(payload, &mut channels[..])?;
    Ok(channels)
}

/// Decode an RX health payload into the receiver device state
///
/// Flags are copied verbatim.
pub fn decode_rx_health_payload(payload: &[u8], rx_state: &mut RxDeviceState) -> Result<()> {
    ensure_len("RX health", payload, QSP_RX_HEALTH_PAYLOAD_SIZE)?;

    rx_state.rssi = payload[0];
    rx_state.snr = payload[1];
    rx_state.rx_voltage = payload[2];
    rx_state.a1_voltage = payload[3];
    rx_state.a2_voltage = payload[4];
    rx_state.flags = payload[5];

    Ok(())
}

/// Decode the little-endian timestamp carried by a ping payload
pub fn decode_ping_payload(payload: &[u8]) -> Result<u32> {
    ensure_len("Ping", payload, QSP_PING_PAYLOAD_SIZE)?;
    Ok(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

/// Decode the bind key carried by a bind payload
pub fn decode_bind_payload(payload: &[u8]) -> Result<BindKey> {
    ensure_len("Bind", payload, QSP_BIND_PAYLOAD_SIZE)?;

    let mut key = [0u8; QSP_BIND_KEY_SIZE];
    key.copy_from_slice(&payload[..QSP_BIND_KEY_SIZE]);
    Ok(key)
}
