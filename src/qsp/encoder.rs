//! # QSP Frame Encoder
//!
//! Encodes RC channels, receiver health, ping and bind payloads, and
//! assembles complete QSP frames for transmission.

use super::crc::{crc8_dvb_s2_update, init_crc};
use super::protocol::*;

/// Source of RC channel values for encoding
#[cfg_attr(test, mockall::automock)]
pub trait ChannelSource {
    /// Current value of channel `index` in microseconds (nominally 1000-2000)
    fn channel_value(&self, index: usize) -> i32;
}

/// Channels past the end of the slice read as the minimum value
impl ChannelSource for [u16] {
    fn channel_value(&self, index: usize) -> i32 {
        self.get(index)
            .copied()
            .unwrap_or(QSP_CHANNEL_VALUE_MIN)
            .into()
    }
}

/// Clamp a channel value to valid QSP range (1000-2000)
///
/// # Examples
///
/// ```
/// use qsp_link::qsp::encoder::clamp_channel_value;
///
/// assert_eq!(clamp_channel_value(900), 1000);
/// assert_eq!(clamp_channel_value(1500), 1500);
/// assert_eq!(clamp_channel_value(2100), 2000);
/// ```
pub fn clamp_channel_value(value: i32) -> u16 {
    value.clamp(QSP_CHANNEL_VALUE_MIN.into(), QSP_CHANNEL_VALUE_MAX.into()) as u16
}

/// Shift of the high fragment for the 10-bit channels 0-3
pub(crate) fn high_shift(channel: usize) -> u32 {
    ((channel % 4) * 2 + 2) as u32
}

/// Shift of the low fragment for the 10-bit channels 0-3
pub(crate) fn low_shift(channel: usize) -> u32 {
    8 - high_shift(channel)
}

/// Encode up to 10 RC channels into a 9-byte payload
///
/// # Arguments
///
/// * `source` - Provides channel values by index
/// * `count` - Number of channels to read (values above 10 are capped)
///
/// # Algorithm
///
/// Each value is clamped to 1000-2000 and offset to 0-1000, then packed
/// MSB first with decreasing resolution:
/// ```text
/// Bytes 0-4: Ch0-Ch3, 10 bits each, straddling byte boundaries
/// Byte 5:    Ch4 bits 9:2
/// Byte 6:    Ch5 bits 9:2
/// Byte 7:    Ch6 bits 9:6 | Ch7 bits 9:6
/// Byte 8:    Ch8 bits 9:6 | Ch9 bits 9:6
/// ```
/// Channels beyond `count` stay zero.
pub fn encode_rc_data_payload<S>(source: &S, count: usize) -> Payload
where
    S: ChannelSource + ?Sized,
{
    let mut payload = Payload::zeroed(FrameType::RcData.payload_len());
    let data = payload.as_mut_slice();

    for i in 0..count.min(QSP_NUM_CHANNELS) {
        let value = clamp_channel_value(source.channel_value(i)) - QSP_CHANNEL_VALUE_MIN;

        let value10 = value & 0x03FF;
        let value8 = ((value >> 2) & 0xFF) as u8;
        let value4 = ((value >> 6) & 0x0F) as u8;

        match i {
            0..=3 => {
                let byte_index = i + i / 4;
                let high = high_shift(i);
                let low = low_shift(i);

                data[byte_index] |= ((value10 >> high) & (0x03FFu16 >> high)) as u8;
                data[byte_index + 1] |= ((value10 << low) & (0xFFu16 << low)) as u8;
            }
            4 | 5 => data[i + 1] |= value8,
            6 => data[7] |= value4 << 4,
            7 => data[7] |= value4,
            8 => data[8] |= value4 << 4,
            _ => data[8] |= value4,
        }
    }

    payload
}

/// Encode receiver health telemetry into a 6-byte payload
///
/// Voltages are taken from `rx_state`; rssi, snr and failsafe come from the
/// radio at the time of sending.
pub fn encode_rx_health_payload(
    rx_state: &RxDeviceState,
    rssi: u8,
    snr: u8,
    is_failsafe: bool,
) -> Payload {
    let mut flags = 0;
    if is_failsafe {
        flags |= QSP_FLAG_FAILSAFE;
    }

    let mut payload = Payload::new();
    for byte in [
        rssi,
        snr,
        rx_state.rx_voltage,
        rx_state.a1_voltage,
        rx_state.a2_voltage,
        flags,
    ] {
        payload.push(byte);
    }

    payload
}

/// Encode a 32-bit timestamp (microseconds) as a little-endian ping payload
pub fn encode_ping_payload(current_micros: u32) -> Payload {
    let mut payload = Payload::new();
    for byte in current_micros.to_le_bytes() {
        payload.push(byte);
    }
    payload
}

/// Encode the raw bind key as a bind payload
pub fn encode_bind_payload(bind_key: &BindKey) -> Payload {
    let mut payload = Payload::new();
    for &byte in bind_key.iter().take(QSP_BIND_PAYLOAD_SIZE) {
        payload.push(byte);
    }
    payload
}

/// Assemble a complete QSP frame
///
/// # Arguments
///
/// * `frame_type` - Frame type placed in the header's high nibble
/// * `radio_channel` - Radio channel placed in the header's low nibble
/// * `payload` - Pre-populated payload
/// * `bind_key` - Key salting the CRC
///
/// # Returns
///
/// * `EncodedFrame` - Header + payload + CRC (`payload.len() + 2` bytes)
///
/// # Examples
///
/// ```
/// use qsp_link::qsp::encoder::{encode_frame, encode_ping_payload};
/// use qsp_link::qsp::protocol::FrameType;
///
/// let payload = encode_ping_payload(0x1234_5678);
/// let frame = encode_frame(FrameType::Ping, 0, &payload, &[0, 0, 0, 0]);
/// assert_eq!(frame.as_bytes(), &[0x50, 0x78, 0x56, 0x34, 0x12, 0xAB]);
/// ```
pub fn encode_frame(
    frame_type: FrameType,
    radio_channel: u8,
    payload: &Payload,
    bind_key: &BindKey,
) -> EncodedFrame {
    let mut frame = EncodedFrame::new();
    let mut crc = init_crc(bind_key);

    let header = (frame_type.id() << 4) | (radio_channel & 0x0F);
    crc = crc8_dvb_s2_update(crc, header);
    frame.push(header);

    for &byte in payload.as_slice() {
        crc = crc8_dvb_s2_update(crc, byte);
        frame.push(byte);
    }

    frame.push(crc);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qsp::crc::crc8_dvb_s2;

    const BIND_KEY: BindKey = [0x11, 0x22, 0x33, 0x44];

    #[test]
    fn test_clamp_channel_value() {
        assert_eq!(clamp_channel_value(i32::MIN), 1000);
        assert_eq!(clamp_channel_value(0), 1000);
        assert_eq!(clamp_channel_value(999), 1000);
        assert_eq!(clamp_channel_value(1000), 1000);
        assert_eq!(clamp_channel_value(1500), 1500);
        assert_eq!(clamp_channel_value(2000), 2000);
        assert_eq!(clamp_channel_value(2001), 2000);
        assert_eq!(clamp_channel_value(i32::MAX), 2000);
    }

    #[test]
    fn test_shift_pairs() {
        assert_eq!((high_shift(0), low_shift(0)), (2, 6));
        assert_eq!((high_shift(1), low_shift(1)), (4, 4));
        assert_eq!((high_shift(2), low_shift(2)), (6, 2));
        assert_eq!((high_shift(3), low_shift(3)), (8, 0));
    }

    #[test]
    fn test_encode_rc_data_payload_length() {
        let channels = [QSP_CHANNEL_VALUE_CENTER; QSP_NUM_CHANNELS];
        assert_eq!(encode_rc_data_payload(&channels[..], 10).len(), 9);

        // Length does not depend on how many channels are supplied
        assert_eq!(encode_rc_data_payload(&channels[..], 4).len(), 9);
        assert_eq!(encode_rc_data_payload(&channels[..], 0).len(), 9);
    }

    #[test]
    fn test_encode_rc_data_all_min() {
        let channels = [QSP_CHANNEL_VALUE_MIN; QSP_NUM_CHANNELS];
        let payload = encode_rc_data_payload(&channels[..], 10);
        assert_eq!(payload.as_slice(), &[0u8; 9]);
    }

    #[test]
    fn test_encode_rc_data_all_centered() {
        let channels = [QSP_CHANNEL_VALUE_CENTER; QSP_NUM_CHANNELS];
        let payload = encode_rc_data_payload(&channels[..], 10);
        assert_eq!(
            payload.as_slice(),
            &[0x7D, 0x1F, 0x47, 0xD1, 0xF4, 0x7D, 0x7D, 0x77, 0x77]
        );
    }

    #[test]
    fn test_encode_rc_data_all_max() {
        let channels = [QSP_CHANNEL_VALUE_MAX; QSP_NUM_CHANNELS];
        let payload = encode_rc_data_payload(&channels[..], 10);
        assert_eq!(
            payload.as_slice(),
            &[0xFA, 0x3E, 0x8F, 0xA3, 0xE8, 0xFA, 0xFA, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_encode_rc_data_mixed_values() {
        let channels: [u16; QSP_NUM_CHANNELS] = [1000, 1250, 1500, 1750, 2000, 1100, 1900, 1300, 1700, 1999];
        let payload = encode_rc_data_payload(&channels[..], 10);
        assert_eq!(
            payload.as_slice(),
            &[0x00, 0x0F, 0xA7, 0xD2, 0xEE, 0xFA, 0x19, 0xE4, 0xAF]
        );
    }

    #[test]
    fn test_encode_rc_data_lowest_bit_of_first_channel() {
        let mut channels = [QSP_CHANNEL_VALUE_MIN; QSP_NUM_CHANNELS];
        channels[0] = 1001;

        let payload = encode_rc_data_payload(&channels[..], 10);

        // Ch0 bits 1:0 land in the top of byte 1
        assert_eq!(payload.as_slice(), &[0x00, 0x40, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_rc_data_clamping() {
        let over = [5000u16; QSP_NUM_CHANNELS];
        let max = [QSP_CHANNEL_VALUE_MAX; QSP_NUM_CHANNELS];
        assert_eq!(
            encode_rc_data_payload(&over[..], 10),
            encode_rc_data_payload(&max[..], 10)
        );

        let under = [0u16; QSP_NUM_CHANNELS];
        assert_eq!(encode_rc_data_payload(&under[..], 10).as_slice(), &[0u8; 9]);
    }

    #[test]
    fn test_encode_rc_data_count_limits_reads() {
        let mut source = MockChannelSource::new();
        source
            .expect_channel_value()
            .times(4)
            .returning(|_| 2000);

        let payload = encode_rc_data_payload(&source, 4);

        // Only the 10-bit region is populated
        assert_eq!(&payload.as_slice()[..5], &[0xFA, 0x3E, 0x8F, 0xA3, 0xE8]);
        assert_eq!(&payload.as_slice()[5..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_rc_data_count_is_capped() {
        let mut source = MockChannelSource::new();
        source
            .expect_channel_value()
            .times(QSP_NUM_CHANNELS)
            .returning(|_| 1500);

        let payload = encode_rc_data_payload(&source, 32);
        assert_eq!(payload.len(), QSP_RC_DATA_PAYLOAD_SIZE);
    }

    #[test]
    fn test_short_channel_slice_reads_minimum() {
        let channels = [2000u16; 2];
        assert_eq!(channels[..].channel_value(1), 2000);
        assert_eq!(channels[..].channel_value(2), 1000);
    }

    #[test]
    fn test_encode_rx_health_payload() {
        let rx_state = RxDeviceState {
            rx_voltage: 33,
            a1_voltage: 50,
            a2_voltage: 20,
            ..Default::default()
        };

        let payload = encode_rx_health_payload(&rx_state, 80, 12, true);
        assert_eq!(payload.as_slice(), &[80, 12, 33, 50, 20, 0x01]);

        let payload = encode_rx_health_payload(&rx_state, 80, 12, false);
        assert_eq!(payload.as_slice()[5], 0x00);
    }

    #[test]
    fn test_encode_ping_payload_little_endian() {
        let payload = encode_ping_payload(0x1234_5678);
        assert_eq!(payload.as_slice(), &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_encode_bind_payload() {
        let payload = encode_bind_payload(&BIND_KEY);
        assert_eq!(payload.as_slice(), &BIND_KEY);
        assert_eq!(payload.len(), FrameType::Bind.payload_len());
    }

    #[test]
    fn test_encode_frame_rc_data() {
        let channels = [QSP_CHANNEL_VALUE_CENTER; QSP_NUM_CHANNELS];
        let payload = encode_rc_data_payload(&channels[..], 10);
        let frame = encode_frame(FrameType::RcData, 3, &payload, &BIND_KEY);

        // Header + 9-byte payload + CRC
        assert_eq!(frame.len(), 11);
        assert_eq!(
            frame.as_bytes(),
            &[0x03, 0x7D, 0x1F, 0x47, 0xD1, 0xF4, 0x7D, 0x7D, 0x77, 0x77, 0xED]
        );
    }

    #[test]
    fn test_encode_frame_header() {
        let payload = encode_ping_payload(0);
        let frame = encode_frame(FrameType::Ping, 0x0A, &payload, &BIND_KEY);
        assert_eq!(frame.as_bytes()[0], 0x5A);

        // Radio channel is masked to the low nibble
        let frame = encode_frame(FrameType::Bind, 0xF3, &payload, &BIND_KEY);
        assert_eq!(frame.as_bytes()[0], 0x63);
    }

    #[test]
    fn test_encode_frame_crc_covers_key_header_and_payload() {
        let rx_state = RxDeviceState {
            rx_voltage: 33,
            a1_voltage: 50,
            a2_voltage: 20,
            ..Default::default()
        };
        let payload = encode_rx_health_payload(&rx_state, 80, 12, true);
        let frame = encode_frame(FrameType::RxHealth, 0, &payload, &BIND_KEY);

        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[7], 0xAE);

        let mut covered = BIND_KEY.to_vec();
        covered.extend_from_slice(&bytes[..7]);
        assert_eq!(bytes[7], crc8_dvb_s2(&covered));
    }

    #[test]
    fn test_encode_frame_bind_key_changes_crc() {
        let payload = encode_bind_payload(&BIND_KEY);
        let salted = encode_frame(FrameType::Bind, 0, &payload, &BIND_KEY);
        let unsalted = encode_frame(FrameType::Bind, 0, &payload, &[0, 0, 0, 0]);

        assert_eq!(unsalted.as_bytes(), &[0x60, 0x11, 0x22, 0x33, 0x44, 0x44]);
        assert_eq!(salted.as_bytes()[..5], unsalted.as_bytes()[..5]);
        assert_ne!(salted.as_bytes()[5], unsalted.as_bytes()[5]);
    }
}
