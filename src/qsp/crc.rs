//! # CRC8-DVB-S2 Implementation
//!
//! CRC-8-DVB-S2 checksum calculation for QSP frames.
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00, then salted with the 4-byte bind key
//!
//! Salting means a frame only validates on a link configured with the same
//! bind key. It pairs transmitter and receiver; it is not authentication.

use super::protocol::BindKey;

/// CRC-8-DVB-S2 polynomial
const CRC8_POLY: u8 = 0xD5;

/// Precomputed CRC8 lookup table for fast calculation
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Fold one byte into a running CRC8-DVB-S2 value
///
/// # Examples
///
/// ```
/// use qsp_link::qsp::crc::crc8_dvb_s2_update;
///
/// assert_eq!(crc8_dvb_s2_update(0x00, 0x00), 0x00);
/// assert_eq!(crc8_dvb_s2_update(0x00, 0x01), 0xD5);
/// ```
#[inline]
pub fn crc8_dvb_s2_update(crc: u8, byte: u8) -> u8 {
    CRC8_TABLE[(crc ^ byte) as usize]
}

/// Calculate CRC8-DVB-S2 checksum of a byte slice, starting from 0
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, &byte| crc8_dvb_s2_update(crc, byte))
}

/// Initial CRC for a frame: 0 folded over the bind key bytes in order
pub fn init_crc(bind_key: &BindKey) -> u8 {
    crc8_dvb_s2(bind_key)
}

/// Calculate CRC8-DVB-S2 checksum using direct algorithm (slow, for verification)
///
/// Used primarily for testing the lookup table implementation.
#[cfg(test)]
fn crc8_dvb_s2_slow(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty() {
        let data = [];
        assert_eq!(crc8_dvb_s2(&data), 0x00);
    }

    #[test]
    fn test_crc8_single_byte() {
        // Golden values
        assert_eq!(crc8_dvb_s2_update(0x00, 0x00), 0x00);
        assert_eq!(crc8_dvb_s2_update(0x00, 0x01), 0xD5);
        assert_eq!(crc8_dvb_s2_update(0x00, 0xFF), 0xF9);

        let data = [0xFF];
        assert_eq!(crc8_dvb_s2(&data), crc8_dvb_s2_slow(&data));
    }

    #[test]
    fn test_crc8_check_value() {
        // Standard CRC catalogue check string
        assert_eq!(crc8_dvb_s2(b"123456789"), 0xBC);
    }

    #[test]
    fn test_crc8_matches_reference_crate() {
        let reference = crc::Crc::<u8>::new(&crc::CRC_8_DVB_S2);
        let test_data: [&[u8]; 5] = [
            &[0x01, 0x02, 0x03],
            &[0xFF, 0xFE, 0xFD],
            &[0x11, 0x22, 0x33, 0x44, 0x03, 0x7D],
            &[0x00; 11],
            &[0xFF; 10],
        ];

        for data in test_data {
            assert_eq!(crc8_dvb_s2(data), reference.checksum(data), "data: {:02X?}", data);
        }
    }

    #[test]
    fn test_crc8_lookup_table_matches_slow() {
        for byte in 0..=255u8 {
            let data = [byte, byte.wrapping_mul(7), 0x5A];
            assert_eq!(crc8_dvb_s2(&data), crc8_dvb_s2_slow(&data), "data: {:02X?}", data);
        }
    }

    #[test]
    fn test_crc8_is_order_sensitive() {
        let ab = crc8_dvb_s2_update(crc8_dvb_s2_update(0, 0x01), 0x02);
        let ba = crc8_dvb_s2_update(crc8_dvb_s2_update(0, 0x02), 0x01);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_crc8_is_deterministic() {
        let data = [0x10, 0x50, 0x0C, 0x21];
        assert_eq!(crc8_dvb_s2(&data), crc8_dvb_s2(&data));
    }

    #[test]
    fn test_init_crc_zero_key() {
        assert_eq!(init_crc(&[0, 0, 0, 0]), 0x00);
    }

    #[test]
    fn test_init_crc_salted_key() {
        assert_eq!(init_crc(&[0x11, 0x22, 0x33, 0x44]), 0x71);
        assert_ne!(init_crc(&[0x11, 0x22, 0x33, 0x44]), init_crc(&[0x44, 0x33, 0x22, 0x11]));
    }

    #[test]
    fn test_salted_crc_equals_crc_over_key_and_data() {
        let key = [0xDE, 0xAD, 0xBE, 0xEF];
        let data = [0x03, 0x7D, 0x1F];
        let incremental = data
            .iter()
            .fold(init_crc(&key), |crc, &byte| crc8_dvb_s2_update(crc, byte));

        let mut joined = key.to_vec();
        joined.extend_from_slice(&data);
        assert_eq!(incremental, crc8_dvb_s2(&joined));
    }
}
