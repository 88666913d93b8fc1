//! # QSP Protocol Module
//!
//! Implementation of the QSP serial radio link protocol.
//!
//! This module handles:
//! - RC data payload encoding (10 channels, 10/8/4-bit resolution)
//! - RX health, ping and bind payloads
//! - CRC8-DVB-S2 checksum salted with the bind key
//! - Byte-at-a-time frame reception and frame assembly

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod parser;
pub mod crc;
