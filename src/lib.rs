//! # QSP Link Library
//!
//! Framing and payload codecs for the QSP serial radio link between an RC
//! transmitter and its receiver module.
//!
//! The [`qsp`] module holds the wire format: CRC, channel packing, the frame
//! catalog and the byte-at-a-time receive parser. [`handler`] turns validated
//! frames into device state, [`serial`] moves bytes over a tokio serial port
//! and [`telemetry`] records link health to rotating JSONL files.

pub mod config;
pub mod error;
pub mod handler;
pub mod qsp;
pub mod serial;
pub mod telemetry;
