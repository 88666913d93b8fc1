//! # QSP Protocol Constants and Types
//!
//! Core protocol definitions for QSP link communication.
//!
//! ## Frame Layout
//!
//! ```text
//! byte 0:      [ frame type:4 | radio channel:4 ]
//! byte 1..N:   payload (length fixed per frame type)
//! byte N+1:    CRC8-DVB-S2 salted with the bind key, over bytes 0..N
//! ```

use crate::error::{QspError, Result};

/// Number of RC channels carried by an RC data frame
pub const QSP_NUM_CHANNELS: usize = 10;

/// Channel value range (microseconds)
pub const QSP_CHANNEL_VALUE_MIN: u16 = 1000;
pub const QSP_CHANNEL_VALUE_MAX: u16 = 2000;
pub const QSP_CHANNEL_VALUE_CENTER: u16 = 1500;

/// Base handed to channel sinks alongside every decoded value
pub const QSP_CHANNEL_DEFAULT: u16 = QSP_CHANNEL_VALUE_MIN;

/// RC data payload size (4 × 10 bits + 2 × 8 bits + 4 × 4 bits = 72 bits)
pub const QSP_RC_DATA_PAYLOAD_SIZE: usize = 9;

/// RX health payload size (rssi, snr, 3 voltages, flags)
pub const QSP_RX_HEALTH_PAYLOAD_SIZE: usize = 6;

/// Ping payload size (32-bit little-endian timestamp)
pub const QSP_PING_PAYLOAD_SIZE: usize = 4;

/// Bind payload size (raw bind key)
pub const QSP_BIND_PAYLOAD_SIZE: usize = QSP_PING_PAYLOAD_SIZE;

/// Bind key length in bytes
pub const QSP_BIND_KEY_SIZE: usize = 4;

/// Payload buffer capacity: the longest payload in the default catalog
pub const QSP_PAYLOAD_CAPACITY: usize = FrameCatalog::qsp().max_payload_len();

/// Header byte + payload + CRC byte
pub const QSP_MAX_FRAME_SIZE: usize = QSP_PAYLOAD_CAPACITY + 2;

/// RX health flag: receiver is in failsafe
pub const QSP_FLAG_FAILSAFE: u8 = 0x01;

/// Number of identifiers addressable by the 4-bit frame type field
const QSP_FRAME_ID_COUNT: usize = 16;

/// Shared secret salting every frame's CRC
pub type BindKey = [u8; QSP_BIND_KEY_SIZE];

/// Decoded RC channels (raw values relative to [`QSP_CHANNEL_DEFAULT`])
pub type RcChannels = [u16; QSP_NUM_CHANNELS];

/// QSP frame types
///
/// Identifiers `0x2..=0x4` are reserved for receiver configuration frames
/// and have no catalog entry.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    RcData = 0x0,
    RxHealth = 0x1,
    Ping = 0x5,
    Bind = 0x6,
}

impl FrameType {
    /// All frame types known to the default catalog
    pub const ALL: [FrameType; 4] = [
        FrameType::RcData,
        FrameType::RxHealth,
        FrameType::Ping,
        FrameType::Bind,
    ];

    /// Identifier carried in the header's high nibble
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Fixed payload length of this frame type
    pub const fn payload_len(self) -> usize {
        match self {
            FrameType::RcData => QSP_RC_DATA_PAYLOAD_SIZE,
            FrameType::RxHealth => QSP_RX_HEALTH_PAYLOAD_SIZE,
            FrameType::Ping => QSP_PING_PAYLOAD_SIZE,
            FrameType::Bind => QSP_BIND_PAYLOAD_SIZE,
        }
    }

    /// Look up a frame type by its 4-bit identifier
    pub fn from_id(id: u8) -> Option<Self> {
        FrameType::ALL.into_iter().find(|t| t.id() == id)
    }
}

/// Mapping from frame identifier to payload length
///
/// Header, CRC and length handling are driven purely by this table, so
/// adding a frame type means adding one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCatalog {
    lengths: [Option<u8>; QSP_FRAME_ID_COUNT],
}

impl FrameCatalog {
    /// Catalog with the standard QSP frame types
    pub const fn qsp() -> Self {
        let mut lengths = [None; QSP_FRAME_ID_COUNT];
        let mut i = 0;

        while i < FrameType::ALL.len() {
            let frame_type = FrameType::ALL[i];
            lengths[frame_type.id() as usize] = Some(frame_type.payload_len() as u8);
            i += 1;
        }

        Self { lengths }
    }

    /// Return a catalog with `id` (masked to 4 bits) mapped to `len` payload bytes
    pub const fn with_entry(mut self, id: u8, len: u8) -> Self {
        self.lengths[(id & 0x0F) as usize] = Some(len);
        self
    }

    /// Payload length for an identifier, `None` if the catalog has no entry
    pub fn payload_len(&self, id: u8) -> Option<usize> {
        self.lengths
            .get(id as usize)
            .copied()
            .flatten()
            .map(usize::from)
    }

    /// Longest payload declared by any entry
    pub const fn max_payload_len(&self) -> usize {
        let mut max = 0;
        let mut i = 0;

        while i < QSP_FRAME_ID_COUNT {
            if let Some(len) = self.lengths[i] {
                if len as usize > max {
                    max = len as usize;
                }
            }
            i += 1;
        }

        max
    }
}

impl Default for FrameCatalog {
    fn default() -> Self {
        Self::qsp()
    }
}

/// Fixed-capacity frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    data: [u8; QSP_PAYLOAD_CAPACITY],
    len: usize,
}

impl Payload {
    /// Create an empty payload
    pub const fn new() -> Self {
        Self {
            data: [0; QSP_PAYLOAD_CAPACITY],
            len: 0,
        }
    }

    /// Create a zero-filled payload of `len` bytes (capped at capacity)
    pub(crate) fn zeroed(len: usize) -> Self {
        Self {
            data: [0; QSP_PAYLOAD_CAPACITY],
            len: len.min(QSP_PAYLOAD_CAPACITY),
        }
    }

    /// Copy a payload from a byte slice
    ///
    /// # Errors
    ///
    /// Returns error if the slice exceeds [`QSP_PAYLOAD_CAPACITY`]
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > QSP_PAYLOAD_CAPACITY {
            return Err(QspError::Protocol(format!(
                "Payload size {} exceeds capacity {}",
                bytes.len(),
                QSP_PAYLOAD_CAPACITY
            )));
        }

        let mut payload = Self::new();
        payload.data[..bytes.len()].copy_from_slice(bytes);
        payload.len = bytes.len();
        Ok(payload)
    }

    /// Append a byte; returns `false` without writing once full
    pub fn push(&mut self, byte: u8) -> bool {
        match self.data.get_mut(self.len) {
            Some(slot) => {
                *slot = byte;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    /// Zero the buffer and drop its length to 0
    pub fn clear(&mut self) {
        self.data = [0; QSP_PAYLOAD_CAPACITY];
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= QSP_PAYLOAD_CAPACITY
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Serialized frame ready for the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: [u8; QSP_MAX_FRAME_SIZE],
    len: usize,
}

impl EncodedFrame {
    pub(crate) const fn new() -> Self {
        Self {
            bytes: [0; QSP_MAX_FRAME_SIZE],
            len: 0,
        }
    }

    pub(crate) fn push(&mut self, byte: u8) {
        if let Some(slot) = self.bytes.get_mut(self.len) {
            *slot = byte;
            self.len += 1;
        }
    }

    /// Total frame length (payload + 2)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl AsRef<[u8]> for EncodedFrame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Receiver health as reported over the link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxDeviceState {
    /// Received signal strength
    pub rssi: u8,

    /// Signal to noise ratio
    pub snr: u8,

    /// Receiver supply voltage (decivolts)
    pub rx_voltage: u8,

    /// Auxiliary analog input 1 (decivolts)
    pub a1_voltage: u8,

    /// Auxiliary analog input 2 (decivolts)
    pub a2_voltage: u8,

    /// Status flags, see [`QSP_FLAG_FAILSAFE`]
    pub flags: u8,
}

impl RxDeviceState {
    pub fn is_failsafe(&self) -> bool {
        self.flags & QSP_FLAG_FAILSAFE != 0
    }
}

/// Transmitter-side link bookkeeping
///
/// The parser never looks inside; it is handed to frame listeners as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxDeviceState {
    /// Last measured ping round trip (microseconds)
    pub roundtrip_us: Option<u32>,

    /// Radio channel nibble of the last valid frame
    pub last_radio_channel: u8,

    /// Valid frames seen by the listener
    pub frames_received: u64,

    /// Frames rejected on CRC
    pub frames_rejected: u64,

    /// Set once an RX health frame has been decoded
    pub rx_health_received: bool,
}
