//! # QSP Frame Parser
//!
//! Incremental receive state machine. Bytes arrive one at a time from the
//! transport; the parser tracks the position within the current frame,
//! accumulates the salted CRC and notifies a [`FrameListener`] once the
//! trailing CRC byte has been checked.
//!
//! ## States
//!
//! ```text
//! Idle ──header──▶ FrameTypeReceived ──last payload byte──▶ PayloadReceived
//!  ▲                       │                                     │
//!  └──── capacity guard ───┘◀──────────── CRC byte ──────────────┘
//! ```
//!
//! There is no preamble search: after a frame completes (or is dropped) the
//! next byte is taken as the following frame's header.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::crc::{crc8_dvb_s2_update, init_crc};
use super::protocol::*;

/// Position within frame reception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolState {
    /// Waiting for a header byte
    #[default]
    Idle,

    /// Header accepted, collecting payload bytes
    FrameTypeReceived,

    /// Payload complete, next byte is the CRC
    PayloadReceived,
}

/// Notification targets for completed frames
///
/// `Tx` and `Rx` are the application's device states; the parser passes them
/// through untouched.
pub trait FrameListener<Tx, Rx> {
    /// Called when the trailing CRC matches
    ///
    /// `link` still holds the received payload during the call.
    fn on_frame_valid(&mut self, link: &LinkContext, tx: &mut Tx, rx: &mut Rx, radio_channel: u8);

    /// Called when the trailing CRC does not match
    fn on_frame_invalid(&mut self, link: &LinkContext, tx: &mut Tx, rx: &mut Rx);
}

/// Per-link reception counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames whose CRC matched
    pub frames_valid: u64,

    /// Frames rejected on CRC
    pub crc_errors: u64,

    /// Frames abandoned because their declared length exceeded the buffer
    pub overflows: u64,

    /// Header bytes carrying an identifier without a catalog entry
    pub unknown_frames: u64,

    /// Frames abandoned by the stale frame watchdog
    pub timeouts: u64,
}

/// Protocol state of one physical link
///
/// Each link owns its own context; contexts must not be shared between
/// links. Payload, CRC and counters are frame-scoped and reset at every
/// frame start.
#[derive(Debug, Clone)]
pub struct LinkContext {
    bind_key: BindKey,
    catalog: FrameCatalog,
    state: ProtocolState,
    payload: Payload,
    payload_length: usize,
    frame_id: u8,
    radio_channel: u8,
    crc: u8,
    frame_decoding_started_at: Option<Instant>,
    stats: LinkStats,
}

impl LinkContext {
    /// Create a link context using the standard frame catalog
    pub fn new(bind_key: BindKey) -> Self {
        Self::with_catalog(bind_key, FrameCatalog::qsp())
    }

    /// Create a link context with a custom frame catalog
    pub fn with_catalog(bind_key: BindKey, catalog: FrameCatalog) -> Self {
        Self {
            bind_key,
            catalog,
            state: ProtocolState::Idle,
            payload: Payload::new(),
            payload_length: 0,
            frame_id: 0,
            radio_channel: 0,
            crc: init_crc(&bind_key),
            frame_decoding_started_at: None,
            stats: LinkStats::default(),
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Bytes received so far in the current frame
    pub fn payload(&self) -> &[u8] {
        self.payload.as_slice()
    }

    /// Declared payload length of the current frame
    pub fn payload_length(&self) -> usize {
        self.payload_length
    }

    /// Identifier from the current frame's header
    pub fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// Current frame's type, if it is one of the standard QSP types
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_id(self.frame_id)
    }

    /// Radio channel nibble from the current frame's header
    pub fn radio_channel(&self) -> u8 {
        self.radio_channel
    }

    /// Running CRC over bind key + bytes consumed in the current frame
    pub fn crc(&self) -> u8 {
        self.crc
    }

    /// When the current frame's header arrived
    pub fn frame_decoding_started_at(&self) -> Option<Instant> {
        self.frame_decoding_started_at
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn bind_key(&self) -> &BindKey {
        &self.bind_key
    }

    pub fn catalog(&self) -> &FrameCatalog {
        &self.catalog
    }

    /// Replace the bind key
    ///
    /// An idle link is re-salted immediately. A frame already in progress
    /// keeps the old salt; the new key applies from the next frame start.
    pub fn set_bind_key(&mut self, bind_key: BindKey) {
        self.bind_key = bind_key;
        if self.state == ProtocolState::Idle {
            self.crc = init_crc(&self.bind_key);
        }
    }

    /// Abandon any frame in progress and return to `Idle`
    pub fn reset(&mut self) {
        self.state = ProtocolState::Idle;
        self.payload.clear();
        self.payload_length = 0;
        self.crc = init_crc(&self.bind_key);
        self.frame_decoding_started_at = None;
    }

    /// Reset if a frame has been in progress for longer than `timeout`
    ///
    /// Intended to be polled by the transport loop. Returns `true` when a
    /// frame was abandoned.
    pub fn expire_stale_frame(&mut self, now: Instant, timeout: Duration) -> bool {
        if self.state == ProtocolState::Idle {
            return false;
        }

        let stale = self
            .frame_decoding_started_at
            .map_or(true, |started| now.saturating_duration_since(started) > timeout);

        if stale {
            debug!(
                frame_id = self.frame_id,
                received = self.payload.len(),
                "Abandoning stale QSP frame"
            );
            self.stats.timeouts += 1;
            self.reset();
        }

        stale
    }

    /// Consume one incoming byte
    ///
    /// Never blocks and never fails: corrupt input is dropped and the parser
    /// returns to `Idle`.
    ///
    /// # Arguments
    ///
    /// * `byte` - Next byte from the transport
    /// * `now` - Monotonic time, recorded when a header byte arrives
    /// * `listener` - Notified when a frame completes
    /// * `tx`, `rx` - Device states handed to the listener
    pub fn process_byte<Tx, Rx, L>(
        &mut self,
        byte: u8,
        now: Instant,
        listener: &mut L,
        tx: &mut Tx,
        rx: &mut Rx,
    ) where
        L: FrameListener<Tx, Rx> + ?Sized,
    {
        match self.state {
            ProtocolState::Idle => self.start_frame(byte, now),
            ProtocolState::FrameTypeReceived => self.receive_payload_byte(byte),
            ProtocolState::PayloadReceived => {
                if byte == self.crc {
                    self.stats.frames_valid += 1;
                    trace!(
                        frame_id = self.frame_id,
                        radio_channel = self.radio_channel,
                        "QSP frame received"
                    );
                    listener.on_frame_valid(self, tx, rx, self.radio_channel);
                } else {
                    self.stats.crc_errors += 1;
                    debug!(
                        frame_id = self.frame_id,
                        "CRC mismatch: expected 0x{:02X}, got 0x{:02X}",
                        self.crc,
                        byte
                    );
                    listener.on_frame_invalid(self, tx, rx);
                }

                self.reset();
            }
        }
    }

    /// Consume a slice of incoming bytes, all stamped with `now`
    pub fn process_bytes<Tx, Rx, L>(
        &mut self,
        bytes: &[u8],
        now: Instant,
        listener: &mut L,
        tx: &mut Tx,
        rx: &mut Rx,
    ) where
        L: FrameListener<Tx, Rx> + ?Sized,
    {
        for &byte in bytes {
            self.process_byte(byte, now, listener, tx, rx);
        }
    }

    fn start_frame(&mut self, header: u8, now: Instant) {
        self.reset();

        let frame_id = (header >> 4) & 0x0F;
        let Some(payload_length) = self.catalog.payload_len(frame_id) else {
            self.stats.unknown_frames += 1;
            debug!(frame_id, "Dropping header with unknown QSP frame type");
            return;
        };

        self.crc = crc8_dvb_s2_update(self.crc, header);
        self.frame_id = frame_id;
        self.radio_channel = header & 0x0F;
        self.payload_length = payload_length;
        self.frame_decoding_started_at = Some(now);

        self.state = if payload_length == 0 {
            ProtocolState::PayloadReceived
        } else {
            ProtocolState::FrameTypeReceived
        };
    }

    fn receive_payload_byte(&mut self, byte: u8) {
        if self.payload.is_full() {
            self.stats.overflows += 1;
            debug!(
                frame_id = self.frame_id,
                declared = self.payload_length,
                "QSP payload exceeds buffer capacity, dropping frame"
            );
            self.reset();
            return;
        }

        self.crc = crc8_dvb_s2_update(self.crc, byte);
        self.payload.push(byte);

        if self.payload.len() == self.payload_length {
            self.state = ProtocolState::PayloadReceived;
        }
    }
}
