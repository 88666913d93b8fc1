//! # Link Handler
//!
//! Application side of the QSP link: dispatches validated frames to the
//! payload decoders and keeps the resulting device state.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::qsp::decoder::{
    decode_bind_payload, decode_ping_payload, decode_rc_data_payload, decode_rx_health_payload,
    ChannelSink,
};
use crate::qsp::parser::{FrameListener, LinkContext};
use crate::qsp::protocol::*;

/// Decoded RC channel outputs in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOutputs {
    values: RcChannels,
}

impl ChannelOutputs {
    pub fn values(&self) -> &RcChannels {
        &self.values
    }
}

impl Default for ChannelOutputs {
    fn default() -> Self {
        Self {
            values: [QSP_CHANNEL_VALUE_CENTER; QSP_NUM_CHANNELS],
        }
    }
}

impl ChannelSink for ChannelOutputs {
    fn set_channel_value(&mut self, index: usize, value: u16, default_value: u16) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value.saturating_add(default_value);
        }
    }
}

/// Frame listener driving transmitter and receiver device state
#[derive(Debug, Clone)]
pub struct LinkHandler {
    epoch: Instant,
    channels: ChannelOutputs,
    received_bind_key: Option<BindKey>,
    last_rc_data_at: Option<Instant>,
}

impl LinkHandler {
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    /// Create a handler measuring ping timestamps from `epoch`
    pub fn with_epoch(epoch: Instant) -> Self {
        Self {
            epoch,
            channels: ChannelOutputs::default(),
            received_bind_key: None,
            last_rc_data_at: None,
        }
    }

    /// Microseconds since the epoch, truncated to the 32 bits a ping carries
    pub fn micros_at(&self, now: Instant) -> u32 {
        now.saturating_duration_since(self.epoch).as_micros() as u32
    }

    pub fn micros(&self) -> u32 {
        self.micros_at(Instant::now())
    }

    /// Most recent channel values from RC data frames
    pub fn channels(&self) -> &RcChannels {
        self.channels.values()
    }

    /// Bind key carried by the last bind frame, if any
    pub fn received_bind_key(&self) -> Option<BindKey> {
        self.received_bind_key
    }

    /// When the last RC data frame was decoded
    pub fn last_rc_data_at(&self) -> Option<Instant> {
        self.last_rc_data_at
    }
}

impl Default for LinkHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameListener<TxDeviceState, RxDeviceState> for LinkHandler {
    fn on_frame_valid(
        &mut self,
        link: &LinkContext,
        tx: &mut TxDeviceState,
        rx: &mut RxDeviceState,
        radio_channel: u8,
    ) {
        tx.frames_received += 1;
        tx.last_radio_channel = radio_channel;

        let payload = link.payload();
        let result = match link.frame_type() {
            Some(FrameType::RcData) => {
                decode_rc_data_payload(payload, &mut self.channels).map(|()| {
                    self.last_rc_data_at = Some(Instant::now());
                })
            }
            Some(FrameType::RxHealth) => decode_rx_health_payload(payload, rx).map(|()| {
                tx.rx_health_received = true;
                if rx.is_failsafe() {
                    debug!("Receiver reports failsafe");
                }
            }),
            Some(FrameType::Ping) => decode_ping_payload(payload).map(|sent| {
                let roundtrip = self.micros().wrapping_sub(sent);
                tx.roundtrip_us = Some(roundtrip);
                debug!(roundtrip_us = roundtrip, "Ping returned");
            }),
            Some(FrameType::Bind) => decode_bind_payload(payload).map(|key| {
                info!("Received bind key {:02X?}", key);
                self.received_bind_key = Some(key);
            }),
            None => {
                debug!(frame_id = link.frame_id(), "Ignoring frame without a handler");
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Failed to decode QSP frame: {}", e);
        }
    }

    fn on_frame_invalid(
        &mut self,
        link: &LinkContext,
        tx: &mut TxDeviceState,
        _rx: &mut RxDeviceState,
    ) {
        tx.frames_rejected += 1;
        debug!(
            frame_id = link.frame_id(),
            rejected = tx.frames_rejected,
            "Rejected QSP frame"
        );
    }
}
