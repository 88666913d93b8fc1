//! # QSP Link
//!
//! Transmitter-side bridge for a QSP radio module on a serial port.
//!
//! Sends RC data frames at a fixed rate, pings the receiver to measure the
//! link roundtrip and logs receiver health as it arrives.
//!
//! # Usage
//!
//! ```bash
//! qsp-link [config.toml]
//! ```
//!
//! Without an argument the built-in defaults are used.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use qsp_link::config::Config;
use qsp_link::handler::LinkHandler;
use qsp_link::qsp::encoder::{encode_frame, encode_ping_payload, encode_rc_data_payload};
use qsp_link::qsp::parser::LinkContext;
use qsp_link::qsp::protocol::{
    EncodedFrame, FrameType, Payload, RxDeviceState, TxDeviceState, QSP_NUM_CHANNELS,
};
use qsp_link::serial::QspSerial;
use qsp_link::telemetry::{TelemetryLogger, TelemetryRecord};

/// Number of RC frames between status log messages
const LOG_INTERVAL_FRAMES: u64 = 1000;

/// Daily log file name under `[logging] file_dir`
const LOG_FILE_NAME: &str = "qsp-link.log";

/// Set up console logging plus an optional daily rotated log file
///
/// The returned guard must stay alive for file output to be flushed.
fn init_logging(file_dir: &str) -> Option<WorkerGuard> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()));

    if file_dir.is_empty() {
        Registry::default().with(console_layer).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(file_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()));

    Registry::default().with(console_layer).with(file_layer).init();
    Some(guard)
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("Failed to load configuration from {}", path)),
        None => Ok(Config::default()),
    }
}

/// Channel values sent on every RC frame
fn centered_channels(config: &Config) -> Vec<u16> {
    vec![config.channels.center; config.channels.count.min(QSP_NUM_CHANNELS)]
}

/// Build an outgoing frame salted with the link's current bind key
fn outgoing_frame(
    link: &LinkContext,
    frame_type: FrameType,
    radio_channel: u8,
    payload: &Payload,
) -> EncodedFrame {
    encode_frame(frame_type, radio_channel, payload, link.bind_key())
}

/// Switch the link to a bind key received from the peer
///
/// Returns `true` when the key changed.
fn adopt_received_bind_key(link: &mut LinkContext, handler: &LinkHandler) -> bool {
    match handler.received_bind_key() {
        Some(key) if key != *link.bind_key() => {
            info!("Switching to bind key {:02X?}", key);
            link.set_bind_key(key);
            true
        }
        _ => false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref())?;

    let _log_guard = init_logging(&config.logging.file_dir);

    info!("QSP Link v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path),
        None => info!("No configuration file given, using defaults"),
    }

    let mut serial = QspSerial::open(&config.serial.port, config.serial.baud_rate)?;
    info!("QSP serial port opened at: {}", serial.device_path());

    let mut telemetry = if config.telemetry.enabled {
        Some(TelemetryLogger::new(
            &config.telemetry.log_dir,
            config.telemetry.max_records_per_file,
            config.telemetry.max_files_to_keep,
        )?)
    } else {
        None
    };

    let link_config = &config.link;
    let write_timeout = Duration::from_millis(config.serial.timeout_ms);
    let channels = centered_channels(&config);

    let mut link = LinkContext::new(link_config.bind_key);
    let mut handler = LinkHandler::new();
    let mut tx = TxDeviceState::default();
    let mut rx = RxDeviceState::default();

    let mut rc_interval = interval(link_config.rc_period());
    let mut ping_interval = interval(link_config.ping_interval());
    let mut watchdog_interval = interval(link_config.frame_timeout());
    let mut telemetry_interval = interval(Duration::from_millis(config.telemetry.log_interval_ms));
    for timer in [
        &mut rc_interval,
        &mut ping_interval,
        &mut watchdog_interval,
        &mut telemetry_interval,
    ] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    info!(
        "Starting QSP link at {}Hz on radio channel {}",
        link_config.rc_rate_hz, link_config.radio_channel
    );
    info!("Press Ctrl+C to exit");

    let mut frame_count: u64 = 0;
    let mut last_log_count: u64 = 0;

    loop {
        tokio::select! {
            _ = rc_interval.tick() => {
                let payload = encode_rc_data_payload(&channels[..], channels.len());
                let frame = outgoing_frame(&link, FrameType::RcData, link_config.radio_channel, &payload);

                match timeout(write_timeout, serial.send_frame(&frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("Failed to send RC frame: {}", e);
                        continue;
                    }
                    Err(_) => {
                        warn!("Timed out sending RC frame");
                        continue;
                    }
                }

                frame_count += 1;

                if frame_count - last_log_count >= LOG_INTERVAL_FRAMES {
                    let stats = link.stats();
                    info!(
                        "Sent {} RC frames, received {} valid ({} CRC errors, {} timeouts)",
                        frame_count, stats.frames_valid, stats.crc_errors, stats.timeouts
                    );
                    last_log_count = frame_count;
                }
            }

            _ = ping_interval.tick() => {
                let payload = encode_ping_payload(handler.micros());
                let frame = outgoing_frame(&link, FrameType::Ping, link_config.radio_channel, &payload);

                if let Ok(Err(e)) = timeout(write_timeout, serial.send_frame(&frame)).await {
                    debug!("Failed to send ping: {}", e);
                }
            }

            result = serial.pump(&mut link, &mut handler, &mut tx, &mut rx) => {
                match result {
                    Ok(0) => {
                        warn!("Serial port closed");
                        break;
                    }
                    Ok(_) => {
                        adopt_received_bind_key(&mut link, &handler);
                    }
                    Err(e) => warn!("{}", e),
                }
            }

            _ = watchdog_interval.tick() => {
                if link.expire_stale_frame(Instant::now(), link_config.frame_timeout()) {
                    debug!("Dropped stale partial frame");
                }
            }

            _ = telemetry_interval.tick(), if telemetry.is_some() => {
                if let Some(logger) = telemetry.as_mut() {
                    let record = TelemetryRecord::from_states(&tx, &rx, chrono::Utc::now());
                    if let Err(e) = logger.log(&record) {
                        warn!("Failed to write telemetry: {}", e);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let stats = link.stats();
    info!("Total RC frames sent: {}", frame_count);
    info!(
        "Frames received: {} valid, {} CRC errors, {} overflows, {} unknown, {} timeouts",
        stats.frames_valid, stats.crc_errors, stats.overflows, stats.unknown_frames, stats.timeouts
    );

    Ok(())
}
