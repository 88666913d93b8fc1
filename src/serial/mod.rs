//! # Serial Communication Module
//!
//! Handles the byte stream carrying QSP frames.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Writing encoded QSP frames
//! - Feeding received bytes into the frame parser

pub mod port_trait;

use std::time::Instant;

use crate::error::{QspError, Result};
use crate::qsp::parser::{FrameListener, LinkContext};
use crate::qsp::protocol::EncodedFrame;
use port_trait::{SerialPortIO, StreamPort};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default QSP serial baud rate
pub const QSP_BAUD_RATE: u32 = 115_200;

/// Bytes requested from the port per read
const READ_CHUNK_SIZE: usize = 64;

/// Serial port carrying a QSP link
pub struct QspSerial<P = StreamPort<tokio_serial::SerialStream>> {
    /// Port handle
    port: P,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl<P> std::fmt::Debug for QspSerial<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QspSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl QspSerial {
    /// Open a serial device
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use qsp_link::serial::QspSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = QspSerial::open("/dev/ttyUSB0", 115_200)?;
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_paths(&[path], baud_rate)
    }

    /// Open the first device in `paths` that can be opened
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened QSP serial device at {} ({} baud)", path, baud_rate);
                    return Ok(Self::from_port(StreamPort::new(port), path));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(QspError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with QSP settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| QspError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<P: SerialPortIO> QspSerial<P> {
    /// Wrap an already opened port
    pub fn from_port(port: P, device_path: &str) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
        }
    }

    /// Send an encoded QSP frame
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use qsp_link::qsp::encoder::{encode_frame, encode_ping_payload};
    /// use qsp_link::qsp::protocol::FrameType;
    /// use qsp_link::serial::QspSerial;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut serial = QspSerial::open("/dev/ttyUSB0", 115_200)?;
    ///
    ///     let frame = encode_frame(FrameType::Ping, 0, &encode_ping_payload(0), &[0; 4]);
    ///     serial.send_frame(&frame).await?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub async fn send_frame(&mut self, frame: &EncodedFrame) -> Result<()> {
        self.port
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| QspError::Serial(format!("Failed to write frame: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| QspError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent QSP frame ({} bytes)", frame.len());
        Ok(())
    }

    /// Read once from the port and feed every byte into the parser
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of bytes consumed (0 at end of stream)
    pub async fn pump<Tx, Rx, L>(
        &mut self,
        link: &mut LinkContext,
        listener: &mut L,
        tx: &mut Tx,
        rx: &mut Rx,
    ) -> Result<usize>
    where
        L: FrameListener<Tx, Rx> + ?Sized,
    {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let count = self
            .port
            .read(&mut buf)
            .await
            .map_err(|e| QspError::Serial(format!("Failed to read serial port: {}", e)))?;

        link.process_bytes(&buf[..count], Instant::now(), listener, tx, rx);
        Ok(count)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}
