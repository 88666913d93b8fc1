//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{QspError, Result};
use crate::qsp::protocol::{BindKey, QSP_CHANNEL_VALUE_MAX, QSP_CHANNEL_VALUE_MIN, QSP_NUM_CHANNELS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// QSP link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_bind_key")]
    pub bind_key: BindKey,

    #[serde(default)]
    pub radio_channel: u8,

    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    #[serde(default = "default_rc_rate_hz")]
    pub rc_rate_hz: u32,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
}

/// RC channel source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_count")]
    pub count: usize,

    #[serde(default = "default_center")]
    pub center: u16,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,
}

/// Diagnostic log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily log files; empty logs to stdout only
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115_200 }
fn default_timeout_ms() -> u64 { 100 }

fn default_bind_key() -> BindKey { [0x00, 0x00, 0x00, 0x00] }
fn default_frame_timeout_ms() -> u64 { 10 }
fn default_rc_rate_hz() -> u32 { 50 }
fn default_ping_interval_ms() -> u64 { 1000 }

fn default_channel_count() -> usize { QSP_NUM_CHANNELS }
fn default_center() -> u16 { 1500 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 1000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_key: default_bind_key(),
            radio_channel: 0,
            frame_timeout_ms: default_frame_timeout_ms(),
            rc_rate_hz: default_rc_rate_hz(),
            ping_interval_ms: default_ping_interval_ms(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            count: default_channel_count(),
            center: default_center(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
        }
    }
}

impl LinkConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn rc_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.rc_rate_hz.max(1)))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> QspError {
    QspError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use qsp_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        const VALID_BAUD_RATES: [u32; 7] = [9600, 19200, 38400, 57600, 115_200, 230_400, 420_000];
        if !VALID_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 420000",
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.link.radio_channel > 0x0F {
            return Err(invalid("radio_channel must be between 0 and 15"));
        }

        if self.link.frame_timeout_ms == 0 || self.link.frame_timeout_ms > 1000 {
            return Err(invalid("frame_timeout_ms must be between 1 and 1000"));
        }

        if self.link.rc_rate_hz == 0 || self.link.rc_rate_hz > 500 {
            return Err(invalid("rc_rate_hz must be between 1 and 500"));
        }

        if self.link.ping_interval_ms == 0 || self.link.ping_interval_ms > 60000 {
            return Err(invalid("ping_interval_ms must be between 1 and 60000"));
        }

        if self.channels.count > QSP_NUM_CHANNELS {
            return Err(invalid(format!(
                "channel count must be at most {}",
                QSP_NUM_CHANNELS
            )));
        }

        if !(QSP_CHANNEL_VALUE_MIN..=QSP_CHANNEL_VALUE_MAX).contains(&self.channels.center) {
            return Err(invalid("center must be between 1000 and 2000"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(config: Config, expected: &str) {
        match config.validate() {
            Err(QspError::Config(e)) => assert!(
                e.to_string().contains(expected),
                "error '{}' should mention '{}'",
                e,
                expected
            ),
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.link.bind_key, [0, 0, 0, 0]);
        assert_eq!(config.link.frame_timeout(), Duration::from_millis(10));
        assert_eq!(config.channels.count, 10);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.link.rc_rate_hz, 50);
        assert_eq!(config.telemetry.max_files_to_keep, 10);
        assert!(config.logging.file_dir.is_empty());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyACM1"
baud_rate = 57600

[link]
bind_key = [0x11, 0x22, 0x33, 0x44]
radio_channel = 3
rc_rate_hz = 100

[channels]
count = 8
center = 1400

[telemetry]
enabled = false

[logging]
file_dir = "/var/log/qsp"
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.link.bind_key, [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(config.link.radio_channel, 3);
        assert_eq!(config.link.rc_period(), Duration::from_millis(10));
        assert_eq!(config.link.ping_interval(), Duration::from_secs(1));
        assert_eq!(config.channels.count, 8);
        assert_eq!(config.channels.center, 1400);
        assert!(!config.telemetry.enabled);
        assert_eq!(config.logging.file_dir, "/var/log/qsp");
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let config = Config::load("config/default.toml").unwrap();
        assert_eq!(config.link.frame_timeout_ms, 10);
        assert_eq!(config.channels.center, 1500);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/qsp-link.toml");
        assert!(matches!(result, Err(QspError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[link]\nbind_key = [1, 2, 3]\n");
        assert!(matches!(result, Err(QspError::Config(_))));

        let result = Config::from_toml("[serial\nport = 1");
        assert!(matches!(result, Err(QspError::Config(_))));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert_invalid(config, "serial port cannot be empty");
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 12345;
        assert_invalid(config, "baud_rate");
    }

    #[test]
    fn test_timeout_ms_out_of_range() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert_invalid(config.clone(), "timeout_ms");

        config.serial.timeout_ms = 10001;
        assert_invalid(config, "timeout_ms");
    }

    #[test]
    fn test_radio_channel_too_high() {
        let mut config = Config::default();
        config.link.radio_channel = 16;
        assert_invalid(config, "radio_channel");
    }

    #[test]
    fn test_frame_timeout_out_of_range() {
        let mut config = Config::default();
        config.link.frame_timeout_ms = 0;
        assert_invalid(config.clone(), "frame_timeout_ms");

        config.link.frame_timeout_ms = 1001;
        assert_invalid(config, "frame_timeout_ms");
    }

    #[test]
    fn test_rc_rate_out_of_range() {
        let mut config = Config::default();
        config.link.rc_rate_hz = 0;
        assert_invalid(config.clone(), "rc_rate_hz");

        config.link.rc_rate_hz = 501;
        assert_invalid(config, "rc_rate_hz");
    }

    #[test]
    fn test_ping_interval_zero() {
        let mut config = Config::default();
        config.link.ping_interval_ms = 0;
        assert_invalid(config, "ping_interval_ms");
    }

    #[test]
    fn test_channel_count_too_high() {
        let mut config = Config::default();
        config.channels.count = 11;
        assert_invalid(config, "channel count");
    }

    #[test]
    fn test_center_out_of_range() {
        let mut config = Config::default();
        config.channels.center = 999;
        assert_invalid(config.clone(), "center");

        config.channels.center = 2001;
        assert_invalid(config, "center");
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.log_dir = String::new();
        assert_invalid(config, "log_dir");
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_interval_zero() {
        let mut config = Config::default();
        config.telemetry.log_interval_ms = 0;
        assert_invalid(config, "log_interval_ms");
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert_invalid(config, "max_records_per_file");
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = Config::default();
        config.telemetry.max_files_to_keep = 0;
        assert_invalid(config, "max_files_to_keep");
    }
}
