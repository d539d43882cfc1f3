//! Configuration system for rfdrop.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $RFDROP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/rfdrop/config.toml
//!   3. ~/.config/rfdrop/config.toml

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RfdropConfig {
    pub radio: RadioConfig,
    pub gpio: GpioConfig,
    pub files: FilesConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// RF channel. Frames heard on any other channel are ignored.
    pub channel: u8,
    /// Wait for a link-layer ACK before each retransmission.
    pub retry_delay_us: u64,
    /// Retransmissions after the first attempt.
    pub retry_count: u8,
    /// Pipe addresses, index 0 = node A (sender), index 1 = node B (receiver).
    pub addresses: [String; 2],
    /// UDP endpoint backing node A's pipe.
    pub node_a_endpoint: SocketAddr,
    /// UDP endpoint backing node B's pipe.
    pub node_b_endpoint: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// sysfs GPIO root.
    pub root: PathBuf,
    /// Status LED output (BCM numbering).
    pub led_pin: u32,
    /// Trigger button input, pulled up, pressed = low.
    pub button_pin: u32,
    /// Mode switch input, pulled up. High = receive, low = send.
    pub mode_pin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// File sent on each trigger press.
    pub tx_file: PathBuf,
    /// Where a received file is written. Overwritten by every transfer.
    pub rx_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub receive_poll_ms: u64,
    pub button_poll_ms: u64,
    pub debounce_poll_ms: u64,
    pub rearm_delay_ms: u64,
    pub blink_interval_ms: u64,
    /// Toggles in the failure blink pattern.
    pub blink_toggles: u32,
    /// Toggle the LED every N fragments while a transfer runs.
    pub progress_every: u32,
}

impl TimingConfig {
    pub fn receive_poll(&self) -> Duration {
        Duration::from_millis(self.receive_poll_ms)
    }

    pub fn button_poll(&self) -> Duration {
        Duration::from_millis(self.button_poll_ms)
    }

    pub fn debounce_poll(&self) -> Duration {
        Duration::from_millis(self.debounce_poll_ms)
    }

    pub fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }
}

impl RadioConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_micros(self.retry_delay_us)
    }

    /// Pipe address `index` as the 5-byte on-air address.
    /// Shorter names are zero-padded, longer ones cut.
    pub fn pipe_address(&self, index: usize) -> [u8; 5] {
        let mut out = [0u8; 5];
        let name = self.addresses[index].as_bytes();
        let n = name.len().min(5);
        out[..n].copy_from_slice(&name[..n]);
        out
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            channel: 76,
            retry_delay_us: 1500,
            retry_count: 15,
            addresses: ["1Node".to_string(), "2Node".to_string()],
            node_a_endpoint: SocketAddr::from(([127, 0, 0, 1], 47601)),
            node_b_endpoint: SocketAddr::from(([127, 0, 0, 1], 47602)),
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sys/class/gpio"),
            led_pin: 17,
            button_pin: 27,
            mode_pin: 23,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            tx_file: data_dir().join("tx").join("outgoing.txt"),
            rx_file: data_dir().join("rx").join("received.txt"),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            receive_poll_ms: 5,
            button_poll_ms: 50,
            debounce_poll_ms: 20,
            rearm_delay_ms: 200,
            blink_interval_ms: 100,
            blink_toggles: 10,
            progress_every: 4,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("rfdrop")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("rfdrop")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RfdropConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            RfdropConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("RFDROP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&RfdropConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply RFDROP_* overrides. `lookup` resolves a variable name.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RFDROP_FILES__TX_FILE") {
            self.files.tx_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("RFDROP_FILES__RX_FILE") {
            self.files.rx_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("RFDROP_GPIO__ROOT") {
            self.gpio.root = PathBuf::from(v);
        }
        if let Some(v) = lookup("RFDROP_RADIO__CHANNEL") {
            if let Ok(c) = v.parse() {
                self.radio.channel = c;
            }
        }
        if let Some(v) = lookup("RFDROP_RADIO__NODE_A_ENDPOINT") {
            if let Ok(a) = v.parse() {
                self.radio.node_a_endpoint = a;
            }
        }
        if let Some(v) = lookup("RFDROP_RADIO__NODE_B_ENDPOINT") {
            if let Ok(a) = v.parse() {
                self.radio.node_b_endpoint = a;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_wiring() {
        let config = RfdropConfig::default();
        assert_eq!(config.radio.channel, 76);
        assert_eq!(config.radio.retry_count, 15);
        assert_eq!(config.gpio.led_pin, 17);
        assert_eq!(config.gpio.button_pin, 27);
        assert_eq!(config.gpio.mode_pin, 23);
        assert_eq!(config.timing.progress_every, 4);
    }

    #[test]
    fn pipe_addresses_are_five_bytes() {
        let radio = RadioConfig::default();
        assert_eq!(&radio.pipe_address(0), b"1Node");
        assert_eq!(&radio.pipe_address(1), b"2Node");

        let short = RadioConfig {
            addresses: ["ab".to_string(), "longername".to_string()],
            ..RadioConfig::default()
        };
        assert_eq!(short.pipe_address(0), [b'a', b'b', 0, 0, 0]);
        assert_eq!(&short.pipe_address(1), b"longe");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RfdropConfig::default();
        config.apply_env_overrides(|key| match key {
            "RFDROP_FILES__RX_FILE" => Some("/tmp/out.bin".to_string()),
            "RFDROP_RADIO__CHANNEL" => Some("90".to_string()),
            "RFDROP_RADIO__NODE_B_ENDPOINT" => Some("not-an-addr".to_string()),
            _ => None,
        });
        assert_eq!(config.files.rx_file, PathBuf::from("/tmp/out.bin"));
        assert_eq!(config.radio.channel, 90);
        assert_eq!(
            config.radio.node_b_endpoint,
            RadioConfig::default().node_b_endpoint
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let text = "[timing]\nreceive_poll_ms = 1\n";
        let config: RfdropConfig = toml::from_str(text).unwrap();
        assert_eq!(config.timing.receive_poll_ms, 1);
        assert_eq!(config.timing.button_poll_ms, 50);
        assert_eq!(config.radio.channel, 76);
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp = std::env::temp_dir().join(format!("rfdrop-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        unsafe {
            std::env::set_var("RFDROP_CONFIG", config_path.to_str().unwrap());
        }

        let path =
            RfdropConfig::write_default_if_missing().expect("write_default_if_missing failed");
        assert!(path.exists());

        let config = RfdropConfig::load().expect("load should succeed");
        assert_eq!(config.radio.channel, 76);
        assert_eq!(config.gpio.led_pin, 17);

        unsafe {
            std::env::remove_var("RFDROP_CONFIG");
        }
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
