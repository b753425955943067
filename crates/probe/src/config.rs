//! Probe configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use usbcdc::TeardownPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "ProbeSettings::default_log_level")]
    pub log_level: String,
    /// libusb diagnostic verbosity, 0 (off) to 4 (debug)
    #[serde(default = "ProbeSettings::default_usb_debug_level")]
    pub usb_debug_level: u8,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            usb_debug_level: Self::default_usb_debug_level(),
        }
    }
}

impl ProbeSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_usb_debug_level() -> u8 {
        3 // libusb "info"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Vendor ID as a hex string, e.g. "0xffff"
    #[serde(default = "DeviceSettings::default_id")]
    pub vendor_id: String,
    /// Product ID as a hex string, e.g. "0xffff"
    #[serde(default = "DeviceSettings::default_id")]
    pub product_id: String,
    /// Interface numbers to claim, in claim order
    #[serde(default = "DeviceSettings::default_interfaces")]
    pub interfaces: Vec<u8>,
    /// How long to wait for the device to appear, in seconds (0 = forever)
    #[serde(default = "DeviceSettings::default_open_deadline")]
    pub open_deadline_secs: u64,
    /// Teardown policy: "best-effort" or "fail-fast"
    #[serde(default)]
    pub teardown: TeardownPolicy,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_id(),
            product_id: Self::default_id(),
            interfaces: Self::default_interfaces(),
            open_deadline_secs: Self::default_open_deadline(),
            teardown: TeardownPolicy::default(),
        }
    }
}

impl DeviceSettings {
    fn default_id() -> String {
        // Placeholder, meant to be edited per device.
        "0xffff".to_string()
    }

    fn default_interfaces() -> Vec<u8> {
        vec![0]
    }

    fn default_open_deadline() -> u64 {
        30
    }

    pub fn vendor_id(&self) -> Result<u16> {
        parse_hex_id(&self.vendor_id, "vendor_id")
    }

    pub fn product_id(&self) -> Result<u16> {
        parse_hex_id(&self.product_id, "product_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// CDC OUT endpoint address
    #[serde(default = "TransferSettings::default_endpoint_out")]
    pub endpoint_out: u8,
    /// CDC IN endpoint address
    #[serde(default = "TransferSettings::default_endpoint_in")]
    pub endpoint_in: u8,
    /// CDC receive timeout in milliseconds
    #[serde(default = "TransferSettings::default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
    /// CDC receive buffer size in bytes
    #[serde(default = "TransferSettings::default_read_len")]
    pub read_len: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            endpoint_out: Self::default_endpoint_out(),
            endpoint_in: Self::default_endpoint_in(),
            recv_timeout_ms: Self::default_recv_timeout_ms(),
            read_len: Self::default_read_len(),
        }
    }
}

impl TransferSettings {
    fn default_endpoint_out() -> u8 {
        usbcdc::CDC_EP_OUT
    }

    fn default_endpoint_in() -> u8 {
        usbcdc::CDC_EP_IN
    }

    fn default_recv_timeout_ms() -> u64 {
        5000
    }

    fn default_read_len() -> usize {
        255
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe: ProbeSettings::default(),
            device: DeviceSettings::default(),
            transfer: TransferSettings::default(),
        }
    }
}

impl ProbeConfig {
    /// Load configuration from the specified path, or the first standard
    /// location that exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/cdc-probe/config.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ProbeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("cdc-probe").join("config.toml")
        } else {
            PathBuf::from(".config/cdc-probe/config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.probe.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.probe.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.probe.usb_debug_level > 4 {
            return Err(anyhow!(
                "Invalid usb_debug_level {}, must be 0-4",
                self.probe.usb_debug_level
            ));
        }

        self.device.vendor_id()?;
        self.device.product_id()?;

        if self.device.interfaces.is_empty() {
            return Err(anyhow!("At least one interface must be configured"));
        }

        // Endpoint addresses carry the direction in bit 7.
        if self.transfer.endpoint_out & 0x80 != 0 {
            return Err(anyhow!(
                "endpoint_out {:#04x} has the IN direction bit set",
                self.transfer.endpoint_out
            ));
        }
        if self.transfer.endpoint_in & 0x80 == 0 {
            return Err(anyhow!(
                "endpoint_in {:#04x} is missing the IN direction bit",
                self.transfer.endpoint_in
            ));
        }

        if self.transfer.read_len == 0 {
            return Err(anyhow!("read_len must be at least 1"));
        }

        Ok(())
    }
}

/// Parse a "0x"-prefixed hex ID (VID or PID).
pub fn parse_hex_id(id: &str, name: &str) -> Result<u16> {
    let hex_part = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| {
            anyhow!(
                "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                name,
                id
            )
        })?;

    if hex_part.is_empty() || hex_part.len() > 4 {
        return Err(anyhow!(
            "Invalid {} '{}', hex part must be 1-4 digits",
            name,
            id
        ));
    }

    u16::from_str_radix(hex_part, 16)
        .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.probe.log_level, "info");
        assert_eq!(config.device.interfaces, vec![0]);
        assert_eq!(config.transfer.endpoint_out, 0x07);
        assert_eq!(config.transfer.endpoint_in, 0x85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(parse_hex_id("0x1234", "vid").unwrap(), 0x1234);
        assert_eq!(parse_hex_id("0Xffff", "vid").unwrap(), 0xffff);
        assert!(parse_hex_id("1234", "vid").is_err());
        assert!(parse_hex_id("0x12345", "vid").is_err());
        assert!(parse_hex_id("0xghij", "vid").is_err());
        assert!(parse_hex_id("0x", "vid").is_err());
    }

    #[test]
    fn test_validate_endpoint_directions() {
        let mut config = ProbeConfig::default();
        config.transfer.endpoint_out = 0x87;
        assert!(config.validate().is_err());

        let mut config = ProbeConfig::default();
        config.transfer.endpoint_in = 0x05;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ProbeConfig::default();
        config.probe.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = ProbeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ProbeConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.probe.log_level, parsed.probe.log_level);
        assert_eq!(config.device.vendor_id, parsed.device.vendor_id);
        assert_eq!(config.device.teardown, parsed.device.teardown);
    }
}
