//! Client Configuration
//!
//! Defines the configuration for the step challenge client including:
//! - Ledger gateway connection and finality polling
//! - Encryption relayer connection
//! - Notification dismissal delays
//!
//! Values are layered: defaults, then an optional TOML file, then
//! environment variables. The binary applies CLI flags last.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::encryption::RelayerConfig;
use crate::ledger::GatewayConfig;

pub const ENV_GATEWAY_URL: &str = "STEP_GATEWAY_URL";
pub const ENV_CONTRACT_ADDRESS: &str = "STEP_CONTRACT_ADDRESS";
pub const ENV_RELAYER_URL: &str = "STEP_RELAYER_URL";
pub const ENV_ACCOUNT: &str = "STEP_ACCOUNT";

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default account address used as the session
    pub account: Option<String>,
    /// Ledger gateway
    pub gateway: GatewayConfig,
    /// FHE relayer
    pub relayer: RelayerConfig,
    /// Notification timing
    pub notifications: NotificationConfig,
}

/// How long terminal notifications stay visible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub success_dismiss_ms: u64,
    pub error_dismiss_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            success_dismiss_ms: 2000,
            error_dismiss_ms: 3000,
        }
    }
}

impl NotificationConfig {
    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_dismiss_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_dismiss_ms)
    }
}

impl ClientConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid client configuration")
    }

    /// Read a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Defaults, or the file at `path` when given, with environment overrides applied
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `STEP_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_GATEWAY_URL) {
            self.gateway.url = url;
        }
        if let Ok(address) = std::env::var(ENV_CONTRACT_ADDRESS) {
            self.gateway.contract_address = address;
        }
        if let Ok(url) = std::env::var(ENV_RELAYER_URL) {
            self.relayer.url = url;
        }
        if let Ok(account) = std::env::var(ENV_ACCOUNT) {
            if !account.is_empty() {
                self.account = Some(account);
            }
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize client configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for key in [ENV_GATEWAY_URL, ENV_CONTRACT_ADDRESS, ENV_RELAYER_URL, ENV_ACCOUNT] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.notifications.success_delay(), Duration::from_secs(2));
        assert_eq!(config.notifications.error_delay(), Duration::from_secs(3));
        assert_eq!(config.gateway.finality_max_polls, 120);
        assert!(config.account.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            account = "0xabc"

            [gateway]
            url = "https://gateway.example"
            contract_address = "0xcontract"
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.url, "https://gateway.example");
        assert_eq!(config.gateway.contract_address, "0xcontract");
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.relayer, RelayerConfig::default());
        assert_eq!(config.account.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(ClientConfig::from_toml("gateway = 5").is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ClientConfig::default();
        config.account = Some("0x1".to_string());
        let parsed = ClientConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    #[serial]
    fn test_load_file_with_env_override() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[relayer]\nurl = \"http://relayer.file\"\n[notifications]\nerror_dismiss_ms = 10"
        )
        .unwrap();

        std::env::set_var(ENV_RELAYER_URL, "http://relayer.env");
        std::env::set_var(ENV_ACCOUNT, "0xenv");
        let config = ClientConfig::load(Some(file.path())).unwrap();
        clear_env();

        assert_eq!(config.relayer.url, "http://relayer.env");
        assert_eq!(config.account.as_deref(), Some("0xenv"));
        assert_eq!(config.notifications.error_dismiss_ms, 10);
        assert_eq!(config.notifications.success_dismiss_ms, 2000);
    }

    #[test]
    #[serial]
    fn test_load_missing_file() {
        clear_env();
        assert!(ClientConfig::load(Some(Path::new("/nonexistent/step.toml"))).is_err());
    }
}
