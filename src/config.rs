//! Zone configuration
//!
//! Loaded once by the process and handed to the announcer read-only.
//!
//! ```json
//! {
//!   "receiver": { "host": "192.168.50.249", "port": 60128 },
//!   "zones": {
//!     "kitchen": { "zone_id": 1, "sli": "2B" },
//!     "patio":   { "zone_id": "2", "sli": "2b" }
//!   }
//! }
//! ```

use crate::client::EiscpClient;
use crate::connection::DEFAULT_PORT;
use crate::error::{EiscpError, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable that overrides the configured receiver host
pub const RECEIVER_HOST_ENV: &str = "DEFAULT_RECEIVER_IP";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub receiver: ReceiverConfig,

    #[serde(default)]
    pub zones: BTreeMap<String, ZoneEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "192.168.50.249".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Where a named zone lives on the receiver and which input carries announcements
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ZoneEntry {
    #[serde(default = "default_zone_id", deserialize_with = "string_or_number")]
    pub zone_id: String,
    #[serde(default = "default_sli")]
    pub sli: String,
}

impl Default for ZoneEntry {
    fn default() -> Self {
        Self {
            zone_id: default_zone_id(),
            sli: default_sli(),
        }
    }
}

impl ZoneEntry {
    /// Announcement input code, uppercased the way the receiver reports it
    pub fn announcement_input(&self) -> String {
        self.sli.trim().to_ascii_uppercase()
    }
}

fn default_zone_id() -> String {
    crate::zone::MAIN_ZONE.to_string()
}

fn default_sli() -> String {
    "2B".to_string()
}

/// Zone ids are written both as `1` and `"1"` in the wild
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "zone_id must be a string or number, got {}",
            other
        ))),
    }
}

impl Config {
    /// Parse a configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::info!("Loaded {} zones from {}", config.zones.len(), path.display());
        Ok(config)
    }

    /// Apply `DEFAULT_RECEIVER_IP` if it is set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var(RECEIVER_HOST_ENV) {
            if !host.trim().is_empty() {
                tracing::debug!("Receiver host overridden by {}: {}", RECEIVER_HOST_ENV, host);
                self.receiver.host = host.trim().to_string();
            }
        }
        self
    }

    /// Look up a zone by name
    pub fn zone(&self, name: &str) -> Result<&ZoneEntry> {
        self.zones
            .get(name)
            .ok_or_else(|| EiscpError::Configuration(format!("unknown zone '{}'", name)))
    }

    /// Client for the configured receiver
    pub fn client(&self) -> EiscpClient {
        EiscpClient::with_port(self.receiver.host.clone(), self.receiver.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "receiver": { "host": "192.0.2.10" },
        "zones": {
            "kitchen": { "zone_id": 1 },
            "patio": { "zone_id": "2", "sli": "2b" },
            "garage": {}
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.receiver.host, "192.0.2.10");
        assert_eq!(config.receiver.port, 60128);

        let patio = config.zone("patio").unwrap();
        assert_eq!(patio.zone_id, "2");
        assert_eq!(patio.announcement_input(), "2B");

        assert_eq!(config.zone("kitchen").unwrap().zone_id, "1");
        assert_eq!(config.zone("garage").unwrap(), &ZoneEntry::default());
    }

    #[test]
    fn test_unknown_zone_is_configuration_error() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        assert!(matches!(config.zone("attic"), Err(EiscpError::Configuration(_))));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.receiver.host, "192.168.50.249");
        assert!(config.zones.is_empty());
    }

    #[test]
    fn test_rejects_bad_zone_id() {
        let result = Config::from_json_str(r#"{"zones": {"x": {"zone_id": [1]}}}"#);
        assert!(matches!(result, Err(EiscpError::Json(_))));
    }
}
