//! Configuration Management
//!
//! Discovery settings, loaded from a YAML/JSON file, from the host's
//! string property map, or built in code.

use crate::error::{DiscoveryError, Result};
use crate::retry::DEFAULT_MAX_ATTEMPTS;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default member port attached to discovered addresses
pub const DEFAULT_PORT: u16 = 5701;

/// Default overall timeout of a single REST call, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Instance label used to select cluster members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl FromStr for Label {
    type Err = DiscoveryError;

    /// Parse `key=value`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            DiscoveryError::Config(format!(
                "Invalid label '{}', expected the form 'key=value'",
                s
            ))
        };
        let (key, value) = s.split_once('=').ok_or_else(invalid)?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(key, value))
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Pair { key: String, value: String },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Pair { key, value } => Ok(Label { key, value }),
        }
    }
}

/// Accept either a list or a comma-separated string
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::List(list) => list,
        Repr::Text(text) => split_list(&text),
    })
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_retries() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Projects to search; the current project when empty
    #[serde(default, deserialize_with = "string_list")]
    pub projects: Vec<String>,
    /// Zones to search; the current zone when empty
    #[serde(default, deserialize_with = "string_list")]
    pub zones: Vec<String>,
    #[serde(default)]
    pub label: Option<Label>,
    /// Service account key; the metadata server issues tokens when unset
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum attempts for identity resolution and discovery
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            zones: Vec::new(),
            label: None,
            private_key_path: None,
            port: DEFAULT_PORT,
            retries: DEFAULT_MAX_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl DiscoveryConfig {
    pub fn builder() -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::default()
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcp-discovery").join("config.yaml"))
    }

    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DiscoveryError::Config(format!("Could not read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config: Self = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                DiscoveryError::Config(format!("Invalid config {}: {}", path.display(), e))
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                DiscoveryError::Config(format!("Invalid config {}: {}", path.display(), e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Build from the host's string properties
    ///
    /// Recognized keys: `projects`, `zones` (comma-separated), `label`
    /// (`key=value`), `private-key-path`, `port`. Unknown keys are ignored.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in properties {
            let value = value.trim();
            match key.as_str() {
                "projects" => config.projects = split_list(value),
                "zones" => config.zones = split_list(value),
                "label" if !value.is_empty() => config.label = Some(value.parse()?),
                "private-key-path" if !value.is_empty() => {
                    config.private_key_path = Some(PathBuf::from(value))
                }
                "port" => {
                    config.port = value.parse().map_err(|_| {
                        DiscoveryError::Config(format!("Invalid port '{}'", value))
                    })?
                }
                "label" | "private-key-path" => {}
                other => tracing::debug!("Ignoring unknown discovery property '{}'", other),
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retries == 0 {
            return Err(DiscoveryError::Config("'retries' must be at least 1".into()));
        }
        if self.request_timeout == 0 {
            return Err(DiscoveryError::Config(
                "'request-timeout' must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Builder for [`DiscoveryConfig`]
#[derive(Debug, Default)]
pub struct DiscoveryConfigBuilder {
    config: DiscoveryConfig,
}

impl DiscoveryConfigBuilder {
    pub fn projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.projects = projects.into_iter().map(Into::into).collect();
        self
    }

    pub fn zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.zones = zones.into_iter().map(Into::into).collect();
        self
    }

    pub fn label(mut self, label: Label) -> Self {
        self.config.label = Some(label);
        self
    }

    pub fn private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.private_key_path = Some(path.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout.as_secs();
        self
    }

    pub fn build(self) -> Result<DiscoveryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse() {
        let label: Label = "application=hazelcast".parse().unwrap();
        assert_eq!(label, Label::new("application", "hazelcast"));

        assert!("no-separator".parse::<Label>().is_err());
        assert!("=value".parse::<Label>().is_err());
        assert!("key=".parse::<Label>().is_err());
    }

    #[test]
    fn test_from_properties() {
        let properties: HashMap<String, String> = [
            ("projects", "p1, p2"),
            ("zones", "us-east1-b"),
            ("label", "cluster=prod"),
            ("private-key-path", "/etc/gcp/key.json"),
            ("port", "5801"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = DiscoveryConfig::from_properties(&properties).unwrap();
        assert_eq!(config.projects, vec!["p1", "p2"]);
        assert_eq!(config.zones, vec!["us-east1-b"]);
        assert_eq!(config.label, Some(Label::new("cluster", "prod")));
        assert_eq!(config.private_key_path, Some(PathBuf::from("/etc/gcp/key.json")));
        assert_eq!(config.port, 5801);
        assert_eq!(config.retries, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_from_properties_rejects_bad_values() {
        let bad_label: HashMap<String, String> =
            [("label".to_string(), "cluster".to_string())].into_iter().collect();
        assert!(matches!(
            DiscoveryConfig::from_properties(&bad_label),
            Err(DiscoveryError::Config(_))
        ));

        let bad_port: HashMap<String, String> =
            [("port".to_string(), "99999".to_string())].into_iter().collect();
        assert!(DiscoveryConfig::from_properties(&bad_port).is_err());
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "projects: [p1]\nzones: us-east1-b,us-east1-c\nlabel: cluster=prod\nretries: 3\n",
        )
        .unwrap();

        let config = DiscoveryConfig::load(&path).unwrap();
        assert_eq!(config.projects, vec!["p1"]);
        assert_eq!(config.zones, vec!["us-east1-b", "us-east1-c"]);
        assert_eq!(config.label, Some(Label::new("cluster", "prod")));
        assert_eq!(config.retries, 3);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_load_json_with_label_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"label": {"key": "cluster", "value": "prod"}, "private-key-path": "/k.json"}"#,
        )
        .unwrap();

        let config = DiscoveryConfig::load(&path).unwrap();
        assert!(config.projects.is_empty());
        assert_eq!(config.label, Some(Label::new("cluster", "prod")));
        assert_eq!(config.private_key_path, Some(PathBuf::from("/k.json")));
    }

    #[test]
    fn test_builder_validates() {
        assert!(DiscoveryConfig::builder().retries(0).build().is_err());

        let config = DiscoveryConfig::builder()
            .projects(["p1"])
            .zones(["z1", "z2"])
            .port(5702)
            .build()
            .unwrap();
        assert_eq!(config.zones.len(), 2);
        assert_eq!(config.port, 5702);
    }
}
