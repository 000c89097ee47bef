//! Service configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! a partial file still yields a working configuration. Values that could
//! be set to something pathological are clamped through `effective_*`
//! accessors instead of rejected at load time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::allowlist::CommandAllowlist;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleSettings,
    #[serde(default)]
    pub inventory: InventorySettings,
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oracle: OracleSettings::default(),
            inventory: InventorySettings::default(),
            features: FeatureSettings::default(),
            allowed_commands: default_allowed_commands(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    #[serde(default = "default_oracle_base_url")]
    pub base_url: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    /// Name of the environment variable holding the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

impl OracleSettings {
    /// Temperature clamped to the range the backend accepts.
    pub fn effective_temperature(&self) -> f64 {
        self.temperature.clamp(0.0, 2.0)
    }

    /// Request timeout clamped to [5, 600] seconds.
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.clamp(5, 600)
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Path to the TOML device testbed. Without one, command execution is
    /// unavailable and the engine says so instead of failing.
    #[serde(default)]
    pub testbed_file: Option<PathBuf>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            testbed_file: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl InventorySettings {
    pub fn effective_connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs.clamp(1, 120)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// Run ping/DNS fallback probes after a connection failure.
    #[serde(default = "default_true")]
    pub reachability_probes: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            reachability_probes: default_true(),
        }
    }
}

fn default_oracle_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_oracle_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_oracle_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Read-only operational commands, the same safe baseline the service has
/// always shipped with. Overridden wholesale by `allowed_commands` in the
/// config file.
fn default_allowed_commands() -> Vec<String> {
    [
        "show version",
        "show ip interface brief",
        "show interfaces",
        "show run",
        "show logging",
        "show ip route",
        "show cdp neighbors detail",
        "show lldp neighbors detail",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Config {
    /// Load from `path`, failing on unreadable or malformed files.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        if config.allowed_commands.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_commands must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn allowlist(&self) -> CommandAllowlist {
        CommandAllowlist::from_commands(&self.allowed_commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_include_the_baseline_commands() {
        let config = Config::default();
        assert_eq!(config.allowed_commands.len(), 8);
        assert!(config.allowlist().is_allowed("show ip route"));
        assert!(config.features.reachability_probes);
        assert!(config.inventory.testbed_file.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[oracle]
model = "qwen2.5:14b"

[features]
reachability_probes = false
"#
        )
        .unwrap();

        let config = Config::load(f.path()).unwrap();
        assert_eq!(config.oracle.model, "qwen2.5:14b");
        assert_eq!(config.oracle.base_url, "http://localhost:11434/v1");
        assert!(!config.features.reachability_probes);
        assert_eq!(config.allowed_commands.len(), 8);
    }

    #[test]
    fn pathological_values_are_clamped() {
        let settings = OracleSettings {
            temperature: 9.0,
            timeout_secs: 1,
            ..OracleSettings::default()
        };
        assert_eq!(settings.effective_temperature(), 2.0);
        assert_eq!(settings.effective_timeout_secs(), 5);

        let inv = InventorySettings {
            connect_timeout_secs: 0,
            ..InventorySettings::default()
        };
        assert_eq!(inv.effective_connect_timeout_secs(), 1);
    }

    #[test]
    fn empty_allowlist_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "allowed_commands = []").unwrap();
        assert!(matches!(
            Config::load(f.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/netsift.toml")).unwrap();
        assert_eq!(config.allowed_commands.len(), 8);
    }
}
