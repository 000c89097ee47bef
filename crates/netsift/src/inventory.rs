//! Device inventory (testbed).
//!
//! A flat TOML file of `[[devices]]` records. The inventory is re-read for
//! every run so operators can edit the testbed without restarting anything.

use std::path::Path;

use serde::{Deserialize, Serialize};

use netsift_common::ConfigError;

/// One device as described in the testbed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Logical name; must match what alarms and the oracle call the device.
    pub name: String,
    /// Management address (IP or resolvable hostname).
    pub address: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_platform() -> String {
    "iosxe".to_string()
}

fn default_port() -> u16 {
    22
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Testbed {
    #[serde(default)]
    devices: Vec<DeviceRecord>,
}

impl Testbed {
    pub fn from_devices(devices: Vec<DeviceRecord>) -> Self {
        Self { devices }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let testbed: Testbed = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(testbed)
    }

    /// Look a device up by its exact logical name.
    pub fn resolve(&self, name: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_devices_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[[devices]]
name = "R1"
address = "10.0.0.1"

[[devices]]
name = "edge-router-2"
address = "edge-router-2.lab.example.net"
platform = "nxos"
username = "ops"
port = 2222
"#
        )
        .unwrap();

        let testbed = Testbed::load(f.path()).unwrap();
        assert_eq!(testbed.devices().len(), 2);

        let r1 = testbed.resolve("R1").unwrap();
        assert_eq!(r1.platform, "iosxe");
        assert_eq!(r1.port, 22);
        assert!(r1.username.is_none());

        let edge = testbed.resolve("edge-router-2").unwrap();
        assert_eq!(edge.platform, "nxos");
        assert_eq!(edge.port, 2222);
    }

    #[test]
    fn resolve_is_exact_match() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[[devices]]\nname = \"R1\"\naddress = \"10.0.0.1\"").unwrap();
        let testbed = Testbed::load(f.path()).unwrap();
        assert!(testbed.resolve("r1").is_none());
        assert!(testbed.resolve("R10").is_none());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[[devices]\nname=").unwrap();
        assert!(matches!(
            Testbed::load(f.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
