//! Layout configuration file
//!
//! ```toml
//! [[partitions]]
//! label = "efi"
//! size = "512MiB"
//! table_type = "fat32"
//! format = "mkfs.fat -F32"
//! mount = "/boot/efi"
//! role = "system"
//!
//! [[disks]]
//! path = "/dev/sda"
//! role = "system"
//! ```

use crate::disk::layouts::{DesiredPartitionSpec, LayoutRegistry};
use crate::disk::usage::DiskDecision;
use crate::utils::error::{DiskplanError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Desired partitions plus optional pre-made usage decisions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Desired partitions, in creation order
    #[serde(default)]
    pub partitions: Vec<DesiredPartitionSpec>,
    /// Usage decisions per disk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<DiskDecision>,
}

impl LayoutConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: LayoutConfig = toml::from_str(content)?;
        debug!(
            "Loaded layout: {} partition(s), {} disk decision(s)",
            config.partitions.len(),
            config.disks.len()
        );
        Ok(config)
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        LayoutConfig {
            partitions: LayoutRegistry::sample_specs(),
            disks: vec![
                DiskDecision {
                    path: "/dev/nvme0n1".to_string(),
                    selected: true,
                    role: Some("system".to_string()),
                    wipe: false,
                },
                DiskDecision {
                    path: "/dev/sda".to_string(),
                    selected: true,
                    role: Some("home".to_string()),
                    wipe: false,
                },
            ],
        }
    }

    /// Validate the configuration and build the registry
    pub fn registry(&self) -> Result<LayoutRegistry> {
        if self.partitions.is_empty() {
            return Err(DiskplanError::ValidationError(
                "Layout declares no partitions".to_string(),
            ));
        }

        for decision in &self.disks {
            if !decision.path.starts_with("/dev/") {
                return Err(DiskplanError::ValidationError(format!(
                    "Disk path '{}' must start with /dev/",
                    decision.path
                )));
            }
        }

        LayoutRegistry::new(self.partitions.clone())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.registry().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::usage::Role;

    const LAYOUT: &str = r#"
[[partitions]]
label = "efi"
size = "512MiB"
table_type = "fat32"
format = "mkfs.fat -F32"
mount = "/boot/efi"
role = "system"

[[partitions]]
label = "root"
table_type = "ext4"
format = "mkfs.ext4"
mount = "/"
role = "system"

[[partitions]]
label = "media"
table_type = "ext4"
format = "mkfs.ext4"
mount = "/srv/media"
role = "Store"

[[disks]]
path = "/dev/sda"
role = "system"
wipe = true

[[disks]]
path = "/dev/sdb"
selected = false
"#;

    #[test]
    fn parses_layout_in_declaration_order() {
        let config = LayoutConfig::from_toml(LAYOUT).unwrap();
        let registry = config.registry().unwrap();
        let labels: Vec<&str> = registry.specs().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["efi", "root", "media"]);
        assert!(registry.specs()[0].must_format);
        assert_eq!(registry.specs()[2].role, Role::Custom("store".to_string()));

        assert_eq!(config.disks.len(), 2);
        assert!(config.disks[0].selected);
        assert!(config.disks[0].wipe);
        assert!(!config.disks[1].selected);
    }

    #[test]
    fn missing_table_type_fails_validation() {
        let text = r#"
[[partitions]]
label = "root"
format = "mkfs.ext4"
role = "system"
"#;
        let config = LayoutConfig::from_toml(text).unwrap();
        assert!(matches!(
            config.validate(),
            Err(DiskplanError::ValidationError(_))
        ));
    }

    #[test]
    fn invalid_role_in_layout_is_a_parse_error() {
        let text = r#"
[[partitions]]
label = "root"
table_type = "ext4"
format = "mkfs.ext4"
role = "not a role"
"#;
        assert!(matches!(
            LayoutConfig::from_toml(text),
            Err(DiskplanError::TomlParse(_))
        ));
    }

    #[test]
    fn empty_layout_is_invalid() {
        let config = LayoutConfig::from_toml("").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn sample_round_trips_through_toml() {
        let sample = LayoutConfig::sample();
        let text = toml::to_string_pretty(&sample).unwrap();
        let back = LayoutConfig::from_toml(&text).unwrap();
        assert_eq!(back.partitions, sample.partitions);
        assert!(back.validate().is_ok());
    }
}
