//! Desired partition layout
//!
//! The registry is an ordered list: declaration order decides partition
//! numbering, so it is never rebuilt from a map.

use crate::disk::formatting::validate_label;
use crate::disk::usage::Role;
use crate::utils::error::{DiskplanError, Result};
use crate::utils::units::parse_size_mib;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Partition-table filesystem types understood as swap
pub const SWAP_TABLE_TYPES: &[&str] = &["linuxswap", "linux-swap", "linux-swap(v1)", "swap"];

/// Partition-table filesystem types that mark an EFI System Partition
const ESP_TABLE_TYPES: &[&str] = &["efi", "esp"];

/// FAT types that are an ESP when mounted under the boot tree
const FAT_TABLE_TYPES: &[&str] = &["fat32", "fat16", "vfat"];

/// One desired partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredPartitionSpec {
    /// Label, also written as the filesystem label (e.g., "efi", "root")
    pub label: String,
    /// Size such as "512MiB" or "128GiB"; absent = rest of the disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Filesystem type for the partition table (e.g., "fat32", "ext4")
    #[serde(default)]
    pub table_type: String,
    /// Filesystem creation command (e.g., "mkfs.ext4")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Mount point (e.g., "/boot/efi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
    pub role: Role,
    #[serde(default = "default_true")]
    pub must_format: bool,
    /// Force or suppress the EFI System Partition flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esp: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// How much space a spec asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeRequest {
    Mib(u64),
    /// Consume whatever is left on the disk
    Remainder,
    /// Size string that could not be read
    Malformed(String),
}

impl DesiredPartitionSpec {
    pub fn size_request(&self) -> SizeRequest {
        match self.size.as_deref() {
            None => SizeRequest::Remainder,
            Some(raw) => match parse_size_mib(raw) {
                Some(mib) => SizeRequest::Mib(mib),
                None => SizeRequest::Malformed(raw.to_string()),
            },
        }
    }

    pub fn is_remainder(&self) -> bool {
        self.size.is_none()
    }

    pub fn is_swap(&self) -> bool {
        SWAP_TABLE_TYPES.contains(&self.table_type.trim().to_lowercase().as_str())
    }

    /// Whether the partition needs the boot and esp flags
    pub fn is_esp(&self) -> bool {
        if let Some(esp) = self.esp {
            return esp;
        }
        let table_type = self.table_type.trim().to_lowercase();
        if ESP_TABLE_TYPES.contains(&table_type.as_str()) {
            return true;
        }
        FAT_TABLE_TYPES.contains(&table_type.as_str())
            && self.mount.as_deref().is_some_and(|m| {
                m == "/efi" || m.starts_with("/efi/") || m == "/boot" || m.starts_with("/boot/")
            })
    }

    /// Format command when the spec asks for formatting
    pub fn format_command(&self) -> Option<&str> {
        if !self.must_format {
            return None;
        }
        self.format.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Mount point, never for swap
    pub fn mount_path(&self) -> Option<&str> {
        if self.is_swap() {
            return None;
        }
        self.mount.as_deref()
    }

    fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(DiskplanError::ValidationError(
                "Partition label cannot be empty".to_string(),
            ));
        }
        if self.table_type.trim().is_empty() {
            return Err(DiskplanError::ValidationError(format!(
                "Partition '{}' has no table_type",
                self.label
            )));
        }
        if let Some(ref mount) = self.mount {
            if !mount.starts_with('/') {
                return Err(DiskplanError::ValidationError(format!(
                    "Partition '{}' mount path '{}' must be absolute",
                    self.label, mount
                )));
            }
            if !self.must_format && !self.is_swap() {
                return Err(DiskplanError::ValidationError(format!(
                    "Partition '{}' declares a mount path but is not formatted",
                    self.label
                )));
            }
        }
        match self.format_command() {
            Some(command) => validate_label(command, &self.label)?,
            None if self.must_format => {
                return Err(DiskplanError::ValidationError(format!(
                    "Partition '{}' must be formatted but has no format command",
                    self.label
                )));
            }
            None => {}
        }
        Ok(())
    }
}

/// Validated, ordered set of desired partitions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutRegistry {
    specs: Vec<DesiredPartitionSpec>,
}

impl LayoutRegistry {
    /// Validate and wrap the specs, keeping declaration order
    pub fn new(specs: Vec<DesiredPartitionSpec>) -> Result<Self> {
        let mut labels: HashSet<(Role, String)> = HashSet::new();
        let mut remainder_for: Vec<(Role, String)> = Vec::new();

        for spec in &specs {
            spec.validate()?;

            if !labels.insert((spec.role.clone(), spec.label.to_lowercase())) {
                return Err(DiskplanError::ValidationError(format!(
                    "Partition label '{}' is declared twice for role '{}'",
                    spec.label, spec.role
                )));
            }

            if let Some((_, earlier)) = remainder_for.iter().find(|(r, _)| *r == spec.role) {
                return Err(DiskplanError::ValidationError(if spec.is_remainder() {
                    format!(
                        "Role '{}' has more than one partition without a size ('{}' and '{}')",
                        spec.role, earlier, spec.label
                    )
                } else {
                    format!(
                        "Partition '{}' follows '{}', which already takes the rest of the disk",
                        spec.label, earlier
                    )
                }));
            }
            if spec.is_remainder() {
                remainder_for.push((spec.role.clone(), spec.label.clone()));
            }
        }

        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[DesiredPartitionSpec] {
        &self.specs
    }

    /// Specs for one role, in declaration order
    pub fn for_role<'a>(
        &'a self,
        role: &'a Role,
    ) -> impl Iterator<Item = &'a DesiredPartitionSpec> {
        self.specs.iter().filter(move |s| &s.role == role)
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.for_role(role).next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// System disk gets efi/root/swap/opt and var takes the rest; a home
    /// disk gets one partition spanning the whole disk.
    pub fn sample_specs() -> Vec<DesiredPartitionSpec> {
        fn spec(
            label: &str,
            size: Option<&str>,
            table_type: &str,
            format: &str,
            mount: Option<&str>,
            role: Role,
        ) -> DesiredPartitionSpec {
            DesiredPartitionSpec {
                label: label.to_string(),
                size: size.map(str::to_string),
                table_type: table_type.to_string(),
                format: Some(format.to_string()),
                mount: mount.map(str::to_string),
                role,
                must_format: true,
                esp: None,
            }
        }

        vec![
            spec("efi", Some("512MiB"), "fat32", "mkfs.fat -F32", Some("/boot/efi"), Role::System),
            spec("root", Some("128GiB"), "ext4", "mkfs.ext4", Some("/"), Role::System),
            spec("swap", Some("64GiB"), "linuxswap", "mkswap", None, Role::System),
            spec("opt", Some("128GiB"), "ext4", "mkfs.ext4", Some("/opt"), Role::System),
            spec("var", None, "ext4", "mkfs.ext4", Some("/var"), Role::System),
            spec("home", None, "ext4", "mkfs.ext4", Some("/home"), Role::Home),
        ]
    }
}

/// Print layout summary
pub fn print_layout_summary(registry: &LayoutRegistry) {
    println!("\nDesired layout ({} partitions):", registry.specs().len());
    println!(
        "{:<8} {:<10} {:>10} {:<10} {:<12} {}",
        "ROLE", "LABEL", "SIZE", "TYPE", "MOUNT", "FORMAT"
    );
    println!("{}", "-".repeat(66));

    for spec in registry.specs() {
        println!(
            "{:<8} {:<10} {:>10} {:<10} {:<12} {}",
            spec.role.as_str(),
            spec.label,
            spec.size.as_deref().unwrap_or("remainder"),
            spec.table_type,
            spec.mount.as_deref().unwrap_or("-"),
            spec.format_command().unwrap_or("-")
        );
    }
    println!();
}
