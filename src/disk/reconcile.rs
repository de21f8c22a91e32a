//! Compare the desired layout with what each disk already has

use crate::disk::layouts::{DesiredPartitionSpec, LayoutRegistry};
use crate::disk::model::{DeviceModel, Disk};
use crate::disk::usage::{Role, UsageAssignment};
use crate::disk::warnings::PlanWarning;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// What one selected disk has and what it still needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub disk: String,
    pub role: Role,
    /// A fresh partition table will be written
    pub wipe: bool,
    /// Filesystem labels already on the disk, lowercased
    pub existing_labels: BTreeSet<String>,
    /// Specs already present on the disk
    pub satisfied: Vec<DesiredPartitionSpec>,
    /// Specs to create, in declaration order
    pub missing: Vec<DesiredPartitionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotSelected,
    NoSpecsForRole(Role),
    NotInModel,
    /// Existing partitions whose end could not be read
    UnknownFreeSpace,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSelected => write!(f, "not selected"),
            Self::NoSpecsForRole(role) => write!(f, "no partitions declared for role '{}'", role),
            Self::NotInModel => write!(f, "not present in the device model"),
            Self::UnknownFreeSpace => {
                write!(f, "existing partition ends are unreadable, free space unknown")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDisk {
    pub disk: String,
    pub reason: SkipReason,
}

impl SkippedDisk {
    pub fn warning(&self) -> PlanWarning {
        PlanWarning::DiskSkipped {
            disk: self.disk.clone(),
            reason: self.reason.to_string(),
        }
    }
}

/// Reconcile one disk against its assignment
pub fn reconcile_disk(
    disk: &Disk,
    registry: &LayoutRegistry,
    assignment: &UsageAssignment,
) -> std::result::Result<ReconciliationResult, SkipReason> {
    if !assignment.selected {
        return Err(SkipReason::NotSelected);
    }
    if !registry.has_role(&assignment.role) {
        return Err(SkipReason::NoSpecsForRole(assignment.role.clone()));
    }

    // A wiped disk loses every label it had
    let existing_labels = if assignment.wipe {
        BTreeSet::new()
    } else {
        disk.existing_labels()
    };

    let (satisfied, missing): (Vec<DesiredPartitionSpec>, Vec<DesiredPartitionSpec>) = registry
        .for_role(&assignment.role)
        .cloned()
        .partition(|spec| existing_labels.contains(&spec.label.to_lowercase()));

    debug!(
        "{}: {} satisfied, {} missing",
        disk.path,
        satisfied.len(),
        missing.len()
    );

    Ok(ReconciliationResult {
        disk: disk.path.clone(),
        role: assignment.role.clone(),
        wipe: assignment.wipe,
        existing_labels,
        satisfied,
        missing,
    })
}

/// Reconcile every assigned disk. Disks are independent of each other.
pub fn reconcile(
    model: &DeviceModel,
    registry: &LayoutRegistry,
    assignments: &[UsageAssignment],
) -> (Vec<ReconciliationResult>, Vec<SkippedDisk>) {
    let mut results = Vec::new();
    let mut skipped = Vec::new();

    for assignment in assignments {
        let outcome = match model.disk(&assignment.disk) {
            Some(disk) => reconcile_disk(disk, registry, assignment),
            None => Err(SkipReason::NotInModel),
        };
        match outcome {
            Ok(result) => results.push(result),
            Err(reason) => {
                debug!("Skipping {}: {}", assignment.disk, reason);
                skipped.push(SkippedDisk {
                    disk: assignment.disk.clone(),
                    reason,
                });
            }
        }
    }

    (results, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::model::{FilesystemInfo, Partition};

    fn partition(disk: &str, number: u32, label: Option<&str>) -> Partition {
        Partition {
            number,
            path: crate::disk::detection::partition_path(disk, number),
            start_bytes: None,
            end_bytes: None,
            size_bytes: None,
            table_type: None,
            name: None,
            flags: Vec::new(),
            filesystem: label.map(|l| FilesystemInfo {
                label: Some(l.to_string()),
                ..Default::default()
            }),
        }
    }

    fn disk(path: &str, labels: &[&str]) -> Disk {
        Disk {
            path: path.to_string(),
            model: None,
            transport: None,
            device_type: "sd".to_string(),
            size_bytes: None,
            table: Some("gpt".to_string()),
            partitions: labels
                .iter()
                .enumerate()
                .map(|(i, l)| partition(path, i as u32 + 1, Some(l)))
                .collect(),
        }
    }

    fn assign(disk: &str, role: Role) -> UsageAssignment {
        UsageAssignment {
            disk: disk.to_string(),
            selected: true,
            role,
            wipe: false,
        }
    }

    fn registry() -> LayoutRegistry {
        LayoutRegistry::new(LayoutRegistry::sample_specs()).unwrap()
    }

    fn labels(specs: &[DesiredPartitionSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn label_match_is_case_insensitive() {
        let d = disk("/dev/sda", &["EFI", "Root"]);
        let result = reconcile_disk(&d, &registry(), &assign("/dev/sda", Role::System)).unwrap();
        assert_eq!(labels(&result.satisfied), vec!["efi", "root"]);
        assert_eq!(labels(&result.missing), vec!["swap", "opt", "var"]);
    }

    #[test]
    fn missing_follows_declaration_order() {
        let d = disk("/dev/sda", &["opt"]);
        let result = reconcile_disk(&d, &registry(), &assign("/dev/sda", Role::System)).unwrap();
        assert_eq!(labels(&result.missing), vec!["efi", "root", "swap", "var"]);
    }

    #[test]
    fn fully_present_role_has_nothing_missing() {
        let d = disk("/dev/nvme0n1", &["home"]);
        let result = reconcile_disk(&d, &registry(), &assign("/dev/nvme0n1", Role::Home)).unwrap();
        assert!(result.missing.is_empty());
        assert_eq!(labels(&result.satisfied), vec!["home"]);
    }

    #[test]
    fn wipe_ignores_existing_labels() {
        let d = disk("/dev/sda", &["efi", "root"]);
        let mut a = assign("/dev/sda", Role::System);
        a.wipe = true;
        let result = reconcile_disk(&d, &registry(), &a).unwrap();
        assert!(result.satisfied.is_empty());
        assert_eq!(result.missing.len(), 5);
    }

    #[test]
    fn unselected_and_unknown_roles_are_skipped() {
        let model = DeviceModel {
            disks: vec![disk("/dev/sda", &[]), disk("/dev/sdb", &[]), disk("/dev/sdc", &[])],
        };
        let assignments = vec![
            UsageAssignment::not_selected("/dev/sda"),
            assign("/dev/sdb", Role::Custom("store".to_string())),
            assign("/dev/sdc", Role::System),
            assign("/dev/sdx", Role::System),
        ];
        let (results, skipped) = reconcile(&model, &registry(), &assignments);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].disk, "/dev/sdc");
        assert_eq!(
            skipped,
            vec![
                SkippedDisk {
                    disk: "/dev/sda".to_string(),
                    reason: SkipReason::NotSelected
                },
                SkippedDisk {
                    disk: "/dev/sdb".to_string(),
                    reason: SkipReason::NoSpecsForRole(Role::Custom("store".to_string()))
                },
                SkippedDisk {
                    disk: "/dev/sdx".to_string(),
                    reason: SkipReason::NotInModel
                },
            ]
        );
        assert_eq!(
            skipped[1].warning().to_string(),
            "/dev/sdb: skipped (no partitions declared for role 'store')"
        );
    }
}
