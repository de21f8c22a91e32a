//! Partition plan synthesis
//!
//! Turns the missing specs of one disk into an ordered list of actions.
//! Nothing is executed; the actions are handed to whatever runs them.

use crate::disk::detection::partition_path;
use crate::disk::layouts::SizeRequest;
use crate::disk::model::Disk;
use crate::disk::reconcile::{ReconciliationResult, SkipReason};
use crate::disk::usage::Role;
use crate::disk::warnings::PlanWarning;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Head-room before the first partition (1 MiB alignment)
pub const HEADROOM_MIB: u64 = 1;

/// Space planned for a partition whose size could not be read
pub const FALLBACK_MIB: u64 = 1;

/// Partition table written on wiped or blank disks
pub const DEFAULT_TABLE: &str = "gpt";

/// Where a new partition ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionEnd {
    Mib(u64),
    /// Rest of the disk
    Remainder,
}

impl std::fmt::Display for PartitionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mib(mib) => write!(f, "{}MiB", mib),
            Self::Remainder => write!(f, "100%"),
        }
    }
}

/// One step of a disk plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PartitionAction {
    CreateTable {
        disk: String,
        table: String,
    },
    CreatePartition {
        disk: String,
        /// Partition table the partition goes into (e.g., "gpt", "msdos")
        table: String,
        number: u32,
        label: String,
        table_type: String,
        start_mib: u64,
        end: PartitionEnd,
    },
    SetFlag {
        disk: String,
        number: u32,
        flag: String,
    },
    FormatPartition {
        device: String,
        command: String,
        /// Filesystem label to stamp so the next run finds the partition
        label: String,
    },
    Mount {
        device: String,
        mount_path: String,
    },
}

/// Where planning starts on a disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStart {
    /// Highest partition number already in use (0 for a fresh table)
    pub last_number: u32,
    pub cursor_mib: u64,
    pub create_table: bool,
    /// Partition table kind the new partitions go into
    pub table: String,
    /// Disk capacity, when known
    pub capacity_mib: Option<u64>,
}

impl PlanStart {
    /// A blank disk that gets a new partition table
    pub fn fresh(capacity_mib: Option<u64>) -> Self {
        Self {
            last_number: 0,
            cursor_mib: HEADROOM_MIB,
            create_table: true,
            table: DEFAULT_TABLE.to_string(),
            capacity_mib,
        }
    }

    /// Continue after what the disk already holds, or start over when wiping.
    ///
    /// Refuses a disk whose free space cannot be located, rather than
    /// planning over existing partitions.
    pub fn for_disk(disk: &Disk, wipe: bool) -> std::result::Result<Self, SkipReason> {
        let table = match disk.table.as_deref() {
            Some(table) if !wipe => table,
            _ => return Ok(Self::fresh(disk.size_mib())),
        };

        let cursor_mib = if disk.partitions.is_empty() {
            HEADROOM_MIB
        } else {
            disk.first_free_mib()
                .ok_or(SkipReason::UnknownFreeSpace)?
                .max(HEADROOM_MIB)
        };

        Ok(Self {
            last_number: disk.highest_partition_number(),
            cursor_mib,
            create_table: false,
            table: table.to_string(),
            capacity_mib: disk.size_mib(),
        })
    }
}

/// Ordered actions for one disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskPlan {
    pub disk: String,
    pub role: Role,
    /// Labels already present, left untouched
    pub satisfied: Vec<String>,
    pub actions: Vec<PartitionAction>,
    pub warnings: Vec<PlanWarning>,
}

impl DiskPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn partitions_created(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, PartitionAction::CreatePartition { .. }))
            .count()
    }
}

/// Build the action list for one disk.
///
/// Order: table, then each partition with its flags, then every format,
/// then every mount with parents before children.
pub fn synthesize(result: &ReconciliationResult, start: &PlanStart) -> DiskPlan {
    let disk = result.disk.as_str();
    let mut warnings = Vec::new();
    let mut actions = Vec::new();
    let mut formats = Vec::new();
    let mut mounts: Vec<(String, String)> = Vec::new();

    let satisfied = result.satisfied.iter().map(|s| s.label.clone()).collect();

    if result.missing.is_empty() {
        debug!("{}: nothing to create", disk);
        return DiskPlan {
            disk: disk.to_string(),
            role: result.role.clone(),
            satisfied,
            actions,
            warnings,
        };
    }

    if start.create_table {
        actions.push(PartitionAction::CreateTable {
            disk: disk.to_string(),
            table: start.table.clone(),
        });
    }

    let mut number = start.last_number;
    let mut cursor = start.cursor_mib;
    let mut remainder: Option<&str> = None;

    for (i, spec) in result.missing.iter().enumerate() {
        if let Some(taken_by) = remainder {
            let dropped: Vec<String> = result.missing[i..]
                .iter()
                .map(|s| s.label.clone())
                .collect();
            warnings.push(PlanWarning::SpecsAfterRemainder {
                disk: disk.to_string(),
                remainder: taken_by.to_string(),
                dropped,
            });
            break;
        }

        let Some(next) = number.checked_add(1) else {
            warnings.push(PlanWarning::TooManyPartitions {
                disk: disk.to_string(),
                label: spec.label.clone(),
            });
            break;
        };

        let (mib, raw) = match spec.size_request() {
            SizeRequest::Mib(mib) => (Some(mib), spec.size.clone().unwrap_or_default()),
            SizeRequest::Remainder => (None, String::new()),
            SizeRequest::Malformed(value) => {
                warnings.push(PlanWarning::MalformedSize {
                    disk: disk.to_string(),
                    label: spec.label.clone(),
                    value: value.clone(),
                });
                (Some(FALLBACK_MIB), value)
            }
        };

        let end = match mib {
            None => PartitionEnd::Remainder,
            Some(mib) => match cursor.checked_add(mib) {
                Some(end) => PartitionEnd::Mib(end),
                None => {
                    warnings.push(PlanWarning::SizeOverflow {
                        disk: disk.to_string(),
                        label: spec.label.clone(),
                        value: raw,
                    });
                    break;
                }
            },
        };
        if end == PartitionEnd::Remainder {
            remainder = Some(spec.label.as_str());
        }
        number = next;

        actions.push(PartitionAction::CreatePartition {
            disk: disk.to_string(),
            table: start.table.clone(),
            number,
            label: spec.label.clone(),
            table_type: spec.table_type.clone(),
            start_mib: cursor,
            end,
        });

        if spec.is_esp() {
            for flag in ["boot", "esp"] {
                actions.push(PartitionAction::SetFlag {
                    disk: disk.to_string(),
                    number,
                    flag: flag.to_string(),
                });
            }
        }

        if let PartitionEnd::Mib(end_mib) = end {
            cursor = end_mib;
        }

        let device = partition_path(disk, number);
        if let Some(command) = spec.format_command() {
            formats.push(PartitionAction::FormatPartition {
                device: device.clone(),
                command: command.to_string(),
                label: spec.label.clone(),
            });
        }
        if let Some(mount) = spec.mount_path() {
            mounts.push((device, mount.to_string()));
        }
    }

    if let Some(capacity) = start.capacity_mib {
        let overflows = if remainder.is_some() {
            cursor >= capacity
        } else {
            cursor > capacity
        };
        if overflows {
            warnings.push(PlanWarning::ExceedsCapacity {
                disk: disk.to_string(),
                required_mib: cursor,
                available_mib: capacity,
            });
        }
    }

    actions.extend(formats);

    // "/" before "/boot" before "/boot/efi"
    mounts.sort_by_key(|(_, path)| Path::new(path).components().count());
    actions.extend(
        mounts
            .into_iter()
            .map(|(device, mount_path)| PartitionAction::Mount { device, mount_path }),
    );

    info!(
        "{}: planned {} action(s) for role '{}'",
        disk,
        actions.len(),
        result.role
    );

    DiskPlan {
        disk: disk.to_string(),
        role: result.role.clone(),
        satisfied,
        actions,
        warnings,
    }
}
