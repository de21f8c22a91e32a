//! Non-fatal planning diagnostics

use serde::Serialize;
use std::fmt;

/// Something that degraded the plan without stopping it.
///
/// Every variant names the disk it concerns where there is one, so a
/// problem on one disk never reads as a problem with the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// Filesystem feed lacked its top-level collection; structural data only
    FilesystemFeedMalformed,
    /// Same device path listed twice in the structural feed
    DuplicateDisk { disk: String },
    /// Partition number repeated (or zero) within one disk
    InvalidPartitionNumber { disk: String, number: u32 },
    /// Offset or size string in the structural feed could not be read
    UnparseableOffset {
        disk: String,
        number: u32,
        field: String,
        value: String,
    },
    /// Partition starts before the previous one ends
    NonMonotonicOffsets { disk: String, number: u32 },
    /// Desired size could not be parsed; a 1 MiB placeholder was planned
    MalformedSize {
        disk: String,
        label: String,
        value: String,
    },
    /// Usage role input was empty or invalid and fell back to `none`
    InvalidRole { disk: String, value: String },
    /// No usage decision was supplied for a discovered disk
    NoUsageDecision { disk: String },
    /// A usage decision names a disk the model does not contain
    UnknownDisk { disk: String },
    /// More than one usage decision for the same disk; the first was kept
    DuplicateDecision { disk: String },
    /// Disk produced no actions
    DiskSkipped { disk: String, reason: String },
    /// Specs declared after a remainder partition could not be placed
    SpecsAfterRemainder {
        disk: String,
        remainder: String,
        dropped: Vec<String>,
    },
    /// Declared size does not fit in the offset range; the disk's plan stops here
    SizeOverflow {
        disk: String,
        label: String,
        value: String,
    },
    /// Partition numbering ran out; the disk's plan stops here
    TooManyPartitions { disk: String, label: String },
    /// Planned partitions end past the disk's known capacity
    ExceedsCapacity {
        disk: String,
        required_mib: u64,
        available_mib: u64,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FilesystemFeedMalformed => write!(
                f,
                "filesystem feed is malformed; continuing with partition table data only"
            ),
            Self::DuplicateDisk { disk } => {
                write!(f, "{}: listed more than once, later entries ignored", disk)
            }
            Self::InvalidPartitionNumber { disk, number } => {
                write!(f, "{}: partition number {} is invalid or repeated", disk, number)
            }
            Self::UnparseableOffset {
                disk,
                number,
                field,
                value,
            } => write!(
                f,
                "{}: partition {} has unreadable {} '{}'",
                disk, number, field, value
            ),
            Self::NonMonotonicOffsets { disk, number } => write!(
                f,
                "{}: partition {} starts before the previous partition ends",
                disk, number
            ),
            Self::MalformedSize { disk, label, value } => write!(
                f,
                "{}: size '{}' for '{}' is not a valid size; planned 1 MiB instead",
                disk, value, label
            ),
            Self::InvalidRole { disk, value } => {
                write!(f, "{}: invalid role '{}', using 'none'", disk, value)
            }
            Self::NoUsageDecision { disk } => {
                write!(f, "{}: no usage decision supplied, not selected", disk)
            }
            Self::UnknownDisk { disk } => {
                write!(f, "{}: usage decision for a disk that was not discovered", disk)
            }
            Self::DuplicateDecision { disk } => {
                write!(f, "{}: duplicate usage decision ignored", disk)
            }
            Self::DiskSkipped { disk, reason } => write!(f, "{}: skipped ({})", disk, reason),
            Self::SpecsAfterRemainder {
                disk,
                remainder,
                dropped,
            } => write!(
                f,
                "{}: '{}' consumes the rest of the disk; not planned: {}",
                disk,
                remainder,
                dropped.join(", ")
            ),
            Self::SizeOverflow { disk, label, value } => write!(
                f,
                "{}: size '{}' for '{}' is out of range; nothing planned from here on",
                disk, value, label
            ),
            Self::TooManyPartitions { disk, label } => write!(
                f,
                "{}: no partition number left for '{}'; nothing planned from here on",
                disk, label
            ),
            Self::ExceedsCapacity {
                disk,
                required_mib,
                available_mib,
            } => write!(
                f,
                "{}: plan needs {} MiB but the disk has {} MiB",
                disk, required_mib, available_mib
            ),
        }
    }
}
