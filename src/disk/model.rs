//! Canonical disk/partition model
//!
//! Built fresh on every run by merging the structural feed with the
//! filesystem feed. The structural feed decides which disks and partitions
//! exist; the filesystem feed only decorates them.

use crate::disk::detection::{
    feed_name, infer_device_type, partition_path, BlockNode, FilesystemFeed, StructuralDisk,
    StructuralPartition,
};
use crate::disk::warnings::PlanWarning;
use crate::utils::units::{
    bytes_to_mib_ceil, parse_feed_bytes, size_human, DEFAULT_SECTOR_SIZE, MIB,
};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Filesystem metadata observed on a partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilesystemInfo {
    pub fstype: Option<String>,
    pub label: Option<String>,
    pub uuid: Option<String>,
    /// Free space as reported (e.g., "10.5G")
    pub available: Option<String>,
    /// Used percentage as reported (e.g., "12%")
    pub use_percent: Option<String>,
    pub mount_points: Vec<String>,
}

impl FilesystemInfo {
    fn from_node(node: &BlockNode) -> Self {
        Self {
            fstype: non_empty(&node.fstype),
            label: non_empty(&node.label),
            uuid: non_empty(&node.uuid),
            available: non_empty(&node.fsavail),
            use_percent: non_empty(&node.fsuse_percent),
            mount_points: node.mount_points(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    /// Partition number (1-based)
    pub number: u32,
    /// Device path (e.g., /dev/nvme0n1p2)
    pub path: String,
    pub start_bytes: Option<u64>,
    pub end_bytes: Option<u64>,
    pub size_bytes: Option<u64>,
    /// Filesystem type recorded in the partition table
    pub table_type: Option<String>,
    /// GPT partition name
    pub name: Option<String>,
    pub flags: Vec<String>,
    /// Absent when the filesystem feed has no entry for this partition
    pub filesystem: Option<FilesystemInfo>,
}

impl Partition {
    pub fn fs_label(&self) -> Option<&str> {
        self.filesystem.as_ref().and_then(|fs| fs.label.as_deref())
    }

    /// End offset, taken from start plus size when the end was unreadable
    pub fn known_end_bytes(&self) -> Option<u64> {
        self.end_bytes
            .or_else(|| self.start_bytes?.checked_add(self.size_bytes?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disk {
    /// Device path (e.g., /dev/sda)
    pub path: String,
    pub model: Option<String>,
    pub transport: Option<String>,
    /// Inferred device type (sd, nvme, or the transport)
    pub device_type: String,
    pub size_bytes: Option<u64>,
    /// Partition table kind, `None` when the disk carries no table
    pub table: Option<String>,
    /// Ordered by partition number
    pub partitions: Vec<Partition>,
}

impl Disk {
    /// Filesystem labels present on this disk, lowercased
    pub fn existing_labels(&self) -> BTreeSet<String> {
        self.partitions
            .iter()
            .filter_map(|p| p.fs_label())
            .map(|l| l.to_lowercase())
            .collect()
    }

    pub fn highest_partition_number(&self) -> u32 {
        self.partitions.iter().map(|p| p.number).max().unwrap_or(0)
    }

    /// End of the last existing partition in bytes.
    ///
    /// `None` when there are no partitions or any partition's end is
    /// unknown, since that partition could be the last one.
    pub fn last_end_bytes(&self) -> Option<u64> {
        self.partitions
            .iter()
            .map(Partition::known_end_bytes)
            .collect::<Option<Vec<u64>>>()?
            .into_iter()
            .max()
    }

    pub fn size_mib(&self) -> Option<u64> {
        self.size_bytes.map(|b| b / MIB)
    }

    pub fn has_partition_table(&self) -> bool {
        self.table.is_some()
    }

    pub fn size_human(&self) -> String {
        self.size_bytes
            .map(size_human)
            .unwrap_or_else(|| "-".to_string())
    }

    /// First MiB after the existing partitions
    pub fn first_free_mib(&self) -> Option<u64> {
        self.last_end_bytes().map(bytes_to_mib_ceil)
    }
}

/// The merged view of every disk in the structural feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceModel {
    pub disks: Vec<Disk>,
}

impl DeviceModel {
    /// Merge the two feeds into one model.
    ///
    /// Never fails: unreadable pieces are dropped and reported as warnings.
    pub fn build(
        structural: &[StructuralDisk],
        filesystem: &FilesystemFeed,
    ) -> (DeviceModel, Vec<PlanWarning>) {
        let mut warnings = Vec::new();

        let nodes = match filesystem.blockdevices.as_deref() {
            Some(nodes) => Some(nodes),
            None => {
                debug!("Filesystem feed unusable, building model from partition tables only");
                warnings.push(PlanWarning::FilesystemFeedMalformed);
                None
            }
        };

        let mut disks: Vec<Disk> = Vec::new();
        for entry in structural {
            if disks.iter().any(|d| d.path == entry.path) {
                debug!("Duplicate disk {} in structural feed", entry.path);
                warnings.push(PlanWarning::DuplicateDisk {
                    disk: entry.path.clone(),
                });
                continue;
            }
            disks.push(build_disk(entry, nodes, &mut warnings));
        }

        info!("Device model built: {} disk(s)", disks.len());
        (DeviceModel { disks }, warnings)
    }

    pub fn disk(&self, path: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    pub fn disk_paths(&self) -> Vec<String> {
        self.disks.iter().map(|d| d.path.clone()).collect()
    }
}

fn build_disk(
    entry: &StructuralDisk,
    nodes: Option<&[BlockNode]>,
    warnings: &mut Vec<PlanWarning>,
) -> Disk {
    let sector_size = entry.logical_sector_size.unwrap_or(DEFAULT_SECTOR_SIZE);
    let size_bytes = entry
        .size
        .as_deref()
        .and_then(|s| parse_feed_bytes(s, sector_size));

    let table = entry
        .label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "unknown" && *l != "loop")
        .map(str::to_string);

    let mut sorted: Vec<&StructuralPartition> = entry.partitions.iter().collect();
    sorted.sort_by_key(|p| p.number);

    let mut partitions: Vec<Partition> = Vec::with_capacity(sorted.len());
    for part in sorted {
        if part.number == 0 || partitions.iter().any(|p| p.number == part.number) {
            warnings.push(PlanWarning::InvalidPartitionNumber {
                disk: entry.path.clone(),
                number: part.number,
            });
            continue;
        }

        let mut offset = |field: &str, value: &Option<String>| -> Option<u64> {
            let raw = value.as_deref()?;
            let parsed = parse_feed_bytes(raw, sector_size);
            if parsed.is_none() {
                warnings.push(PlanWarning::UnparseableOffset {
                    disk: entry.path.clone(),
                    number: part.number,
                    field: field.to_string(),
                    value: raw.to_string(),
                });
            }
            parsed
        };
        let start_bytes = offset("start", &part.start);
        let end_bytes = offset("end", &part.end);
        let size_bytes = offset("size", &part.size);

        if let (Some(start), Some(prev_end)) =
            (start_bytes, partitions.last().and_then(|p| p.end_bytes))
        {
            if start < prev_end {
                warnings.push(PlanWarning::NonMonotonicOffsets {
                    disk: entry.path.clone(),
                    number: part.number,
                });
            }
        }

        let path = partition_path(&entry.path, part.number);
        let filesystem = nodes
            .and_then(|nodes| BlockNode::find(nodes, feed_name(&path)))
            .map(FilesystemInfo::from_node);
        if filesystem.is_none() {
            debug!("{} has no filesystem entry", path);
        }

        partitions.push(Partition {
            number: part.number,
            path,
            start_bytes,
            end_bytes,
            size_bytes,
            table_type: non_empty(&part.filesystem),
            name: non_empty(&part.name),
            flags: part.flags.clone(),
            filesystem,
        });
    }

    Disk {
        path: entry.path.clone(),
        model: non_empty(&entry.model),
        transport: non_empty(&entry.transport),
        device_type: infer_device_type(&entry.path, entry.transport.as_deref()),
        size_bytes,
        table,
        partitions,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::detection::parse_structural_feed;

    const PARTED: &str = r#"
{"disk": {"path": "/dev/nvme0n1", "size": "1000GB", "transport": "nvme", "label": "gpt",
  "partitions": [
    {"number": 2, "start": "538MB", "end": "1000GB", "size": "999GB", "filesystem": "ext4"},
    {"number": 1, "start": "1049kB", "end": "538MB", "size": "537MB", "filesystem": "fat32"}
  ]}}
{"disk": {"path": "/dev/sda", "size": "256GB", "transport": "ata", "label": "unknown",
  "partitions": []}}
"#;

    const LSBLK: &str = r#"{"blockdevices": [
        {"name": "nvme0n1", "children": [
            {"name": "nvme0n1p1", "fstype": "vfat", "label": "EFI", "uuid": "AAAA-BBBB",
             "mountpoints": ["/boot/efi"]},
            {"name": "nvme0n1p2", "fstype": "ext4", "label": "home", "uuid": "1234",
             "fsavail": "800G", "fsuse%": "5%", "mountpoints": ["/home"]}
        ]},
        {"name": "sda"}
    ]}"#;

    fn build() -> (DeviceModel, Vec<PlanWarning>) {
        let structural = parse_structural_feed(PARTED).unwrap();
        DeviceModel::build(&structural, &FilesystemFeed::from_json(LSBLK))
    }

    #[test]
    fn merges_filesystem_fields_using_nvme_names() {
        let (model, warnings) = build();
        assert!(warnings.is_empty());

        let nvme = model.disk("/dev/nvme0n1").unwrap();
        assert_eq!(nvme.device_type, "nvme");
        assert_eq!(nvme.partitions.len(), 2);
        assert_eq!(nvme.partitions[0].number, 1);
        assert_eq!(nvme.partitions[0].path, "/dev/nvme0n1p1");
        assert_eq!(nvme.partitions[0].fs_label(), Some("EFI"));
        assert_eq!(nvme.partitions[0].table_type.as_deref(), Some("fat32"));

        let home = nvme.partitions[1].filesystem.as_ref().unwrap();
        assert_eq!(home.uuid.as_deref(), Some("1234"));
        assert_eq!(home.available.as_deref(), Some("800G"));
        assert_eq!(home.use_percent.as_deref(), Some("5%"));
        assert_eq!(home.mount_points, vec!["/home".to_string()]);
    }

    #[test]
    fn existing_labels_are_lowercased() {
        let (model, _) = build();
        let labels = model.disk("/dev/nvme0n1").unwrap().existing_labels();
        assert!(labels.contains("efi"));
        assert!(labels.contains("home"));
    }

    #[test]
    fn unknown_table_means_no_table() {
        let (model, _) = build();
        let sda = model.disk("/dev/sda").unwrap();
        assert!(!sda.has_partition_table());
        assert_eq!(sda.highest_partition_number(), 0);
        assert_eq!(sda.first_free_mib(), None);
        assert_eq!(sda.device_type, "sd");
    }

    #[test]
    fn malformed_filesystem_feed_keeps_structure() {
        let structural = parse_structural_feed(PARTED).unwrap();
        let (model, warnings) =
            DeviceModel::build(&structural, &FilesystemFeed::from_json(r#"{"oops": 1}"#));
        assert_eq!(warnings, vec![PlanWarning::FilesystemFeedMalformed]);
        let nvme = model.disk("/dev/nvme0n1").unwrap();
        assert_eq!(nvme.partitions.len(), 2);
        assert!(nvme.partitions.iter().all(|p| p.filesystem.is_none()));
        assert!(nvme.existing_labels().is_empty());
    }

    #[test]
    fn partition_without_filesystem_entry_stays_bare() {
        let structural = parse_structural_feed(PARTED).unwrap();
        let lsblk = r#"{"blockdevices": [{"name": "nvme0n1", "children": [
            {"name": "nvme0n1p1", "fstype": "vfat", "label": "EFI"}]}]}"#;
        let (model, warnings) = DeviceModel::build(&structural, &FilesystemFeed::from_json(lsblk));
        assert!(warnings.is_empty());
        let nvme = model.disk("/dev/nvme0n1").unwrap();
        assert!(nvme.partitions[0].filesystem.is_some());
        assert!(nvme.partitions[1].filesystem.is_none());
    }

    #[test]
    fn merge_is_idempotent() {
        let (first, _) = build();
        let (second, _) = build();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_disks_and_bad_offsets_are_reported() {
        let text = r#"
{"disk": {"path": "/dev/sdb", "size": "100GB", "label": "gpt", "partitions": [
    {"number": 1, "start": "1MiB", "end": "zzz", "size": "10MiB"},
    {"number": 1, "start": "2MiB", "end": "3MiB"}
]}}
{"disk": {"path": "/dev/sdb", "size": "100GB", "partitions": []}}
"#;
        let structural = parse_structural_feed(text).unwrap();
        let (model, warnings) =
            DeviceModel::build(&structural, &FilesystemFeed::new(Vec::new()));
        assert_eq!(model.disks.len(), 1);
        assert_eq!(model.disks[0].partitions.len(), 1);
        assert!(warnings.contains(&PlanWarning::DuplicateDisk {
            disk: "/dev/sdb".to_string()
        }));
        assert!(warnings.contains(&PlanWarning::InvalidPartitionNumber {
            disk: "/dev/sdb".to_string(),
            number: 1
        }));
        assert!(warnings.iter().any(|w| matches!(
            w,
            PlanWarning::UnparseableOffset { field, .. } if field == "end"
        )));
    }

    #[test]
    fn overlapping_partitions_are_flagged() {
        let text = r#"{"disk": {"path": "/dev/sdc", "label": "gpt", "partitions": [
            {"number": 1, "start": "1MiB", "end": "100MiB"},
            {"number": 2, "start": "50MiB", "end": "200MiB"}
        ]}}"#;
        let structural = parse_structural_feed(text).unwrap();
        let (model, warnings) =
            DeviceModel::build(&structural, &FilesystemFeed::new(Vec::new()));
        assert_eq!(
            warnings,
            vec![PlanWarning::NonMonotonicOffsets {
                disk: "/dev/sdc".to_string(),
                number: 2
            }]
        );
        assert_eq!(model.disks[0].first_free_mib(), Some(200));
    }
}
