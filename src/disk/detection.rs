//! Introspection feeds and device naming
//!
//! The structural feed follows the layout `parted -j -l` prints and the
//! filesystem feed the one `lsblk -f -J` prints. Both arrive as already
//! captured snapshots; nothing here runs a tool.

use crate::utils::error::{DiskplanError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, warn};

/// One disk object in the structural feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralEntry {
    #[serde(default)]
    pub disk: Option<StructuralDisk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralDisk {
    /// Device path (e.g., /dev/sda)
    #[serde(default)]
    pub path: String,
    /// Total size as printed by the tool (e.g., "256GB")
    #[serde(default, deserialize_with = "string_or_number")]
    pub size: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Bus hint (e.g., "ata", "nvme", "usb")
    #[serde(default)]
    pub transport: Option<String>,
    /// Partition table kind (e.g., "gpt", "msdos", "unknown")
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "logical-sector-size")]
    pub logical_sector_size: Option<u64>,
    #[serde(default)]
    pub partitions: Vec<StructuralPartition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralPartition {
    pub number: u32,
    #[serde(default, deserialize_with = "string_or_number")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub size: Option<String>,
    #[serde(default, rename = "type")]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Filesystem-table type recorded in the partition table
    #[serde(default)]
    pub filesystem: Option<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// A node of the filesystem feed. Disks carry partitions as children, and
/// device-mapper or LVM layers may nest further.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockNode {
    pub name: String,
    #[serde(default)]
    pub fstype: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fsavail: Option<String>,
    #[serde(default, rename = "fsuse%", deserialize_with = "string_or_number")]
    pub fsuse_percent: Option<String>,
    #[serde(default)]
    pub mountpoints: Vec<Option<String>>,
    /// Single-valued form printed by older util-linux releases
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    /// Depth-first search for a node by exact name
    pub fn find<'a>(nodes: &'a [BlockNode], name: &str) -> Option<&'a BlockNode> {
        for node in nodes {
            if node.name == name {
                return Some(node);
            }
            if let Some(found) = Self::find(&node.children, name) {
                return Some(found);
            }
        }
        None
    }

    /// Mount points with the null placeholders dropped
    pub fn mount_points(&self) -> Vec<String> {
        let mut points: Vec<String> = self.mountpoints.iter().flatten().cloned().collect();
        if let Some(ref single) = self.mountpoint {
            if !points.contains(single) {
                points.push(single.clone());
            }
        }
        points
    }
}

/// The filesystem feed after top-level validation
#[derive(Debug, Clone, Default)]
pub struct FilesystemFeed {
    /// `None` when the feed lacked its top-level `blockdevices` collection
    pub blockdevices: Option<Vec<BlockNode>>,
}

impl FilesystemFeed {
    pub fn new(blockdevices: Vec<BlockNode>) -> Self {
        Self {
            blockdevices: Some(blockdevices),
        }
    }

    /// A feed with no usable top-level collection
    pub fn malformed() -> Self {
        Self { blockdevices: None }
    }

    /// Interpret an already-decoded JSON value.
    ///
    /// Never fails: anything without a decodable `blockdevices` array is
    /// treated as malformed and left for the model builder to report.
    pub fn from_value(value: serde_json::Value) -> Self {
        let Some(devices) = value.get("blockdevices") else {
            debug!("Filesystem feed has no top-level 'blockdevices' collection");
            return Self::malformed();
        };
        match serde_json::from_value::<Vec<BlockNode>>(devices.clone()) {
            Ok(nodes) => Self::new(nodes),
            Err(e) => {
                debug!("Filesystem feed 'blockdevices' could not be decoded: {}", e);
                Self::malformed()
            }
        }
    }

    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                debug!("Filesystem feed is not valid JSON: {}", e);
                Self::malformed()
            }
        }
    }
}

/// Parse a structural feed: a sequence of JSON objects with no enclosing
/// array. A single top-level array of the same objects is accepted too.
pub fn parse_structural_feed(text: &str) -> Result<Vec<StructuralDisk>> {
    let mut disks = Vec::new();
    let stream = serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>();

    for value in stream {
        let value = value.map_err(|e| {
            DiskplanError::FeedError(format!("structural feed is not valid JSON: {}", e))
        })?;
        let values = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        for value in values {
            let entry: StructuralEntry = serde_json::from_value(value)?;
            match entry.disk {
                Some(disk) if !disk.path.is_empty() => {
                    debug!(
                        "Structural feed: {} ({} partitions)",
                        disk.path,
                        disk.partitions.len()
                    );
                    disks.push(disk);
                }
                _ => warn!("Skipping structural feed entry without a disk path"),
            }
        }
    }

    Ok(disks)
}

/// Read a feed from a file path, or stdin when the path is `-`
pub fn read_feed(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Infer the device type from its path and transport hint
pub fn infer_device_type(disk_path: &str, transport: Option<&str>) -> String {
    let name = disk_path.strip_prefix("/dev/").unwrap_or(disk_path);
    if name.starts_with("sd") && name.len() > 2 && name[2..].chars().all(|c| c.is_ascii_lowercase())
    {
        return "sd".to_string();
    }
    if disk_path.contains("nvme") {
        return "nvme".to_string();
    }
    match transport.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_lowercase(),
        None => "other".to_string(),
    }
}

/// Get the partition naming prefix for a device
/// e.g., /dev/sda -> /dev/sda, /dev/nvme0n1 -> /dev/nvme0n1p
pub fn partition_prefix(device: &str) -> String {
    if device.contains("nvme") {
        format!("{}p", device)
    } else {
        device.to_string()
    }
}

/// Get partition path for a device and partition number
pub fn partition_path(device: &str, partition_num: u32) -> String {
    format!("{}{}", partition_prefix(device), partition_num)
}

/// Name the filesystem feed uses for a device path
pub fn feed_name(device_path: &str) -> &str {
    device_path.strip_prefix("/dev/").unwrap_or(device_path)
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
