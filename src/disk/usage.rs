//! Disk usage roles and assignment
//!
//! Which disk serves which role is decided outside the planner, either from
//! `[[disks]]` entries in the layout file or by asking the operator. This
//! module only turns those decisions into exactly one assignment per
//! discovered disk.

use crate::disk::model::{DeviceModel, Disk};
use crate::disk::warnings::PlanWarning;
use crate::utils::error::Result;
use crate::utils::prompt::{prompt_confirm, prompt_input, prompt_select};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

static CUSTOM_ROLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

/// Usage class binding desired partitions to a disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    System,
    Home,
    /// Selected but not bound to any built-in layout
    #[default]
    None,
    Custom(String),
}

impl Role {
    /// Parse a role name. Built-ins match case-insensitively; anything else
    /// must be a plain `[A-Za-z0-9_-]+` word and is kept lowercased.
    pub fn parse(input: &str) -> Option<Role> {
        let value = input.trim().to_lowercase();
        match value.as_str() {
            "system" => Some(Role::System),
            "home" => Some(Role::Home),
            "none" => Some(Role::None),
            _ if CUSTOM_ROLE_RE.is_match(&value) => Some(Role::Custom(value)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Home => "home",
            Self::None => "none",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Role::parse(&value).ok_or_else(|| format!("invalid role '{}'", value))
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A raw decision for one disk, as written in the layout file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskDecision {
    /// Device path (e.g., /dev/sda)
    pub path: String,
    #[serde(default = "default_true")]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Start from a fresh partition table
    #[serde(default)]
    pub wipe: bool,
}

fn default_true() -> bool {
    true
}

/// Resolved usage for one disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageAssignment {
    pub disk: String,
    pub selected: bool,
    pub role: Role,
    pub wipe: bool,
}

impl UsageAssignment {
    pub fn not_selected(disk: &str) -> Self {
        Self {
            disk: disk.to_string(),
            selected: false,
            role: Role::None,
            wipe: false,
        }
    }

    /// Turn a raw decision into an assignment. Invalid or missing roles on a
    /// selected disk fall back to `none` with a warning.
    pub fn from_decision(decision: &DiskDecision, warnings: &mut Vec<PlanWarning>) -> Self {
        if !decision.selected {
            return Self::not_selected(&decision.path);
        }

        let raw = decision.role.as_deref().unwrap_or("");
        let role = match Role::parse(raw) {
            Some(role) => role,
            None => {
                debug!("{}: invalid role '{}', using 'none'", decision.path, raw);
                warnings.push(PlanWarning::InvalidRole {
                    disk: decision.path.clone(),
                    value: raw.to_string(),
                });
                Role::None
            }
        };

        Self {
            disk: decision.path.clone(),
            selected: true,
            role,
            wipe: decision.wipe,
        }
    }
}

/// Where usage decisions come from
pub trait UsageSource {
    /// Decision for one discovered disk, `None` if the source has none
    fn decide(&mut self, disk: &Disk) -> Result<Option<DiskDecision>>;

    /// Problems noticed once every disk has been asked about
    fn finish(&mut self, _known: &[String]) -> Vec<PlanWarning> {
        Vec::new()
    }
}

/// Decisions supplied up front in the layout file
pub struct ConfiguredUsage {
    decisions: Vec<DiskDecision>,
}

impl ConfiguredUsage {
    pub fn new(decisions: Vec<DiskDecision>) -> Self {
        Self { decisions }
    }
}

impl UsageSource for ConfiguredUsage {
    fn decide(&mut self, disk: &Disk) -> Result<Option<DiskDecision>> {
        Ok(self.decisions.iter().find(|d| d.path == disk.path).cloned())
    }

    fn finish(&mut self, known: &[String]) -> Vec<PlanWarning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for decision in &self.decisions {
            if !known.contains(&decision.path) {
                warnings.push(PlanWarning::UnknownDisk {
                    disk: decision.path.clone(),
                });
            } else if !seen.insert(decision.path.as_str()) {
                warnings.push(PlanWarning::DuplicateDecision {
                    disk: decision.path.clone(),
                });
            }
        }
        warnings
    }
}

/// Ask the operator about every disk
pub struct PromptedUsage;

impl UsageSource for PromptedUsage {
    fn decide(&mut self, disk: &Disk) -> Result<Option<DiskDecision>> {
        println!(
            "\nDiscovered drive: {} ({}, {}, {})",
            disk.path,
            disk.device_type,
            disk.size_human(),
            disk.model.as_deref().unwrap_or("-")
        );

        if !prompt_confirm("Use this device for partitioning?", false)? {
            return Ok(Some(DiskDecision {
                path: disk.path.clone(),
                selected: false,
                role: None,
                wipe: false,
            }));
        }

        let choices = [
            "system",
            "home",
            "none   (create partitions, no role layout)",
            "custom (e.g. store, var, opt)",
        ];
        let role = match prompt_select("How do you want to use this drive?", &choices, 0)? {
            0 => "system".to_string(),
            1 => "home".to_string(),
            2 => "none".to_string(),
            _ => {
                let custom = prompt_input("Custom role", None)?;
                if custom.trim().is_empty() {
                    "custom".to_string()
                } else {
                    custom
                }
            }
        };

        let wipe = if disk.partitions.is_empty() {
            false
        } else {
            prompt_confirm("Wipe the existing partition table?", false)?
        };

        Ok(Some(DiskDecision {
            path: disk.path.clone(),
            selected: true,
            role: Some(role),
            wipe,
        }))
    }
}

/// Produce exactly one assignment per disk in the model
pub fn resolve_usage(
    model: &DeviceModel,
    source: &mut dyn UsageSource,
) -> Result<(Vec<UsageAssignment>, Vec<PlanWarning>)> {
    let mut warnings = Vec::new();
    let mut assignments = Vec::with_capacity(model.disks.len());

    for disk in &model.disks {
        let assignment = match source.decide(disk)? {
            Some(decision) => UsageAssignment::from_decision(&decision, &mut warnings),
            None => {
                warnings.push(PlanWarning::NoUsageDecision {
                    disk: disk.path.clone(),
                });
                UsageAssignment::not_selected(&disk.path)
            }
        };
        info!(
            "{}: {}",
            assignment.disk,
            if assignment.selected {
                format!("role '{}'{}", assignment.role, if assignment.wipe { ", wipe" } else { "" })
            } else {
                "not selected".to_string()
            }
        );
        assignments.push(assignment);
    }

    warnings.extend(source.finish(&model.disk_paths()));
    Ok((assignments, warnings))
}
