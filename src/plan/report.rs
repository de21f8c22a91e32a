//! Planning outcome

use crate::disk::partitioning::DiskPlan;
use crate::disk::reconcile::SkippedDisk;
use crate::disk::warnings::PlanWarning;
use crate::utils::command::{log_dry_run, render_actions};
use crate::utils::error::Result;
use serde::Serialize;

/// Everything one planning pass produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// Per-disk action lists, in model order
    pub disks: Vec<DiskPlan>,
    pub skipped: Vec<SkippedDisk>,
    pub warnings: Vec<PlanWarning>,
}

impl PlanReport {
    pub fn disk(&self, path: &str) -> Option<&DiskPlan> {
        self.disks.iter().find(|d| d.disk == path)
    }

    /// True when no disk needs any change
    pub fn is_empty(&self) -> bool {
        self.disks.iter().all(DiskPlan::is_empty)
    }

    pub fn total_actions(&self) -> usize {
        self.disks.iter().map(|d| d.actions.len()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Print the plan as the commands an executor would run
    pub fn print(&self, target_root: &str) {
        for plan in &self.disks {
            println!("\n{} (role: {})", plan.disk, plan.role);
            if !plan.satisfied.is_empty() {
                println!("  already present: {}", plan.satisfied.join(", "));
            }
            if plan.is_empty() {
                println!("  nothing to do");
                continue;
            }
            for command in render_actions(&plan.actions, target_root) {
                log_dry_run(&command);
            }
        }

        if !self.skipped.is_empty() {
            println!("\nSkipped:");
            for skipped in &self.skipped {
                println!("  {:<15} {}", skipped.disk, skipped.reason);
            }
        }

        if !self.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &self.warnings {
                println!("  ! {}", warning);
            }
        }

        println!(
            "\n{} action(s) across {} disk(s)",
            self.total_actions(),
            self.disks.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::partitioning::{PartitionAction, PartitionEnd};
    use crate::disk::reconcile::SkipReason;
    use crate::disk::usage::Role;

    fn report() -> PlanReport {
        PlanReport {
            disks: vec![
                DiskPlan {
                    disk: "/dev/sda".to_string(),
                    role: Role::System,
                    satisfied: Vec::new(),
                    actions: vec![
                        PartitionAction::CreateTable {
                            disk: "/dev/sda".to_string(),
                            table: "gpt".to_string(),
                        },
                        PartitionAction::CreatePartition {
                            disk: "/dev/sda".to_string(),
                            table: "gpt".to_string(),
                            number: 1,
                            label: "root".to_string(),
                            table_type: "ext4".to_string(),
                            start_mib: 1,
                            end: PartitionEnd::Remainder,
                        },
                    ],
                    warnings: Vec::new(),
                },
                DiskPlan {
                    disk: "/dev/nvme0n1".to_string(),
                    role: Role::Home,
                    satisfied: vec!["home".to_string()],
                    actions: Vec::new(),
                    warnings: Vec::new(),
                },
            ],
            skipped: vec![SkippedDisk {
                disk: "/dev/sdb".to_string(),
                reason: SkipReason::NotSelected,
            }],
            warnings: vec![PlanWarning::NoUsageDecision {
                disk: "/dev/sdb".to_string(),
            }],
        }
    }

    #[test]
    fn lookup_and_counts() {
        let report = report();
        assert_eq!(report.total_actions(), 2);
        assert!(!report.is_empty());
        assert!(report.disk("/dev/nvme0n1").unwrap().is_empty());
        assert!(report.disk("/dev/sdc").is_none());
        assert!(PlanReport::default().is_empty());
    }

    #[test]
    fn json_shape() {
        let value: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        let actions = &value["disks"][0]["actions"];
        assert_eq!(actions[0]["action"], "create_table");
        assert_eq!(actions[1]["action"], "create_partition");
        assert_eq!(actions[1]["end"], "remainder");
        assert_eq!(value["disks"][0]["role"], "system");
        assert_eq!(value["skipped"][0]["reason"], "not_selected");
        assert_eq!(value["warnings"][0]["kind"], "no_usage_decision");
    }
}
