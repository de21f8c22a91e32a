//! Main planning orchestrator

use crate::disk::detection::{FilesystemFeed, StructuralDisk};
use crate::disk::layouts::LayoutRegistry;
use crate::disk::model::DeviceModel;
use crate::disk::partitioning::{synthesize, PlanStart};
use crate::disk::reconcile::{reconcile, SkippedDisk};
use crate::disk::usage::{resolve_usage, UsageAssignment, UsageSource};
use crate::plan::report::PlanReport;
use crate::utils::error::{DiskplanError, Result};
use tracing::{info, warn};

/// Runs one planning pass over already-captured feeds
pub struct Planner {
    registry: LayoutRegistry,
}

impl Planner {
    pub fn new(registry: LayoutRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &LayoutRegistry {
        &self.registry
    }

    /// Run the full pipeline: merge feeds, resolve usage, reconcile, plan
    pub fn run(
        &self,
        structural: &[StructuralDisk],
        filesystem: &FilesystemFeed,
        usage: &mut dyn UsageSource,
    ) -> Result<PlanReport> {
        // Phase 1: Device model
        let (model, mut warnings) = DeviceModel::build(structural, filesystem);
        if model.is_empty() {
            return Err(DiskplanError::NoDisks);
        }

        // Phase 2: Usage
        let (assignments, usage_warnings) = resolve_usage(&model, usage)?;
        warnings.extend(usage_warnings);

        // Phase 3: Reconcile and synthesize
        let mut report = self.plan_model(&model, &assignments)?;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;

        // the only place report warnings are logged
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        info!(
            "Plan ready: {} disk(s) planned, {} skipped, {} warning(s)",
            report.disks.len(),
            report.skipped.len(),
            report.warnings.len()
        );

        Ok(report)
    }

    /// Plan a model with assignments already resolved
    pub fn plan_model(
        &self,
        model: &DeviceModel,
        assignments: &[UsageAssignment],
    ) -> Result<PlanReport> {
        if model.is_empty() {
            return Err(DiskplanError::NoDisks);
        }

        let (results, skipped) = reconcile(model, &self.registry, assignments);

        let mut report = PlanReport {
            disks: Vec::with_capacity(results.len()),
            warnings: skipped.iter().map(|s| s.warning()).collect(),
            skipped,
        };

        for result in &results {
            let Some(disk) = model.disk(&result.disk) else {
                continue;
            };
            let start = match PlanStart::for_disk(disk, result.wipe) {
                Ok(start) => start,
                Err(reason) => {
                    let skipped = SkippedDisk {
                        disk: result.disk.clone(),
                        reason,
                    };
                    report.warnings.push(skipped.warning());
                    report.skipped.push(skipped);
                    continue;
                }
            };
            let plan = synthesize(result, &start);
            report.warnings.extend(plan.warnings.iter().cloned());
            report.disks.push(plan);
        }

        Ok(report)
    }
}
