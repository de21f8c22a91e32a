//! Diskplan library - partition reconciliation and planning
//!
//! Merges `parted` and `lsblk` output into one device model, compares each
//! selected disk with the desired layout for its role, and emits an ordered
//! plan of partitioning, formatting and mount steps. Nothing is executed.

pub mod config;
pub mod disk;
pub mod plan;
pub mod utils;

pub use config::LayoutConfig;
pub use plan::{PlanReport, Planner};
pub use utils::error::DiskplanError;
