//! Planning pipeline and its report

pub mod planner;
pub mod report;

pub use planner::Planner;
pub use report::PlanReport;
