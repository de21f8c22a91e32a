//! Disk discovery, layout and planning modules

pub mod detection;
pub mod formatting;
pub mod layouts;
pub mod model;
pub mod partitioning;
pub mod reconcile;
pub mod usage;
pub mod warnings;
