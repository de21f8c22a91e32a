//! Utility modules

pub mod command;
pub mod error;
pub mod prompt;
pub mod units;
