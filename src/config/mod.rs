//! Configuration modules

pub mod layout;

pub use layout::LayoutConfig;
