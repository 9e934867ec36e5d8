//! Command implementations

pub mod plugin;
