//! Shared utilities for the tes-rs CLI

pub mod format;
pub mod progress;

pub use format::*;
pub use progress::*;
