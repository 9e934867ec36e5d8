//! tes-rs library
//!
//! Command definitions and output helpers behind the `tes-rs` binary.

pub mod cli;
pub mod commands;
pub mod utils;
