//! End-to-end scenarios

mod patch;
