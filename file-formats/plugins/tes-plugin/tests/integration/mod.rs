//! Integration tests

mod merge;
mod selective;
