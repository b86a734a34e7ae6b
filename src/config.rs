//! Run configuration and input files.

pub mod hosts;
pub mod persistence;
pub mod types;
