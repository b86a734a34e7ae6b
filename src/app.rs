//! Application shell: CLI and logging.

pub mod cli;
pub mod logging;
