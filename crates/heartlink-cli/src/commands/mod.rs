//! Command implementations for the CLI.

mod config;
mod watch;

pub use config::cmd_config;
pub use watch::{WatchOptions, cmd_watch};
