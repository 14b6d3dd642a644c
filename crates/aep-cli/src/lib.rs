pub mod cli;
pub mod config;
pub mod manifest;

pub use cli::{Cli, Commands, ConfigCommands};
