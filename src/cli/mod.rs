//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{CacheAction, CacheArgs, Cli, Commands, ConfigAction, ConfigArgs, ConvertArgs, LogFormat};
