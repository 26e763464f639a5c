//! Layered configuration: command-line flags over an optional TOML file over
//! built-in defaults.

mod builder;
mod defaults;
mod file;

pub use builder::build_config;
