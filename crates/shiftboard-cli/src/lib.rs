//! CLI, configuration and source wiring
//!
//! This crate provides the `shiftboard` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
