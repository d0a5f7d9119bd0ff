//! # Gateway Runtime Library
//!
//! Environment handling for the gateway binary, exposed for testing.
//! The main entry point is the `main.rs` binary.

pub mod env_config;

pub use env_config::{load_config, EnvError};
