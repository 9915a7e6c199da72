//! # credstore-core
//!
//! Core types, configuration, and utilities for credstore.
//!
//! This crate provides shared functionality used across the credstore crates:
//!
//! - **Configuration**: Loading, validation, and persistence of the config file
//! - **Secrets**: [`SecretString`], a zeroize-on-drop string that never prints
//! - **Utilities**: Path resolution and environment handling

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use secret::SecretString;
