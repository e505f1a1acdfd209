// src/config/mod.rs

//! Configuration loading and validation for chainsvc.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into a typed [`ConfigFile`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config, default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConnectorConfig, ConnectorSection, PathsSection, RawConfigFile, RpcConfig,
    RpcSection, ShutdownSection,
};
pub use validate::parse_duration;
