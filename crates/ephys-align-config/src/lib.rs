// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ephys-align-config
//!
//! Loads `ephys_align.toml`, then layers `EPHYS_ALIGN_*` environment
//! variables and command-line overrides on top.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ephys_align_config::{load_config, validate_config};
//!
//! let config = load_config(None, None).expect("no ephys_align.toml found");
//! validate_config(&config).expect("configuration rejected");
//!
//! println!("Agreement threshold: {}", config.consensus.agreement_threshold);
//! ```
//!
//! Lengths are configured in micrometers.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    load_config_or_default, CONFIG_FILE_NAME, CONFIG_PATH_ENV,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No ephys_align.toml found, searched: {0}")]
    FileNotFound(String),

    #[error("Cannot read configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed TOML: {0}")]
    ParseError(String),

    #[error("Configuration rejected: {0}")]
    ValidationError(String),

    #[error("Bad override value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
