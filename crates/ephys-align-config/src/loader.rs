// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{AlignConfig, ConfigError, ConfigResult};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "ephys_align.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "EPHYS_ALIGN_CONFIG_PATH";

/// Find the configuration file
///
/// Search order:
/// 1. `EPHYS_ALIGN_CONFIG_PATH` environment variable
/// 2. Current working directory: `./ephys_align.toml`
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or an
/// override value does not parse
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<AlignConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: AlignConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Load configuration, falling back to defaults when no file exists
///
/// Overrides are still applied on top of the defaults.
pub fn load_config_or_default(
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<AlignConfig> {
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) => {
            let mut config = AlignConfig::default();
            apply_environment_overrides(&mut config)?;
            if let Some(cli) = cli_args {
                apply_cli_overrides(&mut config, cli)?;
            }
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> ConfigResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", name, raw)))
}

fn parse_bool(name: &str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("{} = '{}'", name, raw))),
    }
}

/// Set one field by its override name
///
/// The same names are used for environment variables (upper-cased, with an
/// `EPHYS_ALIGN_` prefix) and CLI arguments.
fn apply_override(config: &mut AlignConfig, name: &str, value: &str) -> ConfigResult<()> {
    match name {
        "tip_clearance_um" => config.geometry.tip_clearance_um = parse_value(name, value)?,
        "sample_step_um" => config.geometry.region_sample_step_um = parse_value(name, value)?,
        "min_picks" => config.geometry.min_picks = parse_value(name, value)?,
        "agreement_threshold" => config.consensus.agreement_threshold = parse_value(name, value)?,
        "rms_scale_um" => config.consensus.rms_length_scale_um = parse_value(name, value)?,
        "supersede_same_author" => {
            config.consensus.supersede_same_author = parse_bool(name, value)?
        }
        "probe_model" => config.probe.model = value.to_string(),
        "log_level" => config.logging.level = value.to_string(),
        "log_dir" => config.logging.log_dir = PathBuf::from(value),
        _ => {}
    }
    Ok(())
}

const OVERRIDE_NAMES: &[&str] = &[
    "tip_clearance_um",
    "sample_step_um",
    "min_picks",
    "agreement_threshold",
    "rms_scale_um",
    "supersede_same_author",
    "probe_model",
    "log_level",
    "log_dir",
];

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `EPHYS_ALIGN_TIP_CLEARANCE_UM` -> `geometry.tip_clearance_um`
/// - `EPHYS_ALIGN_SAMPLE_STEP_UM` -> `geometry.region_sample_step_um`
/// - `EPHYS_ALIGN_MIN_PICKS` -> `geometry.min_picks`
/// - `EPHYS_ALIGN_AGREEMENT_THRESHOLD` -> `consensus.agreement_threshold`
/// - `EPHYS_ALIGN_RMS_SCALE_UM` -> `consensus.rms_length_scale_um`
/// - `EPHYS_ALIGN_SUPERSEDE_SAME_AUTHOR` -> `consensus.supersede_same_author`
/// - `EPHYS_ALIGN_PROBE_MODEL` -> `probe.model`
/// - `EPHYS_ALIGN_LOG_LEVEL` -> `logging.level`
/// - `EPHYS_ALIGN_LOG_DIR` -> `logging.log_dir`
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` naming the first variable that does not parse
pub fn apply_environment_overrides(config: &mut AlignConfig) -> ConfigResult<()> {
    for name in OVERRIDE_NAMES {
        let var = format!("EPHYS_ALIGN_{}", name.to_uppercase());
        if let Ok(value) = env::var(&var) {
            apply_override(config, name, &value)
                .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", var, value)))?;
        }
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"agreement_threshold": "0.9"}`)
///
/// Unknown names are ignored.
pub fn apply_cli_overrides(
    config: &mut AlignConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for name in OVERRIDE_NAMES {
        if let Some(value) = cli_args.get(*name) {
            apply_override(config, name, value)?;
        }
    }
    Ok(())
}
