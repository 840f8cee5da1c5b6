// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ephys-align-observability
//!
//! Logging setup shared by every ephys-align crate, with per-crate debug
//! flag support.
//!
//! ## Features
//! - `file-logging`: rolling JSON log files in a timestamped run folder (desktop only)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known crate names for debug flags, also used as `tracing` targets
pub const KNOWN_CRATES: &[&str] = &[
    "ephys-align",
    "ephys-align-geometry",
    "ephys-align-qc",
    "ephys-align-config",
];
