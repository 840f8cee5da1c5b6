// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error and persisted-record types shared across the QC crate.
*/

pub mod errors;
pub mod records;

pub use errors::{QcError, QcResult};
pub use records::{ExtendedQc, QcRecord, TrajectoryRecord};
