// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error types for alignment QC.

Every variant carries the alignment key or insertion id it concerns, so a
failure can be reported back to the person who caused it.
*/

use ephys_align_geometry::GeometryError;
use thiserror::Error;

/// QC operation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QcError {
    /// An alignment with this key is already stored
    #[error("Alignment already exists: {key}")]
    DuplicateKey { key: String },

    /// Manual resolution or lookup named a key that is not stored
    #[error("Alignment not found: {key}")]
    UnknownKey { key: String },

    /// Key does not follow `<timestamp>_<author>`
    #[error("Invalid alignment key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Insertion has no histology picks
    #[error("No usable track for insertion {insertion_id}")]
    NoUsableTrack { insertion_id: String },

    /// Track building, projection or segmentation failed for an insertion
    #[error("Geometry error for insertion {insertion_id}: {source}")]
    Geometry {
        insertion_id: String,
        #[source]
        source: GeometryError,
    },

    /// Alignment arrays were rejected or could not be projected
    #[error("Alignment {key} is invalid: {source}")]
    InvalidAlignment {
        key: String,
        #[source]
        source: GeometryError,
    },

    /// Resolver or scorer parameter out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Persistence collaborator failed
    #[error("Repository error: {0}")]
    Repository(String),
}

impl QcError {
    /// Wrap a geometry failure with the alignment key it came from
    pub fn alignment(key: impl ToString, source: GeometryError) -> Self {
        QcError::InvalidAlignment {
            key: key.to_string(),
            source,
        }
    }

    /// Wrap a geometry failure with the insertion it came from
    pub fn geometry(insertion_id: &str, source: GeometryError) -> Self {
        QcError::Geometry {
            insertion_id: insertion_id.to_string(),
            source,
        }
    }
}

impl From<serde_json::Error> for QcError {
    fn from(err: serde_json::Error) -> Self {
        QcError::Repository(err.to_string())
    }
}

/// Result type for QC operations
pub type QcResult<T> = Result<T, QcError>;
