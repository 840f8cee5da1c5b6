// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
QC verdicts.

A [`Resolution`] keeps the automatic verdict and an optional user verdict
side by side. The user verdict only exists after a manual resolution and
takes precedence when reporting, but the automatic one is never rewritten
by it, so both stay auditable.
*/

use serde::{Deserialize, Serialize};

use crate::key::AlignmentKey;

/// Insertion-level QC state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcState {
    /// Fewer than two alignments
    #[default]
    NotSet,
    /// Latest two alignments disagree
    Warning,
    /// Latest two alignments agree, or resolved manually
    Pass,
    /// No usable track
    Critical,
}

impl QcState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcState::NotSet => "NOT_SET",
            QcState::Warning => "WARNING",
            QcState::Pass => "PASS",
            QcState::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for QcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one resolution pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub qc: QcState,
    pub alignment_count: usize,
    /// Alignment the insertion should currently be read with
    pub stored_key: Option<AlignmentKey>,
    pub resolved: bool,
    /// Agreement of the latest two alignments, when there were two
    pub agreement_score: Option<f64>,
    /// Key chosen by hand, set only on user verdicts
    pub manual_override_key: Option<AlignmentKey>,
}

impl Verdict {
    /// Verdict for an insertion with fewer than two alignments
    pub fn not_set(alignment_count: usize, stored_key: Option<AlignmentKey>) -> Self {
        Self {
            qc: QcState::NotSet,
            alignment_count,
            stored_key,
            resolved: false,
            agreement_score: None,
            manual_override_key: None,
        }
    }
}

/// Automatic verdict plus the optional manual override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub automatic: Verdict,
    pub user: Option<Verdict>,
}

impl Resolution {
    pub fn automatic(verdict: Verdict) -> Self {
        Self {
            automatic: verdict,
            user: None,
        }
    }

    /// The verdict to report: user when present, else automatic
    pub fn effective(&self) -> &Verdict {
        self.user.as_ref().unwrap_or(&self.automatic)
    }

    pub fn is_resolved(&self) -> bool {
        self.effective().resolved
    }

    pub fn is_manual(&self) -> bool {
        self.user.is_some()
    }
}
