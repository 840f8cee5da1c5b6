// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Consensus resolution.

Only the two most recent alignments are compared. Both project the probe's
reference channels onto the track and the [`AgreementScorer`] decides:

| Alignments | Agreement          | Automatic verdict                |
|------------|--------------------|----------------------------------|
| 0 or 1     | n/a                | `NOT_SET`                        |
| ≥ 2        | score ≥ threshold  | `PASS`, resolved, newest stored  |
| ≥ 2        | score < threshold  | `WARNING`, newest stored         |

A previously resolved insertion stays resolved: a later disagreement keeps
the earlier `PASS` and stored key and only updates the alignment count.
Manual resolution records a separate user verdict on top.
*/

use ephys_align_geometry::{ChannelProjector, DepthWarp, Track};
use tracing::{debug, info};

use crate::key::AlignmentKey;
use crate::scoring::{AgreementScorer, DEFAULT_AGREEMENT_THRESHOLD};
use crate::store::AlignmentStore;
use crate::types::{QcError, QcResult};
use crate::verdict::{QcState, Resolution, Verdict};

#[derive(Debug, Clone)]
pub struct ConsensusResolver {
    projector: ChannelProjector,
    scorer: AgreementScorer,
    threshold: f64,
}

impl Default for ConsensusResolver {
    fn default() -> Self {
        Self {
            projector: ChannelProjector::default(),
            scorer: AgreementScorer::default(),
            threshold: DEFAULT_AGREEMENT_THRESHOLD,
        }
    }
}

impl ConsensusResolver {
    pub fn new(
        projector: ChannelProjector,
        scorer: AgreementScorer,
        threshold: f64,
    ) -> QcResult<Self> {
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(QcError::InvalidParameter(format!(
                "agreement threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        Ok(Self {
            projector,
            scorer,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn scorer(&self) -> &AgreementScorer {
        &self.scorer
    }

    pub fn projector(&self) -> &ChannelProjector {
        &self.projector
    }

    /// Agreement between two stored alignments on `track`
    pub fn score_pair(
        &self,
        track: &Track,
        (key_a, warp_a): (&AlignmentKey, &DepthWarp),
        (key_b, warp_b): (&AlignmentKey, &DepthWarp),
    ) -> QcResult<f64> {
        let a = self
            .projector
            .project(track, warp_a, None)
            .map_err(|e| QcError::alignment(key_a, e))?;
        let b = self
            .projector
            .project(track, warp_b, None)
            .map_err(|e| QcError::alignment(key_b, e))?;
        self.scorer.score(&a, &b)
    }

    /// Recompute the verdict for `store`
    ///
    /// `prior` is the last recorded resolution for the same insertion. A
    /// resolved prior keeps the automatic verdict resolved, and a prior
    /// user verdict is carried forward with the new alignment count.
    ///
    /// # Errors
    ///
    /// Returns `QcError::InvalidAlignment` if one of the two latest
    /// alignments cannot be projected onto the track.
    pub fn resolve(
        &self,
        track: &Track,
        store: &AlignmentStore,
        prior: Option<&Resolution>,
    ) -> QcResult<Resolution> {
        let count = store.len();
        let latest = store.latest_two();

        let fresh = match latest.as_slice() {
            [newest, previous] => {
                let score = self.score_pair(track, *newest, *previous)?;
                let agree = score >= self.threshold;
                debug!(
                    target: "ephys-align-qc",
                    "Agreement {} vs {}: {:.3} (threshold {:.2})",
                    newest.0,
                    previous.0,
                    score,
                    self.threshold
                );
                Verdict {
                    qc: if agree { QcState::Pass } else { QcState::Warning },
                    alignment_count: count,
                    stored_key: Some(newest.0.clone()),
                    resolved: agree,
                    agreement_score: Some(score),
                    manual_override_key: None,
                }
            }
            _ => Verdict::not_set(count, latest.first().map(|(k, _)| (*k).clone())),
        };

        let automatic = match prior.map(|p| &p.automatic) {
            Some(previous) if previous.resolved && !fresh.resolved => {
                debug!(
                    target: "ephys-align-qc",
                    "Keeping earlier resolution on {:?}",
                    previous.stored_key.as_ref().map(|k| k.as_str())
                );
                Verdict {
                    alignment_count: count,
                    ..previous.clone()
                }
            }
            _ => fresh,
        };

        let user = prior.and_then(|p| p.user.clone()).map(|u| Verdict {
            alignment_count: count,
            ..u
        });

        Ok(Resolution { automatic, user })
    }

    /// Record a user's choice of alignment
    ///
    /// The automatic verdict is taken from `prior` unchanged, or computed
    /// when there is none.
    ///
    /// # Errors
    ///
    /// Returns `QcError::UnknownKey` when `key` is not stored.
    pub fn resolve_manual(
        &self,
        track: &Track,
        store: &AlignmentStore,
        prior: Option<&Resolution>,
        key: &AlignmentKey,
    ) -> QcResult<Resolution> {
        if !store.contains(key) {
            return Err(QcError::UnknownKey {
                key: key.to_string(),
            });
        }

        let automatic = match prior {
            Some(p) => p.automatic.clone(),
            None => self.resolve(track, store, None)?.automatic,
        };

        info!(target: "ephys-align-qc", "Alignment {} resolved manually", key);
        let user = Verdict {
            qc: QcState::Pass,
            alignment_count: store.len(),
            stored_key: Some(key.clone()),
            resolved: true,
            agreement_score: automatic.agreement_score,
            manual_override_key: Some(key.clone()),
        };
        Ok(Resolution {
            automatic,
            user: Some(user),
        })
    }
}
