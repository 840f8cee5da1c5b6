// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Alignment QC

Stores the competing depth alignments contributed for one probe insertion
and reconciles them into a single trusted alignment with a QC verdict.

## Architecture

```text
┌─────────────────────────────────────────────────────────────────┐
│              CALLERS                                             │
│  Interactive alignment UI, QC batch jobs                        │
└────────────────────────────┬────────────────────────────────────┘
                             ↓
┌─────────────────────────────────────────────────────────────────┐
│              InsertionSession (this crate)                       │
│  • AlignmentStore     - alignments keyed "<timestamp>_<author>" │
│  • ConsensusResolver  - latest-two agreement, sticky resolution │
│  • QcRecord           - persisted verdict shape                 │
└────────────────────────────┬────────────────────────────────────┘
                             ↓
┌─────────────────────────────────────────────────────────────────┐
│              COLLABORATORS                                       │
│  InsertionRepository (lab data store), BrainSurface, Atlas      │
└─────────────────────────────────────────────────────────────────┘
```

## QC States

- `NOT_SET`: fewer than two alignments
- `WARNING`: the two most recent alignments disagree
- `PASS`: the two most recent alignments agree, or a user resolved manually
- `CRITICAL`: no usable track could be built for the insertion

Once an insertion is resolved it stays resolved.
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod key;
pub mod repository;
pub mod resolver;
pub mod scoring;
pub mod session;
pub mod store;
pub mod types;
pub mod verdict;

pub use key::AlignmentKey;
pub use repository::{InMemoryRepository, InsertionRepository};
pub use resolver::ConsensusResolver;
pub use scoring::{AgreementScorer, DEFAULT_AGREEMENT_THRESHOLD, DEFAULT_RMS_LENGTH_SCALE_M};
pub use session::{register_track, InsertionSession, SessionConfig};
pub use store::AlignmentStore;
pub use types::*;
pub use verdict::{QcState, Resolution, Verdict};
