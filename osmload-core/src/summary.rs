//! Run-level counters, transport results and progress snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Counts reported by the store for one uploaded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportResult {
    /// Documents inserted.
    pub created: u64,
    /// Documents that replaced or updated an existing key.
    pub updated: u64,
    /// Documents ignored because the key already existed.
    pub ignored: u64,
    /// Empty lines the store skipped.
    pub empty: u64,
    /// Documents the store rejected.
    pub errors: u64,
}

/// Aggregate outcome of an import run.
///
/// # Examples
/// ```
/// use osmload_core::{ImportSummary, TransportResult};
///
/// let mut summary = ImportSummary::default();
/// summary.absorb(TransportResult { created: 2, ..TransportResult::default() });
/// summary.absorb(TransportResult { updated: 1, ..TransportResult::default() });
/// assert_eq!((summary.created, summary.updated), (2, 1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Non-blank input lines examined.
    pub seen: u64,
    /// Documents created by the store.
    pub created: u64,
    /// Documents updated or replaced by the store.
    pub updated: u64,
    /// Documents the store ignored.
    pub ignored: u64,
    /// Empty records the store reported.
    pub empty: u64,
    /// Documents the store rejected.
    pub errors: u64,
    /// Records dropped for an unsupported geometry type.
    pub skipped_unsupported_geometry: u64,
    /// Records dropped by the profile filter.
    pub skipped_by_profile: u64,
    /// Lines dropped for exceeding the byte limit.
    pub skipped_too_long_lines: u64,
    /// Lines dropped for invalid JSON.
    pub skipped_invalid_json_lines: u64,
    /// Geometry types of every record that reached classification.
    pub geometry_type_counts: BTreeMap<String, u64>,
    /// Unsupported geometry types kept under the `keep` policy.
    pub unsupported_geometry_type_counts: BTreeMap<String, u64>,
}

impl ImportSummary {
    /// Fold one batch result into the running totals.
    pub fn absorb(&mut self, result: TransportResult) {
        self.created += result.created;
        self.updated += result.updated;
        self.ignored += result.ignored;
        self.empty += result.empty;
        self.errors += result.errors;
    }

    /// Count a classified geometry type.
    pub fn record_geometry_type(&mut self, kind: &str) {
        bump(&mut self.geometry_type_counts, kind);
    }

    /// Count an unsupported geometry type that is kept for upload.
    pub fn record_unsupported_geometry_type(&mut self, kind: &str) {
        bump(&mut self.unsupported_geometry_type_counts, kind);
    }
}

fn bump(counts: &mut BTreeMap<String, u64>, kind: &str) {
    if let Some(count) = counts.get_mut(kind) {
        *count += 1;
    } else {
        counts.insert(kind.to_owned(), 1);
    }
}

/// Pipeline phase. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPhase {
    /// Input is being read; nothing dispatched yet.
    Reading,
    /// At least one batch has been dispatched.
    Importing,
    /// Input exhausted; waiting for outstanding uploads.
    Finalizing,
    /// All uploads settled.
    Done,
}

impl ImportPhase {
    /// Return the phase as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Importing => "importing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a run for progress reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Current phase.
    pub phase: ImportPhase,
    /// Counters at the time of the snapshot.
    #[serde(flatten)]
    pub summary: ImportSummary,
}
