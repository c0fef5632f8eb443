//! Core domain types for the osmload importer.
//!
//! Responsibilities:
//! - Model feature documents, geometry classification and import policies.
//! - Batch documents under a byte budget ([`DocumentChunker`]).
//! - Aggregate per-run counters ([`ImportSummary`]).
//! - Normalise converter output into documents and filter them by profile.
//!
//! Boundaries:
//! - No I/O. Readers, transports and subprocesses live in `osmload-data`.
//!
//! Invariants:
//! - `tagsKeys` and `tagsKV` are always derived from `tags`.
//! - Summary folding is commutative, so completion order never matters.
#![forbid(unsafe_code)]

pub mod chunker;
pub mod document;
pub mod geometry;
pub mod normalize;
pub mod policy;
pub mod profile;
pub mod summary;

pub use chunker::{Batch, DocumentChunker, estimate_wire_size};
pub use document::{ElementAttributes, FeatureDocument, Geometry, MAX_KEY_BYTES, Tags, sanitize_key};
pub use geometry::{SUPPORTED_GEOMETRY_TYPES, is_supported_geometry_type};
pub use normalize::{NormalizeError, normalize_feature};
pub use policy::{
    InvalidJsonPolicy, OnDuplicate, TooLongLinePolicy, UnknownPolicyError,
    UnsupportedGeometryPolicy,
};
pub use profile::{BuiltinProfiles, Profile, ProfileFilter};
pub use summary::{ImportPhase, ImportSummary, ProgressSnapshot, TransportResult};
