//! Facade crate for the osmload streaming importer.
//!
//! This crate re-exports the core domain types and, behind the `data`
//! feature, the I/O adapters that drive an import run.

#![forbid(unsafe_code)]

pub use osmload_core::{
    Batch, DocumentChunker, FeatureDocument, Geometry, ImportPhase, ImportSummary,
    InvalidJsonPolicy, OnDuplicate, Profile, ProgressSnapshot, TooLongLinePolicy,
    TransportResult, UnsupportedGeometryPolicy,
};

#[cfg(feature = "data")]
pub use osmload_data::{
    ImportConfig, ImportError, ImportOrchestrator, LineReader, LineReaderOptions, ProgressSink,
    transport::{ApiError, StoreEndpoint, TransportKind, UploadTransport, build_transport},
};
