//! The single run-level error.

use std::io;
use std::path::PathBuf;

use osmload_core::{ImportSummary, NormalizeError};
use thiserror::Error;

use crate::convert::ConversionError;
use crate::lines::LineReadError;
use crate::transport::ApiError;

/// Why an import run failed.
///
/// A run returns either a complete summary or exactly one of these. No
/// variant reports partial progress except [`ImportError::RejectedDocuments`],
/// whose summary is for diagnostics only.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The input file could not be opened.
    #[error("failed to open input {path:?}: {source}")]
    Open {
        /// Input path.
        path: PathBuf,
        /// I/O error.
        #[source]
        source: io::Error,
    },
    /// Reading lines failed.
    #[error(transparent)]
    Read(#[from] LineReadError),
    /// A line was not valid JSON under the `error` policy.
    #[error("line {line} is not valid JSON ({source}): `{excerpt}`")]
    InvalidJson {
        /// 1-based line number.
        line: u64,
        /// Start of the offending payload.
        excerpt: String,
        /// Parser error.
        #[source]
        source: simd_json::Error,
    },
    /// A record could not be turned into a document.
    #[error("line {line} could not be normalised: {source}")]
    Normalize {
        /// 1-based line number.
        line: u64,
        /// Normaliser error.
        #[source]
        source: NormalizeError,
    },
    /// An unsupported geometry type was found under the `error` policy.
    #[error("line {line} has unsupported geometry type {geometry_type}")]
    UnsupportedGeometry {
        /// 1-based line number.
        line: u64,
        /// Offending type.
        geometry_type: String,
    },
    /// A batch upload failed.
    #[error("batch {batch} failed to upload: {source}")]
    Transport {
        /// 1-based batch number in dispatch order.
        batch: u64,
        /// Transport error.
        #[source]
        source: ApiError,
    },
    /// An upload task ended without producing a result.
    #[error("an upload task did not complete: {source}")]
    UploadTask {
        /// Join failure.
        #[source]
        source: tokio::task::JoinError,
    },
    /// The store rejected documents inside otherwise successful calls.
    #[error("the store rejected {errors} document(s) (created {}, updated {}, ignored {})", .summary.created, .summary.updated, .summary.ignored)]
    RejectedDocuments {
        /// Total rejected documents.
        errors: u64,
        /// Counters at the end of the run.
        summary: Box<ImportSummary>,
    },
    /// The converter feeding the run failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
