//! Error types produced by the extract downloader.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors produced while downloading an extract.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DownloadError {
    /// The region did not name an extract.
    #[error("invalid region '{region}': expected a path such as europe/germany/berlin")]
    InvalidRegion {
        /// Rejected region.
        region: String,
    },
    /// The mirror and region did not produce a valid URL.
    #[error("invalid extract URL for mirror {mirror}: {source}")]
    InvalidUrl {
        /// Configured mirror.
        mirror: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// Preparing the output directory failed.
    #[error("failed to create output directory {path:?}: {source}")]
    CreateDir {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
        /// Directory that could not be created.
        path: PathBuf,
    },
    /// Opening or flushing the output file failed.
    #[error("failed to write extract to {path:?}: {source}")]
    WriteFile {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
        /// Target file.
        path: PathBuf,
    },
    /// The extract could not be fetched.
    #[error("failed to download extract: {source}")]
    Download {
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// Fewer or more bytes arrived than the server announced.
    #[error("downloaded size {actual} did not match announced size {expected}")]
    SizeMismatch {
        /// `content-length` reported by the server.
        expected: u64,
        /// Bytes written to disk.
        actual: u64,
    },
}

/// Transport-level errors encountered while issuing HTTP requests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description supplied by the server.
        message: String,
    },
    /// The request failed due to an I/O error.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
}
