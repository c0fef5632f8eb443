//! I/O adapters and the streaming import pipeline.
//!
//! Responsibilities:
//! - Split byte streams into bounded lines ([`lines`]).
//! - Drive imports from lines to uploaded batches ([`import`]).
//! - Upload batches through interchangeable transports ([`transport`]).
//! - Talk to the store's HTTP API ([`client`], [`bootstrap`]).
//! - Run the extract converter and fetch extracts ([`convert`], [`download`]).
//!
//! Boundaries:
//! - Do not encode domain rules (live in `osmload-core`).
//! - Keep blocking I/O off async executors; every adapter is async.
//!
//! Invariants:
//! - Documents reach the store in input order within and across batches.
//! - No global mutable state.

#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod client;
pub mod convert;
pub mod download;
pub mod import;
pub mod lines;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

pub use bootstrap::{BootstrapError, bootstrap};
pub use client::{ClientError, StoreClient, StoreClientConfig};
pub use convert::{ConversionCommand, ConversionError};
pub use download::{DownloadError, DownloadReport, HttpExtractSource, download_extract};
pub use import::{ImportConfig, ImportError, ImportOrchestrator, ImportSource, ProgressSink};
pub use lines::{LineReadError, LineReader, LineReaderOptions};
