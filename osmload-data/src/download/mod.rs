//! Fetch OpenStreetMap extracts from a download mirror.
//!
//! Extracts live at `{mirror}/{region}-latest.osm.pbf`, where `region` is a
//! slash-separated path such as `europe/germany/berlin`. The archive is
//! streamed to disk without buffering it in memory.

mod error;
mod ops;
mod source;

pub use error::{DownloadError, TransportError};
pub use ops::{DownloadReport, download_extract, extract_file_name, extract_url};
pub use source::{
    DEFAULT_MIRROR, DEFAULT_USER_AGENT, ExtractSink, ExtractSource, HttpExtractSource, Transfer,
};
