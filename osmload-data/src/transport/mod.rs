//! Interchangeable mechanisms for sending one batch to the store.
//!
//! Every transport speaks the same bulk import contract:
//!
//! ```text
//! POST {base}/_db/{database}/_api/import?collection={c}&type=documents[&onDuplicate={mode}]
//! authorization: Basic base64(user:pass)
//! accept: application/json
//! content-type: application/x-ldjson
//! content-length: {exact body length}
//! ```
//!
//! with one JSON document per line as the body. They differ only in how the
//! request leaves the process: through [`StoreClient`](crate::client::StoreClient)
//! ([`DriverTransport`]), a hand-assembled `reqwest` request
//! ([`RawHttpTransport`]) or a `curl` child process ([`CurlTransport`]).

mod curl;
mod driver;
mod endpoint;
mod error;
mod raw;
mod wire;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use osmload_core::{FeatureDocument, OnDuplicate, TransportResult, UnknownPolicyError};

use crate::client::{ClientError, StoreClientConfig};

pub use curl::{CurlTransport, CurlTransportConfig, DEFAULT_CURL_PROGRAM};
pub use driver::DriverTransport;
pub use endpoint::{DEFAULT_BASE_URL, DEFAULT_DATABASE, DEFAULT_USERNAME, StoreEndpoint};
pub use error::ApiError;
pub use raw::RawHttpTransport;
pub use wire::{JSON_ACCEPT, LDJSON_CONTENT_TYPE, encode_ldjson};
pub(crate) use wire::{import_headers, parse_import_response};

/// Per-call options shared by every transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Duplicate-key mode; the store default applies when `None`.
    pub on_duplicate: Option<OnDuplicate>,
}

/// Sends one batch and reports the store's counts.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Upload `documents` into `collection`.
    ///
    /// # Errors
    /// Any failure to obtain a 2xx import response is an [`ApiError`].
    async fn upload_batch(
        &self,
        collection: &str,
        documents: &[FeatureDocument],
        options: &UploadOptions,
    ) -> Result<TransportResult, ApiError>;
}

/// Which transport a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// [`DriverTransport`].
    #[default]
    Driver,
    /// [`RawHttpTransport`].
    Raw,
    /// [`CurlTransport`].
    Curl,
}

impl TransportKind {
    /// Every kind, in display order.
    pub const ALL: [Self; 3] = [Self::Driver, Self::Raw, Self::Curl];

    /// Return the kind as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Raw => "raw",
            Self::Curl => "curl",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = UnknownPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPolicyError {
                kind: "transport",
                value: s.to_owned(),
                expected: "driver raw curl",
            })
    }
}

/// Build the transport selected for a run.
///
/// # Errors
/// Returns [`ClientError::Build`] when an HTTP client cannot be built.
///
/// # Examples
/// ```
/// use osmload_data::client::StoreClientConfig;
/// use osmload_data::transport::{CurlTransportConfig, TransportKind, build_transport};
///
/// let transport = build_transport(
///     TransportKind::Raw,
///     &StoreClientConfig::default(),
///     &CurlTransportConfig::default(),
/// )?;
/// # drop(transport);
/// # Ok::<(), osmload_data::client::ClientError>(())
/// ```
pub fn build_transport(
    kind: TransportKind,
    client: &StoreClientConfig,
    curl: &CurlTransportConfig,
) -> Result<Arc<dyn UploadTransport>, ClientError> {
    Ok(match kind {
        TransportKind::Driver => Arc::new(DriverTransport::with_config(client.clone())?),
        TransportKind::Raw => Arc::new(RawHttpTransport::with_config(client)?),
        TransportKind::Curl => Arc::new(CurlTransport::new(client.endpoint.clone(), curl.clone())),
    })
}
