use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use tokio::io::AsyncWrite;
use tokio_util::io::StreamReader;

use super::TransportError;
use crate::client::ClientError;

/// Default user agent for extract downloads.
pub const DEFAULT_USER_AGENT: &str = "osmload-download/0.1";

/// Mirror used when none is configured.
pub const DEFAULT_MIRROR: &str = "https://download.geofabrik.de";

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Destination the archive bytes are streamed into.
pub type ExtractSink<'a> = dyn AsyncWrite + Send + Unpin + 'a;

/// Outcome of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes copied into the sink.
    pub bytes_written: u64,
    /// Length the server announced, when it did.
    pub expected_bytes: Option<u64>,
}

/// Somewhere extracts can be fetched from.
#[async_trait]
pub trait ExtractSource: Send + Sync {
    /// Mirror root, without a trailing slash.
    fn mirror(&self) -> &str;
    /// Stream the archive at `url` into `sink`.
    async fn fetch_extract(
        &self,
        url: &str,
        sink: &mut ExtractSink<'_>,
    ) -> Result<Transfer, TransportError>;
}

/// HTTP implementation of [`ExtractSource`].
#[derive(Debug, Clone)]
pub struct HttpExtractSource {
    client: Client,
    mirror: String,
    user_agent: String,
}

impl HttpExtractSource {
    /// Construct an HTTP-backed extract source.
    ///
    /// An empty mirror falls back to [`DEFAULT_MIRROR`].
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] when the HTTP client cannot be created.
    pub fn new(mirror: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|source| ClientError::Build { source })?;
        Ok(Self {
            client,
            mirror: sanitise_mirror(mirror),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    /// Override the default user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl ExtractSource for HttpExtractSource {
    fn mirror(&self) -> &str {
        &self.mirror
    }

    async fn fetch_extract(
        &self,
        url: &str,
        sink: &mut ExtractSink<'_>,
    ) -> Result<Transfer, TransportError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url))?;
        let expected_bytes = response.content_length();
        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = StreamReader::new(stream);
        let bytes_written = tokio::io::copy(&mut reader, sink)
            .await
            .map_err(|source| TransportError::Network {
                url: url.to_owned(),
                source,
            })?;
        Ok(Transfer {
            bytes_written,
            expected_bytes,
        })
    }
}

/// Trim trailing slashes and fall back to the default mirror.
pub(crate) fn sanitise_mirror(mirror: impl Into<String>) -> String {
    let raw = mirror.into();
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_MIRROR.to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
