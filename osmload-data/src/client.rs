//! Minimal HTTP client for the document store's REST API.
//!
//! [`StoreClient`] covers the calls an import needs: bulk import, database
//! and collection creation, and geo index creation. It is the library the
//! driver-backed transport and the bootstrap helpers delegate to.
//!
//! # Example
//!
//! ```no_run
//! use osmload_data::client::{StoreClient, StoreClientConfig};
//! use osmload_data::transport::StoreEndpoint;
//!
//! # async fn example() -> Result<(), osmload_data::client::ClientError> {
//! let endpoint = StoreEndpoint::new("http://127.0.0.1:8529").with_database("osm");
//! let client = StoreClient::with_config(StoreClientConfig::new(endpoint))?;
//! client.create_collection("nodes").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use osmload_core::{FeatureDocument, OnDuplicate, TransportResult};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::transport::{
    ApiError, JSON_ACCEPT, LDJSON_CONTENT_TYPE, StoreEndpoint, encode_ldjson, parse_import_response,
};

/// Default user agent for store requests.
pub const DEFAULT_USER_AGENT: &str = "osmload/0.1";

/// Default per-request timeout in seconds. Large batches take a while.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Database every server has; databases are created through it.
const SYSTEM_DATABASE: &str = "_system";

/// Errors raised by [`StoreClient`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {source}")]
    Build {
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint did not produce a valid URL.
    #[error("invalid store URL {base_url}: {source}")]
    Url {
        /// Configured base URL.
        base_url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The request never produced a response.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Request URL.
        url: String,
        /// Client error.
        #[source]
        source: reqwest::Error,
    },
    /// The store answered with an error.
    #[error("request to {url} failed: {source}")]
    Api {
        /// Request URL.
        url: String,
        /// Parsed store error.
        #[source]
        source: ApiError,
    },
}

impl From<ClientError> for ApiError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Api { source, .. } => source,
            ClientError::Network { ref source, .. } => {
                let status = source.status().map_or(0, |status| status.as_u16());
                Self::new(error.to_string(), status, None)
            }
            other => Self::network(other.to_string()),
        }
    }
}

/// Configuration for [`StoreClient`].
#[derive(Debug, Clone)]
pub struct StoreClientConfig {
    /// Store coordinates and credentials.
    pub endpoint: StoreEndpoint,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for StoreClientConfig {
    fn default() -> Self {
        Self {
            endpoint: StoreEndpoint::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl StoreClientConfig {
    /// Configuration for `endpoint` with default timeouts.
    #[must_use]
    pub fn new(endpoint: StoreEndpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build a `reqwest` client with these settings.
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] when the TLS backend fails to load.
    pub fn build_http_client(&self) -> Result<Client, ClientError> {
        Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(self.timeout))
            .timeout(self.timeout)
            .build()
            .map_err(|source| ClientError::Build { source })
    }
}

/// Store API client.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: Client,
    endpoint: StoreEndpoint,
}

impl StoreClient {
    /// Create a client with default settings.
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn new(endpoint: StoreEndpoint) -> Result<Self, ClientError> {
        Self::with_config(StoreClientConfig::new(endpoint))
    }

    /// Create a client from explicit configuration.
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn with_config(config: StoreClientConfig) -> Result<Self, ClientError> {
        let http = config.build_http_client()?;
        Ok(Self {
            http,
            endpoint: config.endpoint,
        })
    }

    /// Endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &StoreEndpoint {
        &self.endpoint
    }

    /// Copy of this client addressing `database` instead.
    ///
    /// The underlying connection pool is shared.
    #[must_use]
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            endpoint: self.endpoint.clone().with_database(database),
        }
    }

    /// Bulk-import `documents` into `collection`.
    ///
    /// # Errors
    /// Returns [`ClientError::Api`] for non-success responses and
    /// [`ClientError::Network`] when no response arrives.
    pub async fn import_documents(
        &self,
        collection: &str,
        documents: &[FeatureDocument],
        on_duplicate: Option<OnDuplicate>,
    ) -> Result<TransportResult, ClientError> {
        let url = self
            .endpoint
            .import_url(collection, on_duplicate)
            .map_err(|source| self.url_error(source))?;
        let body = encode_ldjson(documents).map_err(|source| ClientError::Api {
            url: url.to_string(),
            source,
        })?;
        let response = self
            .http
            .post(url.clone())
            .header(AUTHORIZATION, self.endpoint.authorization())
            .header(ACCEPT, JSON_ACCEPT)
            .header(CONTENT_TYPE, LDJSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|source| network_error(&url, source))?;
        let (status, body) = read_body(&url, response).await?;
        parse_import_response(status, body).map_err(|source| ClientError::Api {
            url: url.to_string(),
            source,
        })
    }

    /// Create database `name`.
    ///
    /// # Errors
    /// Fails like [`Self::import_documents`]; an existing database is a 409
    /// [`ClientError::Api`].
    pub async fn create_database(&self, name: &str) -> Result<(), ClientError> {
        let url = self
            .endpoint
            .api_url(SYSTEM_DATABASE, &["database"])
            .map_err(|source| self.url_error(source))?;
        self.post_json(url, &json!({ "name": name })).await
    }

    /// Create document collection `name` in the endpoint's database.
    ///
    /// # Errors
    /// Fails like [`Self::create_database`].
    pub async fn create_collection(&self, name: &str) -> Result<(), ClientError> {
        let url = self
            .endpoint
            .api_url(&self.endpoint.database, &["collection"])
            .map_err(|source| self.url_error(source))?;
        self.post_json(url, &json!({ "name": name, "type": 2 })).await
    }

    /// Ensure a GeoJSON geo index on `field` of `collection`.
    ///
    /// # Errors
    /// Fails like [`Self::create_database`].
    pub async fn ensure_geo_index(&self, collection: &str, field: &str) -> Result<(), ClientError> {
        let mut url = self
            .endpoint
            .api_url(&self.endpoint.database, &["index"])
            .map_err(|source| self.url_error(source))?;
        url.query_pairs_mut().append_pair("collection", collection);
        let body = json!({ "type": "geo", "fields": [field], "geoJson": true });
        self.post_json(url, &body).await
    }

    async fn post_json(&self, url: Url, body: &serde_json::Value) -> Result<(), ClientError> {
        let response = self
            .http
            .post(url.clone())
            .header(AUTHORIZATION, self.endpoint.authorization())
            .header(ACCEPT, JSON_ACCEPT)
            .json(body)
            .send()
            .await
            .map_err(|source| network_error(&url, source))?;
        let (status, body) = read_body(&url, response).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(ClientError::Api {
                url: url.to_string(),
                source: ApiError::from_response(status, &body),
            })
        }
    }

    fn url_error(&self, source: url::ParseError) -> ClientError {
        ClientError::Url {
            base_url: self.endpoint.base_url.clone(),
            source,
        }
    }
}

async fn read_body(url: &Url, response: Response) -> Result<(u16, Vec<u8>), ClientError> {
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|source| network_error(url, source))?;
    Ok((status, body.to_vec()))
}

fn network_error(url: &Url, source: reqwest::Error) -> ClientError {
    ClientError::Network {
        url: url.to_string(),
        source,
    }
}
