//! Transport that delegates to the store client library.

use async_trait::async_trait;
use osmload_core::{FeatureDocument, TransportResult};

use super::{ApiError, StoreEndpoint, UploadOptions, UploadTransport};
use crate::client::{ClientError, StoreClient, StoreClientConfig};

/// Uploads through [`StoreClient::import_documents`].
#[derive(Debug, Clone)]
pub struct DriverTransport {
    client: StoreClient,
}

impl DriverTransport {
    /// Wrap an existing client.
    #[must_use]
    pub const fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Build a client for `endpoint` with default settings.
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn for_endpoint(endpoint: StoreEndpoint) -> Result<Self, ClientError> {
        StoreClient::new(endpoint).map(Self::new)
    }

    /// Build a client from explicit configuration.
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn with_config(config: StoreClientConfig) -> Result<Self, ClientError> {
        StoreClient::with_config(config).map(Self::new)
    }
}

#[async_trait]
impl UploadTransport for DriverTransport {
    async fn upload_batch(
        &self,
        collection: &str,
        documents: &[FeatureDocument],
        options: &UploadOptions,
    ) -> Result<TransportResult, ApiError> {
        self.client
            .import_documents(collection, documents, options.on_duplicate)
            .await
            .map_err(ApiError::from)
    }
}
