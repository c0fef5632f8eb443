//! Transport that assembles the import request by hand.

use async_trait::async_trait;
use osmload_core::{FeatureDocument, TransportResult};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method, Request};

use super::{
    ApiError, StoreEndpoint, UploadOptions, UploadTransport, encode_ldjson, import_headers,
    parse_import_response,
};
use crate::client::{ClientError, StoreClientConfig};

/// Builds every part of the request itself and sends it with
/// [`Client::execute`].
#[derive(Debug, Clone)]
pub struct RawHttpTransport {
    http: Client,
    endpoint: StoreEndpoint,
}

impl RawHttpTransport {
    /// Transport using `config`'s endpoint and timeouts.
    ///
    /// # Errors
    /// Returns [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn with_config(config: &StoreClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: config.build_http_client()?,
            endpoint: config.endpoint.clone(),
        })
    }

    fn build_request(
        &self,
        collection: &str,
        body: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<Request, ApiError> {
        let url = self
            .endpoint
            .import_url(collection, options.on_duplicate)
            .map_err(|err| {
                ApiError::network(format!(
                    "invalid store URL {}: {err}",
                    self.endpoint.base_url
                ))
            })?;
        let mut request = Request::new(Method::POST, url);
        let headers = request.headers_mut();
        for (name, value) in import_headers(&self.endpoint, body.len()) {
            let value = HeaderValue::try_from(value)
                .map_err(|err| ApiError::network(format!("invalid {name} header: {err}")))?;
            headers.insert(HeaderName::from_static(name), value);
        }
        *request.body_mut() = Some(body.into());
        Ok(request)
    }
}

#[async_trait]
impl UploadTransport for RawHttpTransport {
    async fn upload_batch(
        &self,
        collection: &str,
        documents: &[FeatureDocument],
        options: &UploadOptions,
    ) -> Result<TransportResult, ApiError> {
        let body = encode_ldjson(documents)?;
        let request = self.build_request(collection, body, options)?;
        let url = request.url().to_string();
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|err| ApiError::network(format!("network error contacting {url}: {err}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| {
                ApiError::new(
                    format!("failed to read response from {url}: {err}"),
                    status,
                    None,
                )
            })?;
        parse_import_response(status, body.to_vec())
    }
}
