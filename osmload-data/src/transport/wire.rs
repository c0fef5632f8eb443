//! Request body encoding and response decoding for the bulk import API.

use log::debug;
use osmload_core::TransportResult;
use serde::{Deserialize, Serialize};

use super::{ApiError, StoreEndpoint};

/// Media type of the request body.
pub const LDJSON_CONTENT_TYPE: &str = "application/x-ldjson";
/// Media type requested for the response.
pub const JSON_ACCEPT: &str = "application/json";

/// Encode `documents` as one JSON document per line, each ending in `\n`.
///
/// # Errors
/// Fails when a document cannot be serialised.
///
/// # Examples
/// ```
/// use osmload_data::transport::encode_ldjson;
/// use serde_json::json;
///
/// let body = encode_ldjson(&[json!({"a": 1}), json!({"b": 2})])?;
/// assert_eq!(body, b"{\"a\":1}\n{\"b\":2}\n");
/// # Ok::<(), osmload_data::transport::ApiError>(())
/// ```
pub fn encode_ldjson<T: Serialize>(documents: &[T]) -> Result<Vec<u8>, ApiError> {
    let mut body = Vec::new();
    for document in documents {
        serde_json::to_writer(&mut body, document)
            .map_err(|err| ApiError::network(format!("failed to encode document: {err}")))?;
        body.push(b'\n');
    }
    Ok(body)
}

/// Headers every transport sends with an import request, in wire order.
pub(crate) fn import_headers(
    endpoint: &StoreEndpoint,
    content_length: usize,
) -> [(&'static str, String); 4] {
    [
        ("authorization", endpoint.authorization()),
        ("accept", JSON_ACCEPT.to_owned()),
        ("content-type", LDJSON_CONTENT_TYPE.to_owned()),
        ("content-length", content_length.to_string()),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImportResponse {
    created: u64,
    errors: u64,
    empty: u64,
    updated: u64,
    ignored: u64,
    details: Vec<String>,
}

/// Turn a status and body into a [`TransportResult`] or [`ApiError`].
///
/// # Errors
/// Non-2xx statuses map through [`ApiError::from_response`]; a 2xx body
/// that is not an import result is reported with the same status.
pub(crate) fn parse_import_response(
    status: u16,
    mut body: Vec<u8>,
) -> Result<TransportResult, ApiError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::from_response(status, &body));
    }
    let response: ImportResponse = simd_json::serde::from_slice(&mut body)
        .map_err(|err| ApiError::new(format!("malformed import response: {err}"), status, None))?;
    for detail in &response.details {
        debug!("import detail: {detail}");
    }
    Ok(TransportResult {
        created: response.created,
        updated: response.updated,
        ignored: response.ignored,
        empty: response.empty,
        errors: response.errors,
    })
}
