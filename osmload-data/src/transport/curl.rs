//! Transport that delegates the HTTP exchange to a `curl` child process.
//!
//! The body is piped to `curl`'s stdin and `-w "\n%{http_code}"` appends the
//! status as a final output line, so stdout is `{json body}\n{status}`.

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use osmload_core::{FeatureDocument, TransportResult};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    ApiError, StoreEndpoint, UploadOptions, UploadTransport, encode_ldjson, import_headers,
    parse_import_response,
};

/// Program run when none is configured.
pub const DEFAULT_CURL_PROGRAM: &str = "curl";

/// How to invoke `curl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurlTransportConfig {
    /// Executable name or path.
    pub program: String,
    /// Extra arguments appended after the request arguments.
    pub extra_args: Vec<String>,
}

impl Default for CurlTransportConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_CURL_PROGRAM.to_owned(),
            extra_args: Vec::new(),
        }
    }
}

impl CurlTransportConfig {
    /// Use `program` instead of `curl`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Append `args` to every invocation.
    #[must_use]
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Uploads by spawning one `curl` process per batch.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    endpoint: StoreEndpoint,
    config: CurlTransportConfig,
}

impl CurlTransport {
    /// Transport for `endpoint`.
    #[must_use]
    pub const fn new(endpoint: StoreEndpoint, config: CurlTransportConfig) -> Self {
        Self { endpoint, config }
    }

    fn arguments(
        &self,
        collection: &str,
        content_length: usize,
        options: &UploadOptions,
    ) -> Result<Vec<String>, ApiError> {
        let url = self
            .endpoint
            .import_url(collection, options.on_duplicate)
            .map_err(|err| {
                ApiError::network(format!(
                    "invalid store URL {}: {err}",
                    self.endpoint.base_url
                ))
            })?;
        let mut args: Vec<String> = ["-sS", "-X", "POST", url.as_str()]
            .into_iter()
            .map(str::to_owned)
            .collect();
        for (name, value) in import_headers(&self.endpoint, content_length) {
            args.push("-H".to_owned());
            args.push(format!("{name}: {value}"));
        }
        args.extend(
            ["--data-binary", "@-", "-w", "\\n%{http_code}"]
                .into_iter()
                .map(str::to_owned),
        );
        args.extend(self.config.extra_args.iter().cloned());
        Ok(args)
    }
}

#[async_trait]
impl UploadTransport for CurlTransport {
    async fn upload_batch(
        &self,
        collection: &str,
        documents: &[FeatureDocument],
        options: &UploadOptions,
    ) -> Result<TransportResult, ApiError> {
        let body = encode_ldjson(documents)?;
        let args = self.arguments(collection, body.len(), options)?;
        let program = self.config.program.as_str();
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ApiError::network(format!("failed to start {program}: {err}")))?;
        let stdin = child.stdin.take();
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            stdin.write_all(&body).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output
            .map_err(|err| ApiError::network(format!("failed to wait for {program}: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApiError::network(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        written.map_err(|err| {
            ApiError::network(format!("failed to write body to {program}: {err}"))
        })?;
        let (body, status) = split_status_trailer(&output.stdout);
        let status = status.trim_ascii();
        let status = std::str::from_utf8(status)
            .ok()
            .and_then(|text| text.parse::<u16>().ok())
            .ok_or_else(|| {
                ApiError::network(format!(
                    "{program} did not report an HTTP status (got {:?})",
                    String::from_utf8_lossy(status)
                ))
            })?;
        debug!("{program} reported status {status}");
        parse_import_response(status, body.to_vec())
    }
}

/// Split stdout into the body and the final status line.
fn split_status_trailer(stdout: &[u8]) -> (&[u8], &[u8]) {
    match stdout.iter().rposition(|byte| *byte == b'\n') {
        Some(index) => {
            let (body, trailer) = stdout.split_at(index);
            (body, trailer.get(1..).unwrap_or_default())
        }
        None => (&[], stdout),
    }
}
