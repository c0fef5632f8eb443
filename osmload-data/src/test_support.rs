//! Test doubles for the import pipeline and the extract downloader.
//!
//! [`RecordingTransport`] is a deterministic [`UploadTransport`] that keeps
//! every batch it receives and answers from a script, so orchestrator
//! behaviour can be checked without a store. [`StubExtractSource`] serves an
//! in-memory archive.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use osmload_core::{FeatureDocument, TransportResult};
use tokio::io::AsyncWriteExt;

use crate::download::{ExtractSink, ExtractSource, Transfer, TransportError};
use crate::transport::{ApiError, UploadOptions, UploadTransport};

/// Scripted reply for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubReply {
    /// Report every document as created.
    CreateAll,
    /// Report these counts.
    Counts(TransportResult),
    /// Fail with this error.
    Fail(ApiError),
}

/// One upload as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBatch {
    /// Target collection.
    pub collection: String,
    /// Documents in the batch.
    pub documents: Vec<FeatureDocument>,
    /// Options passed with the batch.
    pub options: UploadOptions,
}

/// [`UploadTransport`] that records batches and replies from a script.
///
/// Once the script runs out every batch is reported as fully created.
///
/// # Examples
/// ```
/// use osmload_data::test_support::{RecordingTransport, StubReply};
/// use osmload_data::transport::ApiError;
///
/// let transport = RecordingTransport::default()
///     .with_reply(StubReply::Fail(ApiError::new("boom", 500, None)));
/// assert_eq!(transport.batch_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct RecordingTransport {
    replies: Mutex<VecDeque<StubReply>>,
    batches: Mutex<Vec<RecordedBatch>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingTransport {
    /// Queue a reply for the next unanswered upload.
    #[must_use]
    pub fn with_reply(self, reply: StubReply) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    /// Hold every upload for `delay` before replying.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Batches received so far, in arrival order.
    #[must_use]
    pub fn batches(&self) -> Vec<RecordedBatch> {
        lock(&self.batches).clone()
    }

    /// Number of uploads received.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        lock(&self.batches).len()
    }

    /// Most uploads observed in progress at the same time.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl UploadTransport for RecordingTransport {
    async fn upload_batch(
        &self,
        collection: &str,
        documents: &[FeatureDocument],
        options: &UploadOptions,
    ) -> Result<TransportResult, ApiError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        lock(&self.batches).push(RecordedBatch {
            collection: collection.to_owned(),
            documents: documents.to_vec(),
            options: *options,
        });
        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or(StubReply::CreateAll);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        match reply {
            StubReply::CreateAll => Ok(TransportResult {
                created: u64::try_from(documents.len()).unwrap_or(u64::MAX),
                ..TransportResult::default()
            }),
            StubReply::Counts(result) => Ok(result),
            StubReply::Fail(err) => Err(err),
        }
    }
}

/// [`ExtractSource`] backed by in-memory bytes.
#[derive(Debug, Clone)]
pub struct StubExtractSource {
    mirror: String,
    archive: Vec<u8>,
    announced: Option<u64>,
    failure: Option<u16>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubExtractSource {
    /// Serve `archive` from `https://example.org`, announcing its true length.
    #[must_use]
    pub fn new(archive: Vec<u8>) -> Self {
        let announced = u64::try_from(archive.len()).ok();
        Self {
            mirror: "https://example.org".to_owned(),
            archive,
            announced,
            failure: None,
            requests: Arc::default(),
        }
    }

    /// Announce `length` instead of the archive's true length.
    #[must_use]
    pub const fn with_announced_length(mut self, length: Option<u64>) -> Self {
        self.announced = length;
        self
    }

    /// Answer every request with HTTP `status`.
    #[must_use]
    pub const fn failing_with(mut self, status: u16) -> Self {
        self.failure = Some(status);
        self
    }

    /// URLs requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ExtractSource for StubExtractSource {
    fn mirror(&self) -> &str {
        &self.mirror
    }

    async fn fetch_extract(
        &self,
        url: &str,
        sink: &mut ExtractSink<'_>,
    ) -> Result<Transfer, TransportError> {
        lock(&self.requests).push(url.to_owned());
        if let Some(status) = self.failure {
            return Err(TransportError::Http {
                url: url.to_owned(),
                status,
                message: "stubbed failure".to_owned(),
            });
        }
        sink.write_all(&self.archive)
            .await
            .map_err(|source| TransportError::Network {
                url: url.to_owned(),
                source,
            })?;
        Ok(Transfer {
            bytes_written: u64::try_from(self.archive.len()).unwrap_or(u64::MAX),
            expected_bytes: self.announced,
        })
    }
}
