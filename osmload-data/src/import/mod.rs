//! The streaming import pipeline.
//!
//! [`ImportOrchestrator`] reads lines, turns them into documents, batches
//! them under a byte budget and uploads batches concurrently, folding every
//! result into one [`ImportSummary`].
//!
//! Invariants:
//! - Documents are read, filtered and batched strictly in input order.
//! - At most `concurrency` uploads are in flight; completion order is free,
//!   so every counter is a commutative sum folded on the orchestrator task.
//! - Phases only move forward: reading, importing, finalizing, done.
//! - Any fatal error stops dispatch at once. Uploads already in flight are
//!   detached rather than cancelled, and no partial summary is returned.

mod config;
mod error;
mod progress;
mod record;
mod source;

#[cfg(test)]
mod tests;

use std::mem;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use osmload_core::{
    Batch, BuiltinProfiles, DocumentChunker, FeatureDocument, ImportPhase, ImportSummary,
    ProfileFilter, ProgressSnapshot, TransportResult,
};
use tokio::io::AsyncRead;
use tokio::task::{JoinError, JoinSet};

use crate::lines::{LineEvent, LineEventSink, LineReader};
use crate::transport::{ApiError, UploadOptions, UploadTransport};

pub use config::{
    DEFAULT_BATCH_MAX_BYTES, DEFAULT_CONCURRENCY, DEFAULT_PROGRESS_INTERVAL, ImportConfig,
    InputFormat,
};
pub use error::ImportError;
pub use progress::{NoProgress, ProgressSink, ProgressThrottle};
pub use source::ImportSource;

type UploadOutcome = (u64, Result<TransportResult, ApiError>);

/// Drives one import from an input stream to the store.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use osmload_data::import::{ImportConfig, ImportOrchestrator, NoProgress};
/// use osmload_data::test_support::RecordingTransport;
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// # runtime.block_on(async {
/// let input = concat!(
///     r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]},"properties":{}}"#,
///     "\n",
/// );
/// let transport = Arc::new(RecordingTransport::default());
/// let orchestrator = ImportOrchestrator::new(transport.clone(), ImportConfig::new("osm"));
/// let summary = orchestrator.run(input.as_bytes(), &mut NoProgress).await?;
/// assert_eq!((summary.seen, summary.created), (1, 1));
/// assert_eq!(transport.batch_count(), 1);
/// # Ok::<(), osmload_data::import::ImportError>(())
/// # })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ImportOrchestrator<T: ?Sized> {
    transport: Arc<T>,
    config: ImportConfig,
    profiles: Box<dyn ProfileFilter>,
}

impl<T: ?Sized> std::fmt::Debug for ImportOrchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: UploadTransport + ?Sized + 'static> ImportOrchestrator<T> {
    /// Orchestrator uploading through `transport` with the built-in profiles.
    #[must_use]
    pub fn new(transport: Arc<T>, config: ImportConfig) -> Self {
        Self {
            transport,
            config,
            profiles: Box::new(BuiltinProfiles),
        }
    }

    /// Replace the profile filter.
    #[must_use]
    pub fn with_profile_filter(mut self, filter: impl ProfileFilter + 'static) -> Self {
        self.profiles = Box::new(filter);
        self
    }

    /// Run settings.
    #[must_use]
    pub const fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import every line of `input`.
    ///
    /// # Errors
    /// Returns the first fatal [`ImportError`]; see the module invariants.
    pub async fn run<R: AsyncRead + Unpin>(
        &self,
        input: R,
        progress: &mut dyn ProgressSink,
    ) -> Result<ImportSummary, ImportError> {
        let mut run = RunState::new(&self.config, progress);
        let result = self.drive(input, &mut run).await;
        if result.is_err() && !run.in_flight.is_empty() {
            warn!(
                "abandoning {} in-flight upload(s) after a fatal error",
                run.in_flight.len()
            );
            run.in_flight.detach_all();
        }
        result
    }

    async fn drive<R: AsyncRead + Unpin>(
        &self,
        input: R,
        run: &mut RunState<'_>,
    ) -> Result<ImportSummary, ImportError> {
        run.enter(ImportPhase::Reading);
        let mut reader =
            LineReader::new(input, self.config.lines.clone()).with_sink(DroppedLines::default());
        let mut chunker = DocumentChunker::new(self.config.batch_max_bytes);
        let processor = record::RecordProcessor::new(&self.config, self.profiles.as_ref());

        while let Some(line) = reader.next_line().await? {
            run.summary.skipped_too_long_lines = reader.sink().too_long;
            let document = processor.process(reader.line_number(), &line, &mut run.summary)?;
            if let Some(batch) = document.and_then(|document| chunker.push(document, None)) {
                self.dispatch(batch, run).await?;
            }
            run.reap()?;
            run.tick();
        }
        run.summary.skipped_too_long_lines = reader.sink().too_long;
        if let Some(batch) = chunker.flush() {
            self.dispatch(batch, run).await?;
        }

        run.enter(ImportPhase::Finalizing);
        while let Some(joined) = run.in_flight.join_next().await {
            run.settle(joined)?;
            run.tick();
        }
        run.enter(ImportPhase::Done);

        let summary = mem::take(&mut run.summary);
        info!(
            "import finished: {} seen, {} created, {} updated, {} ignored, {} errors in {} batch(es)",
            summary.seen,
            summary.created,
            summary.updated,
            summary.ignored,
            summary.errors,
            run.dispatched
        );
        if summary.errors > 0 {
            return Err(ImportError::RejectedDocuments {
                errors: summary.errors,
                summary: Box::new(summary),
            });
        }
        Ok(summary)
    }

    async fn dispatch(
        &self,
        batch: Batch<FeatureDocument>,
        run: &mut RunState<'_>,
    ) -> Result<(), ImportError> {
        while run.in_flight.len() >= self.config.effective_concurrency() {
            match run.in_flight.join_next().await {
                Some(joined) => run.settle(joined)?,
                None => break,
            }
        }
        run.dispatched += 1;
        let number = run.dispatched;
        if run.phase < ImportPhase::Importing {
            run.enter(ImportPhase::Importing);
        }
        debug!(
            "dispatching batch {number}: {} document(s), ~{} bytes",
            batch.len(),
            batch.estimated_bytes()
        );
        let transport = Arc::clone(&self.transport);
        let collection = self.config.collection.clone();
        let options = UploadOptions {
            on_duplicate: self.config.on_duplicate,
        };
        let documents = batch.into_documents();
        run.in_flight.spawn(async move {
            let result = transport
                .upload_batch(&collection, &documents, &options)
                .await;
            (number, result)
        });
        Ok(())
    }
}

/// Everything a run mutates, owned by the orchestrator task.
struct RunState<'a> {
    summary: ImportSummary,
    phase: ImportPhase,
    throttle: ProgressThrottle,
    progress: &'a mut dyn ProgressSink,
    in_flight: JoinSet<UploadOutcome>,
    dispatched: u64,
}

impl<'a> RunState<'a> {
    fn new(config: &ImportConfig, progress: &'a mut dyn ProgressSink) -> Self {
        Self {
            summary: ImportSummary::default(),
            phase: ImportPhase::Reading,
            throttle: ProgressThrottle::new(config.progress_interval),
            progress,
            in_flight: JoinSet::new(),
            dispatched: 0,
        }
    }

    fn enter(&mut self, phase: ImportPhase) {
        if phase != self.phase {
            debug!("import phase: {} -> {phase}", self.phase);
        }
        self.phase = phase;
        self.tick();
    }

    fn tick(&mut self) {
        if self.throttle.should_emit(self.phase, Instant::now()) {
            let snapshot = ProgressSnapshot {
                phase: self.phase,
                summary: self.summary.clone(),
            };
            self.progress.on_progress(&snapshot);
        }
    }

    /// Fold uploads that have already finished without waiting.
    fn reap(&mut self) -> Result<(), ImportError> {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.settle(joined)?;
        }
        Ok(())
    }

    fn settle(&mut self, joined: Result<UploadOutcome, JoinError>) -> Result<(), ImportError> {
        let (batch, result) = joined.map_err(|source| ImportError::UploadTask { source })?;
        let result = result.map_err(|source| ImportError::Transport { batch, source })?;
        if result.errors > 0 {
            warn!("batch {batch}: the store rejected {} document(s)", result.errors);
        }
        debug!(
            "batch {batch} settled: {} created, {} updated, {} ignored",
            result.created, result.updated, result.ignored
        );
        self.summary.absorb(result);
        Ok(())
    }
}

/// Counts lines the reader dropped.
#[derive(Debug, Default)]
struct DroppedLines {
    too_long: u64,
}

impl LineEventSink for DroppedLines {
    fn on_event(&mut self, event: LineEvent) {
        match event {
            LineEvent::TooLong { bytes, limit } => {
                debug!("skipped a {bytes}-byte line over the {limit}-byte limit");
                self.too_long += 1;
            }
            LineEvent::PartialLineDropped { bytes } => {
                warn!("dropped {bytes} undelimited byte(s) at end of input");
            }
        }
    }
}
