//! Terminal progress reporting for import runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use osmload_core::{ImportPhase, ProgressSnapshot};
use osmload_data::ProgressSink;

const TICK: Duration = Duration::from_millis(120);

/// [`ProgressSink`] rendering snapshots on a terminal spinner.
#[derive(Debug)]
pub(crate) struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    /// Spinner drawn on stderr.
    pub(crate) fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    /// Spinner drawn nowhere, for non-interactive runs.
    pub(crate) fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(TICK);
        Self { bar }
    }

    /// Last rendered message.
    #[cfg(test)]
    pub(crate) fn message(&self) -> String {
        self.bar.message()
    }

    /// Stop the spinner, keeping the last message on screen.
    pub(crate) fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

impl ProgressSink for SpinnerProgress {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        self.bar.set_message(render(snapshot));
        if snapshot.phase == ImportPhase::Done {
            self.bar.finish();
        }
    }
}

/// One-line rendering of a snapshot.
pub(crate) fn render(snapshot: &ProgressSnapshot) -> String {
    let summary = &snapshot.summary;
    let skipped = summary.skipped_unsupported_geometry
        + summary.skipped_by_profile
        + summary.skipped_too_long_lines
        + summary.skipped_invalid_json_lines;
    format!(
        "{}: {} seen, {} created, {} updated, {} ignored, {} errors, {} skipped",
        snapshot.phase,
        summary.seen,
        summary.created,
        summary.updated,
        summary.ignored,
        summary.errors,
        skipped
    )
}
