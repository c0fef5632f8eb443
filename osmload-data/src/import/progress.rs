//! Progress reporting and its throttle.

use std::time::{Duration, Instant};

use osmload_core::{ImportPhase, ProgressSnapshot};

/// Receives progress snapshots during a run.
pub trait ProgressSink: Send {
    /// Handle one snapshot.
    fn on_progress(&mut self, snapshot: &ProgressSnapshot);
}

impl<F: FnMut(&ProgressSnapshot) + Send> ProgressSink for F {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        self(snapshot);
    }
}

/// Sink that discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _snapshot: &ProgressSnapshot) {}
}

/// Rate limits snapshots to one per interval, except that a change of
/// phase always passes.
///
/// # Examples
/// ```
/// use std::time::{Duration, Instant};
/// use osmload_core::ImportPhase;
/// use osmload_data::import::ProgressThrottle;
///
/// let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
/// let now = Instant::now();
/// assert!(throttle.should_emit(ImportPhase::Reading, now));
/// assert!(!throttle.should_emit(ImportPhase::Reading, now));
/// assert!(throttle.should_emit(ImportPhase::Importing, now));
/// ```
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
    last_phase: Option<ImportPhase>,
}

impl ProgressThrottle {
    /// Throttle with the given minimum interval.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            last_phase: None,
        }
    }

    /// Decide whether a snapshot in `phase` may be emitted at `now`, and
    /// record the emission if so.
    pub fn should_emit(&mut self, phase: ImportPhase, now: Instant) -> bool {
        let transition = self.last_phase != Some(phase);
        let due = self
            .last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if transition || due {
            self.last_phase = Some(phase);
            self.last_emit = Some(now);
            true
        } else {
            false
        }
    }
}
