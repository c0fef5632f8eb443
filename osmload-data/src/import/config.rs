//! Per-run import settings.

use std::str::FromStr;
use std::time::Duration;

use osmload_core::{InvalidJsonPolicy, OnDuplicate, UnknownPolicyError, UnsupportedGeometryPolicy};

use crate::lines::LineReaderOptions;

/// Default byte budget per batch.
pub const DEFAULT_BATCH_MAX_BYTES: usize = 8 * 1024 * 1024;
/// Default number of concurrent uploads.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default minimum gap between throttled progress snapshots.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Shape of each input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputFormat {
    /// GeoJSON features from the converter; run through the normaliser.
    #[default]
    Features,
    /// Documents already in stored shape; passed through.
    Documents,
}

impl InputFormat {
    /// Return the format as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Documents => "documents",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = UnknownPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Features, Self::Documents]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPolicyError {
                kind: "input format",
                value: s.to_owned(),
                expected: "features documents",
            })
    }
}

/// Settings for one [`super::ImportOrchestrator`] run.
///
/// # Examples
/// ```
/// use osmload_core::UnsupportedGeometryPolicy;
/// use osmload_data::import::ImportConfig;
///
/// let config = ImportConfig::new("osm_features")
///     .with_concurrency(0)
///     .with_unsupported_geometry(UnsupportedGeometryPolicy::Keep);
/// assert_eq!(config.effective_concurrency(), 1);
/// assert_eq!(config.batch_max_bytes, 8 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Target collection.
    pub collection: String,
    /// Byte budget per batch.
    pub batch_max_bytes: usize,
    /// Upper bound on concurrent uploads. Values below one mean one.
    pub concurrency: usize,
    /// Duplicate-key mode passed to the store.
    pub on_duplicate: Option<OnDuplicate>,
    /// Record shape.
    pub input_format: InputFormat,
    /// Profile name handed to the profile filter; `None` keeps everything.
    pub profile: Option<String>,
    /// Handling of unsupported geometry types.
    pub unsupported_geometry: UnsupportedGeometryPolicy,
    /// Handling of lines that are not JSON.
    pub invalid_json: InvalidJsonPolicy,
    /// Line limits and policies.
    pub lines: LineReaderOptions,
    /// Minimum gap between progress snapshots within a phase.
    pub progress_interval: Duration,
}

impl ImportConfig {
    /// Defaults for importing into `collection`.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            batch_max_bytes: DEFAULT_BATCH_MAX_BYTES,
            concurrency: DEFAULT_CONCURRENCY,
            on_duplicate: None,
            input_format: InputFormat::default(),
            profile: None,
            unsupported_geometry: UnsupportedGeometryPolicy::default(),
            invalid_json: InvalidJsonPolicy::default(),
            lines: LineReaderOptions::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Set the batch byte budget.
    #[must_use]
    pub const fn with_batch_max_bytes(mut self, bytes: usize) -> Self {
        self.batch_max_bytes = bytes;
        self
    }

    /// Set the concurrency bound.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the duplicate-key mode.
    #[must_use]
    pub const fn with_on_duplicate(mut self, mode: Option<OnDuplicate>) -> Self {
        self.on_duplicate = mode;
        self
    }

    /// Set the record shape.
    #[must_use]
    pub const fn with_input_format(mut self, format: InputFormat) -> Self {
        self.input_format = format;
        self
    }

    /// Filter records through the named profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the unsupported-geometry policy.
    #[must_use]
    pub const fn with_unsupported_geometry(mut self, policy: UnsupportedGeometryPolicy) -> Self {
        self.unsupported_geometry = policy;
        self
    }

    /// Set the invalid-JSON policy.
    #[must_use]
    pub const fn with_invalid_json(mut self, policy: InvalidJsonPolicy) -> Self {
        self.invalid_json = policy;
        self
    }

    /// Set the line reader options.
    #[must_use]
    pub fn with_lines(mut self, lines: LineReaderOptions) -> Self {
        self.lines = lines;
        self
    }

    /// Set the progress throttle interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Concurrency bound clamped to at least one.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}
