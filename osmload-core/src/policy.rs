//! Per-run policies for malformed, oversized and unsupported input.
//!
//! Each policy parses from and displays as its lowercase name, so the same
//! spelling works on the command line, in configuration files and in logs.
//!
//! # Examples
//! ```
//! use osmload_core::{OnDuplicate, UnsupportedGeometryPolicy};
//!
//! assert_eq!("keep".parse::<UnsupportedGeometryPolicy>(), Ok(UnsupportedGeometryPolicy::Keep));
//! assert_eq!(OnDuplicate::Replace.to_string(), "replace");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a policy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct UnknownPolicyError {
    /// Policy family being parsed.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
    /// Comma-separated accepted names.
    pub expected: &'static str,
}

macro_rules! named_policy {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Return the policy as its lowercase name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownPolicyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownPolicyError {
                        kind: $kind,
                        value: s.to_owned(),
                        expected: concat!($($text, " "),+).trim_ascii_end(),
                    }),
                }
            }
        }
    };
}

named_policy! {
    /// What to do with a line whose payload is not valid JSON.
    InvalidJsonPolicy, "invalid JSON policy" {
        /// Abort the run.
        Error => "error",
        /// Count the line and continue.
        Skip => "skip",
    }
}

named_policy! {
    /// What to do with a line longer than the configured byte limit.
    TooLongLinePolicy, "too-long line policy" {
        /// Abort the run.
        Error => "error",
        /// Drop the line without buffering it and continue.
        Skip => "skip",
    }
}

named_policy! {
    /// What to do with a geometry the geo index cannot hold.
    UnsupportedGeometryPolicy, "unsupported geometry policy" {
        /// Count the document and drop it.
        Skip => "skip",
        /// Count the document and upload it anyway.
        Keep => "keep",
        /// Abort the run before dispatching anything further.
        Error => "error",
    }
}

named_policy! {
    /// How the store resolves a `_key` that already exists.
    OnDuplicate, "duplicate-key mode" {
        /// Reject the document and count it under `errors`.
        Error => "error",
        /// Merge the new attributes into the stored document.
        Update => "update",
        /// Replace the stored document.
        Replace => "replace",
        /// Keep the stored document and count the new one as ignored.
        Ignore => "ignore",
    }
}

impl Default for InvalidJsonPolicy {
    fn default() -> Self {
        Self::Error
    }
}

impl Default for TooLongLinePolicy {
    fn default() -> Self {
        Self::Error
    }
}

impl Default for UnsupportedGeometryPolicy {
    fn default() -> Self {
        Self::Skip
    }
}
