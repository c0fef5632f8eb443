//! Turning one raw line into at most one document.

use log::debug;
use osmload_core::{
    FeatureDocument, ImportSummary, InvalidJsonPolicy, ProfileFilter, UnsupportedGeometryPolicy,
    is_supported_geometry_type, normalize_feature,
};
use serde_json::Value;

use super::{ImportConfig, ImportError, InputFormat};

const RECORD_SEPARATOR: char = '\u{1e}';
const EXCERPT_CHARS: usize = 40;

/// Strip one leading record separator, then a trailing carriage return.
pub(crate) fn record_payload(line: &str) -> &str {
    let line = line.strip_prefix(RECORD_SEPARATOR).unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Applies parsing, normalisation, profile filtering and geometry policy.
pub(crate) struct RecordProcessor<'a> {
    config: &'a ImportConfig,
    profiles: &'a dyn ProfileFilter,
}

impl<'a> RecordProcessor<'a> {
    pub(crate) fn new(config: &'a ImportConfig, profiles: &'a dyn ProfileFilter) -> Self {
        Self { config, profiles }
    }

    /// Process one line, updating `summary`'s skip counters.
    ///
    /// Blank lines are ignored without being counted.
    pub(crate) fn process(
        &self,
        line_number: u64,
        line: &str,
        summary: &mut ImportSummary,
    ) -> Result<Option<FeatureDocument>, ImportError> {
        let payload = record_payload(line);
        if payload.trim().is_empty() {
            return Ok(None);
        }
        summary.seen += 1;

        let mut bytes = payload.as_bytes().to_vec();
        let value: Value = match simd_json::serde::from_slice(&mut bytes) {
            Ok(value) => value,
            Err(source) => match self.config.invalid_json {
                InvalidJsonPolicy::Error => {
                    return Err(ImportError::InvalidJson {
                        line: line_number,
                        excerpt: excerpt(payload),
                        source,
                    });
                }
                InvalidJsonPolicy::Skip => {
                    debug!("skipping line {line_number}: invalid JSON ({source})");
                    summary.skipped_invalid_json_lines += 1;
                    return Ok(None);
                }
            },
        };

        let document = match self.config.input_format {
            InputFormat::Features => normalize_feature(value),
            InputFormat::Documents => FeatureDocument::from_value(value),
        }
        .map_err(|source| ImportError::Normalize {
            line: line_number,
            source,
        })?;

        if let Some(profile) = self.config.profile.as_deref()
            && !self.profiles.accepts(&document, profile)
        {
            summary.skipped_by_profile += 1;
            return Ok(None);
        }

        let kind = document.geometry.kind.as_str();
        summary.record_geometry_type(kind);
        if is_supported_geometry_type(kind) {
            return Ok(Some(document));
        }
        match self.config.unsupported_geometry {
            UnsupportedGeometryPolicy::Skip => {
                debug!("skipping line {line_number}: unsupported geometry {kind}");
                summary.skipped_unsupported_geometry += 1;
                Ok(None)
            }
            UnsupportedGeometryPolicy::Keep => {
                summary.record_unsupported_geometry_type(kind);
                Ok(Some(document))
            }
            UnsupportedGeometryPolicy::Error => Err(ImportError::UnsupportedGeometry {
                line: line_number,
                geometry_type: kind.to_owned(),
            }),
        }
    }
}

/// First [`EXCERPT_CHARS`] characters of `payload`, marked when cut.
fn excerpt(payload: &str) -> String {
    let payload = payload.trim();
    match payload.char_indices().nth(EXCERPT_CHARS) {
        Some((end, _)) => format!("{}...", &payload[..end]),
        None => payload.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osmload_core::BuiltinProfiles;
    use rstest::rstest;

    const POINT: &str = r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{"@type":"node","@id":1,"shop":"bakery"}}"#;
    const COLLECTION: &str = r#"{"type":"Feature","geometry":{"type":"GeometryCollection","geometries":[]},"properties":{}}"#;

    fn process(
        config: &ImportConfig,
        line: &str,
        summary: &mut ImportSummary,
    ) -> Result<Option<FeatureDocument>, ImportError> {
        RecordProcessor::new(config, &BuiltinProfiles).process(7, line, summary)
    }

    #[rstest]
    #[case("\u{1e}{\"a\":1}\r", "{\"a\":1}")]
    #[case("\u{1e}\u{1e}x", "\u{1e}x")]
    #[case("plain", "plain")]
    #[case("\r", "")]
    fn strips_framing(#[case] line: &str, #[case] expected: &str) {
        assert_eq!(record_payload(line), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\u{1e}")]
    #[case("\r")]
    fn blank_lines_are_not_counted(#[case] line: &str) {
        let mut summary = ImportSummary::default();
        let outcome = process(&ImportConfig::new("c"), line, &mut summary).expect("blank is fine");
        assert!(outcome.is_none());
        assert_eq!(summary.seen, 0);
    }

    #[rstest]
    fn accepts_supported_feature() {
        let mut summary = ImportSummary::default();
        let doc = process(&ImportConfig::new("c"), POINT, &mut summary)
            .expect("valid")
            .expect("kept");
        assert_eq!(doc.key.as_deref(), Some("node_1"));
        assert_eq!(summary.seen, 1);
        assert_eq!(summary.geometry_type_counts.get("Point"), Some(&1));
    }

    #[rstest]
    fn invalid_json_follows_policy() {
        let mut summary = ImportSummary::default();
        let err =
            process(&ImportConfig::new("c"), "{nope", &mut summary).expect_err("error policy");
        assert!(matches!(err, ImportError::InvalidJson { line: 7, .. }));

        let skip = ImportConfig::new("c").with_invalid_json(InvalidJsonPolicy::Skip);
        let outcome = process(&skip, "{nope", &mut summary).expect("skip policy");
        assert!(outcome.is_none());
        assert_eq!(summary.skipped_invalid_json_lines, 1);
        assert_eq!(summary.seen, 2);
    }

    #[rstest]
    fn invalid_json_message_quotes_the_payload() {
        let mut summary = ImportSummary::default();
        let config = ImportConfig::new("c");
        let err = process(&config, r#"{"type":"Feat"#, &mut summary).expect_err("truncated");
        assert!(err.to_string().contains(r#"`{"type":"Feat`"#), "unexpected message: {err}");

        let long = format!("[{}", "ü".repeat(60));
        let err = process(&config, &long, &mut summary).expect_err("unterminated array");
        let quoted = format!("`[{}...`", "ü".repeat(39));
        assert!(err.to_string().contains(&quoted), "unexpected message: {err}");
    }

    #[rstest]
    fn missing_geometry_type_is_fatal() {
        let mut summary = ImportSummary::default();
        let err = process(&ImportConfig::new("c"), r#"{"type":"Feature","properties":{}}"#, &mut summary)
            .expect_err("no geometry");
        assert!(matches!(err, ImportError::Normalize { line: 7, .. }));
    }

    #[rstest]
    #[case(UnsupportedGeometryPolicy::Skip, false, 1, 0)]
    #[case(UnsupportedGeometryPolicy::Keep, true, 0, 1)]
    fn unsupported_geometry_policies(
        #[case] policy: UnsupportedGeometryPolicy,
        #[case] kept: bool,
        #[case] skipped: u64,
        #[case] kept_count: u64,
    ) {
        let config = ImportConfig::new("c").with_unsupported_geometry(policy);
        let mut summary = ImportSummary::default();
        let outcome = process(&config, COLLECTION, &mut summary).expect("not fatal");
        assert_eq!(outcome.is_some(), kept);
        assert_eq!(summary.skipped_unsupported_geometry, skipped);
        assert_eq!(
            summary
                .unsupported_geometry_type_counts
                .get("GeometryCollection")
                .copied()
                .unwrap_or_default(),
            kept_count
        );
        assert_eq!(summary.geometry_type_counts.get("GeometryCollection"), Some(&1));
    }

    #[rstest]
    fn unsupported_geometry_error_names_the_type() {
        let config =
            ImportConfig::new("c").with_unsupported_geometry(UnsupportedGeometryPolicy::Error);
        let err = process(&config, COLLECTION, &mut ImportSummary::default()).expect_err("fatal");
        assert!(matches!(
            err,
            ImportError::UnsupportedGeometry { ref geometry_type, .. }
                if geometry_type == "GeometryCollection"
        ));
    }

    #[rstest]
    fn profile_filter_runs_before_geometry_counts() {
        let config = ImportConfig::new("c").with_profile("roads");
        let mut summary = ImportSummary::default();
        let outcome = process(&config, POINT, &mut summary).expect("not fatal");
        assert!(outcome.is_none());
        assert_eq!(summary.skipped_by_profile, 1);
        assert!(summary.geometry_type_counts.is_empty());
    }

    #[rstest]
    fn documents_format_passes_through() {
        let config = ImportConfig::new("c").with_input_format(InputFormat::Documents);
        let line = r#"{"_key":"k1","geometry":{"type":"Point","coordinates":[0,0]},"tags":{"a":"b"}}"#;
        let doc = process(&config, line, &mut ImportSummary::default())
            .expect("valid")
            .expect("kept");
        assert_eq!(doc.key.as_deref(), Some("k1"));
        assert_eq!(doc.tags_kv(), ["a=b"]);
    }
}
