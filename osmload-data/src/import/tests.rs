//! Orchestrator coverage against a recording transport.

use std::sync::Arc;
use std::time::Duration;

use osmload_core::{
    ImportPhase, InvalidJsonPolicy, OnDuplicate, TooLongLinePolicy, UnsupportedGeometryPolicy,
};
use rstest::{fixture, rstest};

use super::*;
use crate::lines::LineReaderOptions;
use crate::test_support::{RecordingTransport, StubReply};

fn point(id: u32) -> String {
    format!(
        r#"{{"type":"Feature","geometry":{{"type":"Point","coordinates":[{id},0]}},"properties":{{"@type":"node","@id":{id},"name":"n{id}"}}}}"#
    )
}

const COLLECTION_FEATURE: &str = r#"{"type":"Feature","geometry":{"type":"GeometryCollection","geometries":[]},"properties":{"@type":"relation","@id":9}}"#;

fn ndjson(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

#[fixture]
fn transport() -> Arc<RecordingTransport> {
    Arc::new(RecordingTransport::default())
}

async fn import(
    transport: &Arc<RecordingTransport>,
    config: ImportConfig,
    input: &str,
) -> (Result<ImportSummary, ImportError>, Vec<ProgressSnapshot>) {
    let mut snapshots = Vec::new();
    let mut sink = |snapshot: &ProgressSnapshot| snapshots.push(snapshot.clone());
    let result = ImportOrchestrator::new(Arc::clone(transport), config)
        .run(input.as_bytes(), &mut sink)
        .await;
    (result, snapshots)
}

#[rstest]
#[tokio::test]
async fn skips_unsupported_geometry_by_default(transport: Arc<RecordingTransport>) {
    let input = ndjson(&[point(1), COLLECTION_FEATURE.to_owned()]);
    let (result, _) = import(&transport, ImportConfig::new("osm"), &input).await;
    let summary = result.expect("run succeeds");
    assert_eq!(summary.seen, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped_unsupported_geometry, 1);
    assert_eq!(summary.geometry_type_counts.get("Point"), Some(&1));
    assert_eq!(summary.geometry_type_counts.get("GeometryCollection"), Some(&1));
    assert_eq!(transport.batch_count(), 1);
}

#[rstest]
#[tokio::test]
async fn unsupported_geometry_error_dispatches_nothing(transport: Arc<RecordingTransport>) {
    let input = ndjson(&[point(1), COLLECTION_FEATURE.to_owned()]);
    let config =
        ImportConfig::new("osm").with_unsupported_geometry(UnsupportedGeometryPolicy::Error);
    let (result, _) = import(&transport, config, &input).await;
    assert!(matches!(result, Err(ImportError::UnsupportedGeometry { line: 2, .. })));
    assert_eq!(transport.batch_count(), 0);
}

#[rstest]
#[tokio::test]
async fn keeps_unsupported_geometry_when_asked(transport: Arc<RecordingTransport>) {
    let input = ndjson(&[COLLECTION_FEATURE.to_owned()]);
    let config =
        ImportConfig::new("osm").with_unsupported_geometry(UnsupportedGeometryPolicy::Keep);
    let (result, _) = import(&transport, config, &input).await;
    let summary = result.expect("run succeeds");
    assert_eq!(summary.created, 1);
    assert_eq!(
        summary.unsupported_geometry_type_counts.get("GeometryCollection"),
        Some(&1)
    );
}

#[rstest]
#[tokio::test]
async fn batches_follow_the_byte_budget_in_order(transport: Arc<RecordingTransport>) {
    let lines: Vec<String> = (1..=6).map(point).collect();
    let first = serde_json::from_str(&point(1)).expect("valid json");
    let one = osmload_core::normalize_feature(first).expect("normalise");
    let budget = osmload_core::estimate_wire_size(&one) * 2;
    let config = ImportConfig::new("osm")
        .with_batch_max_bytes(budget)
        .with_concurrency(1)
        .with_on_duplicate(Some(OnDuplicate::Replace));
    let (result, _) = import(&transport, config, &ndjson(&lines)).await;
    assert_eq!(result.expect("run succeeds").created, 6);

    let batches = transport.batches();
    assert_eq!(batches.len(), 3);
    let keys: Vec<Option<String>> = batches
        .iter()
        .flat_map(|batch| batch.documents.iter().map(|doc| doc.key.clone()))
        .collect();
    let expected: Vec<Option<String>> = (1..=6).map(|id| Some(format!("node_{id}"))).collect();
    assert_eq!(keys, expected);
    assert!(batches.iter().all(|batch| batch.collection == "osm"));
    assert!(
        batches
            .iter()
            .all(|batch| batch.options.on_duplicate == Some(OnDuplicate::Replace))
    );
}

#[rstest]
#[case(1)]
#[case(3)]
#[tokio::test]
async fn never_exceeds_the_concurrency_bound(#[case] concurrency: usize) {
    let transport = Arc::new(RecordingTransport::default().with_delay(Duration::from_millis(20)));
    let lines: Vec<String> = (1..=12).map(point).collect();
    let config = ImportConfig::new("osm")
        .with_batch_max_bytes(1)
        .with_concurrency(concurrency);
    let (result, _) = import(&transport, config, &ndjson(&lines)).await;
    assert_eq!(result.expect("run succeeds").created, 12);
    assert_eq!(transport.batch_count(), 12);
    assert!(transport.peak_concurrency() <= concurrency);
}

#[rstest]
#[tokio::test]
async fn transport_failure_fails_the_run() {
    let transport = Arc::new(
        RecordingTransport::default()
            .with_reply(StubReply::Fail(ApiError::new("unauthorized", 401, Some(11)))),
    );
    let (result, _) = import(&transport, ImportConfig::new("osm"), &ndjson(&[point(1)])).await;
    match result {
        Err(ImportError::Transport { batch, source }) => {
            assert_eq!(batch, 1);
            assert_eq!((source.status, source.provider_code), (401, Some(11)));
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn rejected_documents_fail_the_run() {
    let transport = Arc::new(RecordingTransport::default().with_reply(StubReply::Counts(
        TransportResult {
            created: 1,
            errors: 1,
            ..TransportResult::default()
        },
    )));
    let input = ndjson(&[point(1), point(2)]);
    let (result, snapshots) = import(&transport, ImportConfig::new("osm"), &input).await;
    match result {
        Err(ImportError::RejectedDocuments { errors, summary }) => {
            assert_eq!(errors, 1);
            assert_eq!(summary.created, 1);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(
        snapshots.last().map(|snapshot| snapshot.phase),
        Some(ImportPhase::Done)
    );
}

#[rstest]
#[tokio::test]
async fn counts_skipped_lines(transport: Arc<RecordingTransport>) {
    let input = format!(
        "\u{1e}{}\r\n\n{{broken\n{}\n   \n",
        point(1),
        "x".repeat(300)
    );
    let config = ImportConfig::new("osm")
        .with_invalid_json(InvalidJsonPolicy::Skip)
        .with_lines(
            LineReaderOptions::default()
                .with_max_line_bytes(200)
                .with_too_long_line(TooLongLinePolicy::Skip),
        );
    let (result, _) = import(&transport, config, &input).await;
    let summary = result.expect("run succeeds");
    assert_eq!(summary.seen, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped_invalid_json_lines, 1);
    assert_eq!(summary.skipped_too_long_lines, 1);
}

#[rstest]
#[tokio::test]
async fn profile_filter_drops_non_matching_records(transport: Arc<RecordingTransport>) {
    let config = ImportConfig::new("osm").with_profile("roads");
    let (result, _) = import(&transport, config, &ndjson(&[point(1)])).await;
    let summary = result.expect("run succeeds");
    assert_eq!(summary.skipped_by_profile, 1);
    assert_eq!(transport.batch_count(), 0);
}

#[rstest]
#[tokio::test]
async fn phases_are_emitted_in_order(transport: Arc<RecordingTransport>) {
    let config = ImportConfig::new("osm").with_progress_interval(Duration::from_secs(3600));
    let (result, snapshots) = import(&transport, config, &ndjson(&[point(1), point(2)])).await;
    result.expect("run succeeds");
    let phases: Vec<ImportPhase> = snapshots.iter().map(|snapshot| snapshot.phase).collect();
    assert_eq!(
        phases,
        [
            ImportPhase::Reading,
            ImportPhase::Importing,
            ImportPhase::Finalizing,
            ImportPhase::Done
        ]
    );
    let done = snapshots.last().expect("done snapshot");
    assert_eq!(done.summary.created, 2);
}

#[rstest]
#[tokio::test]
async fn empty_input_succeeds_without_uploads(transport: Arc<RecordingTransport>) {
    let (result, _) = import(&transport, ImportConfig::new("osm"), "").await;
    assert_eq!(result.expect("run succeeds"), ImportSummary::default());
    assert_eq!(transport.batch_count(), 0);
}

#[rstest]
#[tokio::test]
async fn too_long_line_error_policy_aborts(transport: Arc<RecordingTransport>) {
    let config =
        ImportConfig::new("osm").with_lines(LineReaderOptions::default().with_max_line_bytes(10));
    let (result, _) = import(&transport, config, &ndjson(&[point(1)])).await;
    assert!(matches!(result, Err(ImportError::Read(_))));
}

#[rstest]
#[tokio::test]
async fn missing_input_file_is_reported(transport: Arc<RecordingTransport>) {
    let orchestrator = ImportOrchestrator::new(transport, ImportConfig::new("osm"));
    let path = std::path::PathBuf::from("/nonexistent/osmload/input.ndjson");
    let result = orchestrator
        .run_source(ImportSource::File(path.clone()), &mut NoProgress)
        .await;
    assert!(
        matches!(result, Err(ImportError::Open { path: ref reported, .. }) if *reported == path)
    );
}

#[rstest]
#[tokio::test]
async fn reads_input_files(transport: Arc<RecordingTransport>) {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    std::io::Write::write_all(&mut file, ndjson(&[point(1), point(2)]).as_bytes())
        .expect("write input");
    let orchestrator = ImportOrchestrator::new(Arc::clone(&transport), ImportConfig::new("osm"));
    let summary = orchestrator
        .run_source(ImportSource::File(file.path().to_path_buf()), &mut NoProgress)
        .await
        .expect("run succeeds");
    assert_eq!(summary.created, 2);
}

#[rstest]
#[tokio::test]
async fn documents_mode_uploads_unmodelled_members(transport: Arc<RecordingTransport>) {
    let line = r#"{"_key":"k1","name":"Kiez","geometry":{"type":"Point","coordinates":[1,2]},"tags":{}}"#;
    let config = ImportConfig::new("osm").with_input_format(InputFormat::Documents);
    let (result, _) = import(&transport, config, &ndjson(&[line.to_owned()])).await;
    assert_eq!(result.expect("run succeeds").created, 1);
    let batches = transport.batches();
    let uploaded = serde_json::to_value(&batches[0].documents[0]).expect("serialise document");
    assert_eq!(uploaded["_key"], "k1");
    assert_eq!(uploaded["name"], "Kiez");
    assert_eq!(uploaded["tagsKV"], serde_json::json!([]));
}
