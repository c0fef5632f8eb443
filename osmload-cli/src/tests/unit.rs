//! Focused unit tests covering import command configuration.

use super::helpers::{InputFiles, import_args};
use super::*;
use crate::import::{
    ImportArgs, ImportCommandConfig, InputSource, config_from_layers_for_test, require_existing,
};
use camino::{Utf8Path, Utf8PathBuf};
use osmload_core::{
    ImportPhase, ImportSummary, InvalidJsonPolicy, OnDuplicate, ProgressSnapshot,
    TooLongLinePolicy, UnsupportedGeometryPolicy,
};
use osmload_data::ImportSource;
use osmload_data::import::{DEFAULT_BATCH_MAX_BYTES, InputFormat};
use osmload_data::transport::{DEFAULT_BASE_URL, DEFAULT_DATABASE, TransportKind};
use rstest::rstest;
use std::time::Duration;

#[rstest]
fn missing_collection_names_flag_and_env() {
    let args = ImportArgs {
        input: Some(Utf8PathBuf::from("features.ndjson")),
        ..ImportArgs::default()
    };
    let err = ImportCommandConfig::try_from(args).expect_err("collection is required");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_COLLECTION);
            assert_eq!(env, ENV_COLLECTION);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn missing_input_names_flag_and_env() {
    let args = ImportArgs {
        collection: Some("features".to_owned()),
        ..ImportArgs::default()
    };
    let err = ImportCommandConfig::try_from(args).expect_err("an input is required");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_INPUT);
            assert_eq!(env, ENV_INPUT);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn input_and_pbf_are_exclusive() {
    let args = ImportArgs {
        pbf: Some(Utf8PathBuf::from("monaco.osm.pbf")),
        ..import_args(Utf8Path::new("features.ndjson"), "features")
    };
    let err = ImportCommandConfig::try_from(args).expect_err("conflicting inputs");
    assert!(matches!(
        err,
        CliError::ConflictingArguments {
            first: ARG_INPUT,
            second: ARG_PBF
        }
    ));
}

#[rstest]
fn dash_reads_standard_input() {
    let config = ImportCommandConfig::try_from(import_args(Utf8Path::new("-"), "features"))
        .expect("stdin config");
    assert_eq!(config.source, InputSource::Stdin);
    config.validate_sources().expect("stdin needs no file");
}

#[rstest]
fn defaults_fill_unset_options() {
    let args = import_args(Utf8Path::new("features.ndjson"), "features");
    let config = ImportCommandConfig::try_from(args).expect("defaults apply");
    assert_eq!(config.client.endpoint.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.client.endpoint.database, DEFAULT_DATABASE);
    assert_eq!(config.transport, TransportKind::Driver);
    assert_eq!(config.import.batch_max_bytes, DEFAULT_BATCH_MAX_BYTES);
    assert_eq!(config.import.on_duplicate, None);
    assert_eq!(config.import.profile, None);
    assert!(!config.bootstrap);
}

#[rstest]
fn explicit_options_reach_the_configs() {
    let args = ImportArgs {
        url: Some("http://db.internal:8529".to_owned()),
        database: Some("osm".to_owned()),
        username: Some("loader".to_owned()),
        password: Some("hunter2".to_owned()),
        transport: Some("curl".to_owned()),
        curl_program: Some("/opt/curl".to_owned()),
        batch_bytes: Some(1024),
        concurrency: Some(2),
        on_duplicate: Some("replace".to_owned()),
        input_format: Some("documents".to_owned()),
        profile: Some("POIS".to_owned()),
        unsupported_geometry: Some("keep".to_owned()),
        invalid_json: Some("skip".to_owned()),
        too_long_line: Some("skip".to_owned()),
        max_line_bytes: Some(4096),
        timeout_secs: Some(9),
        bootstrap: true,
        ..import_args(Utf8Path::new("features.ndjson"), "features")
    };
    let config = ImportCommandConfig::try_from(args).expect("valid options");
    assert_eq!(config.client.endpoint.base_url, "http://db.internal:8529");
    assert_eq!(config.client.endpoint.database, "osm");
    assert_eq!(config.client.endpoint.username, "loader");
    assert_eq!(config.client.endpoint.password, "hunter2");
    assert_eq!(config.client.timeout, Duration::from_secs(9));
    assert_eq!(config.transport, TransportKind::Curl);
    assert_eq!(config.curl.program, "/opt/curl");
    assert_eq!(config.import.batch_max_bytes, 1024);
    assert_eq!(config.import.concurrency, 2);
    assert_eq!(config.import.on_duplicate, Some(OnDuplicate::Replace));
    assert_eq!(config.import.input_format, InputFormat::Documents);
    assert_eq!(config.import.profile.as_deref(), Some("pois"));
    assert_eq!(
        config.import.unsupported_geometry,
        UnsupportedGeometryPolicy::Keep
    );
    assert_eq!(config.import.invalid_json, InvalidJsonPolicy::Skip);
    assert_eq!(config.import.lines.max_line_bytes, Some(4096));
    assert_eq!(config.import.lines.too_long_line, TooLongLinePolicy::Skip);
    assert!(config.bootstrap);
}

#[rstest]
#[case(ImportArgs { transport: Some("grpc".to_owned()), ..ImportArgs::default() }, ARG_TRANSPORT)]
#[case(ImportArgs { on_duplicate: Some("merge".to_owned()), ..ImportArgs::default() }, ARG_ON_DUPLICATE)]
#[case(ImportArgs { profile: Some("railways".to_owned()), ..ImportArgs::default() }, ARG_PROFILE)]
#[case(ImportArgs { input_format: Some("csv".to_owned()), ..ImportArgs::default() }, ARG_INPUT_FORMAT)]
#[case(ImportArgs { invalid_json: Some("keep".to_owned()), ..ImportArgs::default() }, ARG_INVALID_JSON)]
#[case(ImportArgs { too_long_line: Some("truncate".to_owned()), ..ImportArgs::default() }, ARG_TOO_LONG_LINE)]
#[case(ImportArgs { unsupported_geometry: Some("drop".to_owned()), ..ImportArgs::default() }, ARG_UNSUPPORTED_GEOMETRY)]
fn unknown_names_are_rejected(#[case] overrides: ImportArgs, #[case] expected: &'static str) {
    let args = ImportArgs {
        input: Some(Utf8PathBuf::from("features.ndjson")),
        collection: Some("features".to_owned()),
        ..overrides
    };
    let err = ImportCommandConfig::try_from(args).expect_err("unknown name");
    match err {
        CliError::InvalidValue { field, source } => {
            assert_eq!(field, expected);
            assert!(!source.expected.is_empty());
        }
        other => panic!("expected InvalidValue, found {other:?}"),
    }
}

#[rstest]
fn pbf_input_runs_the_converter() {
    let args = ImportArgs {
        pbf: Some(Utf8PathBuf::from("monaco.osm.pbf")),
        converter: Some("/usr/local/bin/osmium".to_owned()),
        collection: Some("features".to_owned()),
        ..ImportArgs::default()
    };
    let config = ImportCommandConfig::try_from(args).expect("pbf config");
    let ImportSource::Convert(command) = config.source.into_import_source() else {
        panic!("expected a conversion source");
    };
    assert_eq!(command.program, "/usr/local/bin/osmium");
    assert!(command.args().iter().any(|arg| arg == "monaco.osm.pbf"));
}

#[rstest]
fn validate_sources_reports_missing_files() {
    let files = InputFiles::new();
    let config =
        ImportCommandConfig::try_from(import_args(&files.root().join("absent.ndjson"), "features"))
            .expect("config");
    let err = config.validate_sources().expect_err("file is missing");
    match err {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_INPUT),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn require_existing_rejects_directories() {
    let files = InputFiles::new();
    let err = require_existing(files.root(), ARG_PBF).expect_err("directories are not inputs");
    match err {
        CliError::SourcePathNotFile { field, path } => {
            assert_eq!(field, ARG_PBF);
            assert_eq!(path, files.root());
        }
        other => panic!("unexpected error {other:?}"),
    }
    require_existing(files.pbf(), ARG_PBF).expect("extract exists");
    require_existing(files.ndjson(), ARG_INPUT).expect("ndjson exists");
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "concurrency": "many" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "url": "http://from-file:8529",
            "database": "from_file",
            "collection": "from_file",
        }),
        None,
    );
    composer.push_environment(json!({
        "database": "from_env",
        "input": "from-env.ndjson",
    }));
    composer.push_cli(json!({ "collection": "from_cli" }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.client.endpoint.base_url, "http://from-file:8529");
    assert_eq!(config.client.endpoint.database, "from_env");
    assert_eq!(config.import.collection, "from_cli");
    assert_eq!(
        config.source,
        InputSource::File(Utf8PathBuf::from("from-env.ndjson"))
    );
}

#[rstest]
fn summary_is_written_as_camel_case_json() {
    let mut summary = ImportSummary {
        seen: 3,
        created: 2,
        skipped_by_profile: 1,
        ..ImportSummary::default()
    };
    summary.record_geometry_type("Point");
    let mut out = Vec::new();
    write_summary(&mut out, &summary).expect("write summary");
    let value: serde_json::Value = serde_json::from_slice(&out).expect("valid json");
    assert_eq!(value["seen"], 3);
    assert_eq!(value["skippedByProfile"], 1);
    assert_eq!(value["geometryTypeCounts"]["Point"], 1);
    assert!(out.ends_with(b"}\n"));
}

#[rstest]
fn progress_lines_sum_skips() {
    let snapshot = ProgressSnapshot {
        phase: ImportPhase::Importing,
        summary: ImportSummary {
            seen: 10,
            created: 6,
            skipped_unsupported_geometry: 1,
            skipped_invalid_json_lines: 2,
            ..ImportSummary::default()
        },
    };
    let line = progress::render(&snapshot);
    assert!(line.starts_with("importing: 10 seen, 6 created"), "{line}");
    assert!(line.ends_with("3 skipped"), "{line}");
}
