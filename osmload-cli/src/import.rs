//! `import` command implementation for the osmload CLI.

use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmload_core::{
    ImportSummary, InvalidJsonPolicy, OnDuplicate, Profile, TooLongLinePolicy, UnknownPolicyError,
    UnsupportedGeometryPolicy,
};
use osmload_data::client::{StoreClient, StoreClientConfig};
use osmload_data::import::{ImportConfig, ImportOrchestrator, ImportSource, InputFormat};
use osmload_data::transport::{
    CurlTransportConfig, DEFAULT_BASE_URL, DEFAULT_DATABASE, DEFAULT_USERNAME, StoreEndpoint,
    TransportKind, build_transport,
};
use osmload_data::{ConversionCommand, LineReaderOptions, bootstrap};
use serde::{Deserialize, Serialize};

use crate::progress::SpinnerProgress;
use crate::{
    ARG_BATCH_BYTES, ARG_COLLECTION, ARG_CONCURRENCY, ARG_CONVERTER, ARG_CURL_PROGRAM,
    ARG_DATABASE, ARG_INPUT, ARG_INPUT_FORMAT, ARG_INVALID_JSON, ARG_MAX_LINE_BYTES,
    ARG_ON_DUPLICATE, ARG_PASSWORD, ARG_PBF, ARG_PROFILE, ARG_TIMEOUT_SECS, ARG_TOO_LONG_LINE,
    ARG_TRANSPORT, ARG_UNSUPPORTED_GEOMETRY, ARG_URL, ARG_USERNAME, CliError, ENV_COLLECTION,
    ENV_INPUT,
};

/// Input path meaning "read standard input".
pub(crate) const STDIN_MARKER: &str = "-";

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Stream newline-delimited GeoJSON features into a document \
                 collection. Input comes from a file, standard input, or an \
                 extract converted on the fly. Options can come from CLI \
                 flags, configuration files, or environment variables.",
    about = "Import NDJSON features into the store"
)]
#[ortho_config(prefix = "OSMLOAD")]
pub(crate) struct ImportArgs {
    /// NDJSON file to import, or `-` for standard input.
    #[arg(long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// OpenStreetMap extract to convert and import.
    #[arg(long = ARG_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) pbf: Option<Utf8PathBuf>,
    /// Converter program used with `--pbf`.
    #[arg(long = ARG_CONVERTER, value_name = "program")]
    #[serde(default)]
    pub(crate) converter: Option<String>,
    /// Store base URL (e.g. "http://127.0.0.1:8529").
    #[arg(long = ARG_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// Target database.
    #[arg(long = ARG_DATABASE, value_name = "name")]
    #[serde(default)]
    pub(crate) database: Option<String>,
    /// Store user.
    #[arg(long = ARG_USERNAME, value_name = "name")]
    #[serde(default)]
    pub(crate) username: Option<String>,
    /// Store password.
    #[arg(long = ARG_PASSWORD, value_name = "secret")]
    #[serde(default)]
    pub(crate) password: Option<String>,
    /// Target collection.
    #[arg(long = ARG_COLLECTION, value_name = "name")]
    #[serde(default)]
    pub(crate) collection: Option<String>,
    /// Upload transport: driver, raw or curl.
    #[arg(long = ARG_TRANSPORT, value_name = "kind")]
    #[serde(default)]
    pub(crate) transport: Option<String>,
    /// curl executable used by the curl transport.
    #[arg(long = ARG_CURL_PROGRAM, value_name = "program")]
    #[serde(default)]
    pub(crate) curl_program: Option<String>,
    /// Byte budget per uploaded batch.
    #[arg(long = ARG_BATCH_BYTES, value_name = "bytes")]
    #[serde(default)]
    pub(crate) batch_bytes: Option<usize>,
    /// Maximum number of concurrent uploads.
    #[arg(long = ARG_CONCURRENCY, value_name = "n")]
    #[serde(default)]
    pub(crate) concurrency: Option<usize>,
    /// Duplicate-key mode: error, update, replace or ignore.
    #[arg(long = ARG_ON_DUPLICATE, value_name = "mode")]
    #[serde(default)]
    pub(crate) on_duplicate: Option<String>,
    /// Record shape: features or documents.
    #[arg(long = ARG_INPUT_FORMAT, value_name = "format")]
    #[serde(default)]
    pub(crate) input_format: Option<String>,
    /// Only import features matching this profile.
    #[arg(long = ARG_PROFILE, value_name = "name")]
    #[serde(default)]
    pub(crate) profile: Option<String>,
    /// Unsupported geometry policy: skip, keep or error.
    #[arg(long = ARG_UNSUPPORTED_GEOMETRY, value_name = "policy")]
    #[serde(default)]
    pub(crate) unsupported_geometry: Option<String>,
    /// Invalid JSON policy: error or skip.
    #[arg(long = ARG_INVALID_JSON, value_name = "policy")]
    #[serde(default)]
    pub(crate) invalid_json: Option<String>,
    /// Too-long line policy: error or skip.
    #[arg(long = ARG_TOO_LONG_LINE, value_name = "policy")]
    #[serde(default)]
    pub(crate) too_long_line: Option<String>,
    /// Longest accepted line in bytes.
    #[arg(long = ARG_MAX_LINE_BYTES, value_name = "bytes")]
    #[serde(default)]
    pub(crate) max_line_bytes: Option<usize>,
    /// Per-request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Create the database, collection and geo index before importing.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) bootstrap: bool,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportCommandConfig::try_from(merged)
    }
}

/// Where the `import` command reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputSource {
    /// An NDJSON file.
    File(Utf8PathBuf),
    /// Standard input.
    Stdin,
    /// An extract run through the converter.
    Pbf {
        path: Utf8PathBuf,
        converter: Option<String>,
    },
}

impl InputSource {
    pub(crate) fn into_import_source(self) -> ImportSource {
        match self {
            Self::File(path) => ImportSource::File(path.into_std_path_buf()),
            Self::Stdin => ImportSource::Stdin,
            Self::Pbf { path, converter } => {
                let command = ConversionCommand::new(path.into_std_path_buf());
                ImportSource::Convert(match converter {
                    Some(program) => command.with_program(program),
                    None => command,
                })
            }
        }
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct ImportCommandConfig {
    pub(crate) source: InputSource,
    pub(crate) client: StoreClientConfig,
    pub(crate) transport: TransportKind,
    pub(crate) curl: CurlTransportConfig,
    pub(crate) import: ImportConfig,
    pub(crate) bootstrap: bool,
}

impl ImportCommandConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        match &self.source {
            InputSource::File(path) => require_existing(path, ARG_INPUT),
            InputSource::Pbf { path, .. } => require_existing(path, ARG_PBF),
            InputSource::Stdin => Ok(()),
        }
    }
}

pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match osmload_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_named<T>(field: &'static str, value: Option<String>) -> Result<Option<T>, CliError>
where
    T: FromStr<Err = UnknownPolicyError>,
{
    value
        .map(|text| text.parse().map_err(|source| CliError::InvalidValue { field, source }))
        .transpose()
}

fn resolve_source(
    input: Option<Utf8PathBuf>,
    pbf: Option<Utf8PathBuf>,
    converter: Option<String>,
) -> Result<InputSource, CliError> {
    match (input, pbf) {
        (Some(_), Some(_)) => Err(CliError::ConflictingArguments {
            first: ARG_INPUT,
            second: ARG_PBF,
        }),
        (Some(path), None) if path.as_str() == STDIN_MARKER => Ok(InputSource::Stdin),
        (Some(path), None) => Ok(InputSource::File(path)),
        (None, Some(path)) => Ok(InputSource::Pbf { path, converter }),
        (None, None) => Err(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_INPUT,
        }),
    }
}

impl TryFrom<ImportArgs> for ImportCommandConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let collection = args.collection.ok_or(CliError::MissingArgument {
            field: ARG_COLLECTION,
            env: ENV_COLLECTION,
        })?;
        let source = resolve_source(args.input, args.pbf, args.converter)?;

        let base_url = args.url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let database = args.database.unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let username = args.username.unwrap_or_else(|| DEFAULT_USERNAME.to_owned());
        let endpoint = StoreEndpoint::new(base_url)
            .with_database(database)
            .with_credentials(username, args.password.unwrap_or_default());
        let mut client = StoreClientConfig::new(endpoint);
        if let Some(secs) = args.timeout_secs {
            client = client.with_timeout(Duration::from_secs(secs));
        }

        let transport = parse_named::<TransportKind>(ARG_TRANSPORT, args.transport)?
            .unwrap_or_default();
        let curl = match args.curl_program {
            Some(program) => CurlTransportConfig::default().with_program(program),
            None => CurlTransportConfig::default(),
        };

        let mut lines = LineReaderOptions::default();
        if let Some(limit) = args.max_line_bytes {
            lines = lines.with_max_line_bytes(limit);
        }
        if let Some(policy) =
            parse_named::<TooLongLinePolicy>(ARG_TOO_LONG_LINE, args.too_long_line)?
        {
            lines = lines.with_too_long_line(policy);
        }

        let mut import = ImportConfig::new(collection)
            .with_on_duplicate(parse_named::<OnDuplicate>(
                ARG_ON_DUPLICATE,
                args.on_duplicate,
            )?)
            .with_input_format(
                parse_named::<InputFormat>(ARG_INPUT_FORMAT, args.input_format)?
                    .unwrap_or_default(),
            )
            .with_lines(lines);
        if let Some(bytes) = args.batch_bytes {
            import = import.with_batch_max_bytes(bytes);
        }
        if let Some(concurrency) = args.concurrency {
            import = import.with_concurrency(concurrency);
        }
        if let Some(profile) = parse_named::<Profile>(ARG_PROFILE, args.profile)? {
            import = import.with_profile(profile.as_str());
        }
        if let Some(policy) = parse_named::<UnsupportedGeometryPolicy>(
            ARG_UNSUPPORTED_GEOMETRY,
            args.unsupported_geometry,
        )? {
            import = import.with_unsupported_geometry(policy);
        }
        if let Some(policy) =
            parse_named::<InvalidJsonPolicy>(ARG_INVALID_JSON, args.invalid_json)?
        {
            import = import.with_invalid_json(policy);
        }

        Ok(Self {
            source,
            client,
            transport,
            curl,
            import,
            bootstrap: args.bootstrap,
        })
    }
}

pub(crate) fn resolve_import_config(args: ImportArgs) -> Result<ImportCommandConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Run an import described by `config`, reporting progress on `progress`.
pub(crate) async fn execute_import(
    config: ImportCommandConfig,
    progress: &mut SpinnerProgress,
) -> Result<ImportSummary, CliError> {
    if config.bootstrap {
        let database = config.client.endpoint.database.clone();
        let admin = StoreClient::with_config(config.client.clone())?;
        bootstrap(&admin, &database, &config.import.collection).await?;
    }
    let transport = build_transport(config.transport, &config.client, &config.curl)?;
    info!(
        "importing into {}/{} with the {} transport",
        config.client.endpoint.database, config.import.collection, config.transport
    );
    let orchestrator = ImportOrchestrator::new(transport, config.import);
    let outcome = orchestrator
        .run_source(config.source.into_import_source(), progress)
        .await;
    progress.finish();
    Ok(outcome?)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportCommandConfig, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportCommandConfig::try_from(merged)
}
