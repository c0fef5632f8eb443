//! `download` command implementation for the osmload CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmload_data::download::{DEFAULT_MIRROR, ExtractSource};
use osmload_data::{DownloadReport, HttpExtractSource, download_extract};
use serde::{Deserialize, Serialize};

use crate::{ARG_MIRROR, ARG_OUTPUT_DIR, ARG_REGION, CliError, ENV_REGION};

/// CLI arguments for the `download` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Download the latest OpenStreetMap extract for a region \
                 (for example `europe/monaco`) from a mirror into an output \
                 directory.",
    about = "Download a regional OSM extract"
)]
#[ortho_config(prefix = "OSMLOAD")]
pub(crate) struct DownloadArgs {
    /// Region path on the mirror, e.g. "europe/monaco".
    #[arg(long = ARG_REGION, value_name = "region")]
    #[serde(default)]
    pub(crate) region: Option<String>,
    /// Mirror base URL.
    #[arg(long = ARG_MIRROR, value_name = "url")]
    #[serde(default)]
    pub(crate) mirror: Option<String>,
    /// Directory receiving the extract.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Replace an existing extract instead of failing.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) overwrite: bool,
}

impl DownloadArgs {
    pub(crate) fn into_config(self) -> Result<DownloadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        DownloadConfig::try_from(merged)
    }
}

/// Resolved `download` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DownloadConfig {
    pub(crate) region: String,
    pub(crate) mirror: String,
    pub(crate) output_dir: Utf8PathBuf,
    pub(crate) overwrite: bool,
}

impl DownloadConfig {
    pub(crate) fn prepare_output_dir(&self) -> Result<(), CliError> {
        let path = self.output_dir.as_path();
        match osmload_fs::dir_is_usable(path) {
            Ok(true) => {}
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
            Ok(false) => {
                return Err(CliError::OutputDirectoryNotDirectory {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => return Err(create_dir_error(path, source)),
        }
        osmload_fs::ensure_dir(path).map_err(|source| create_dir_error(path, source))
    }
}

fn create_dir_error(path: &Utf8Path, source: std::io::Error) -> CliError {
    CliError::CreateOutputDirectory {
        path: path.to_path_buf(),
        source,
    }
}

impl TryFrom<DownloadArgs> for DownloadConfig {
    type Error = CliError;

    fn try_from(args: DownloadArgs) -> Result<Self, Self::Error> {
        let region = args.region.ok_or(CliError::MissingArgument {
            field: ARG_REGION,
            env: ENV_REGION,
        })?;
        Ok(Self {
            region,
            mirror: args.mirror.unwrap_or_else(|| DEFAULT_MIRROR.to_owned()),
            output_dir: args.output_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
            overwrite: args.overwrite,
        })
    }
}

pub(crate) fn resolve_download_config(args: DownloadArgs) -> Result<DownloadConfig, CliError> {
    let config = args.into_config()?;
    config.prepare_output_dir()?;
    Ok(config)
}

/// Fetch the extract described by `config` from `source`.
pub(crate) async fn execute_download<S: ExtractSource + ?Sized>(
    config: &DownloadConfig,
    source: &S,
) -> Result<DownloadReport, CliError> {
    let report = download_extract(
        source,
        &config.region,
        config.output_dir.as_std_path(),
        config.overwrite,
    )
    .await?;
    Ok(report)
}

pub(crate) fn http_source(config: &DownloadConfig) -> Result<HttpExtractSource, CliError> {
    Ok(HttpExtractSource::new(config.mirror.clone())?)
}
