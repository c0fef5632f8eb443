//! Command-line interface for the osmload importer.
#![forbid(unsafe_code)]

use std::io::{IsTerminal, Write};

use clap::{Parser, Subcommand};
use log::info;
use osmload_core::ImportSummary;
use osmload_data::DownloadReport;

mod download;
mod error;
mod import;
mod progress;

pub use error::CliError;

use download::{DownloadArgs, execute_download, http_source, resolve_download_config};
use import::{ImportArgs, execute_import, resolve_import_config};
use progress::SpinnerProgress;

const ARG_INPUT: &str = "input";
const ARG_PBF: &str = "pbf";
const ARG_CONVERTER: &str = "converter";
const ARG_URL: &str = "url";
const ARG_DATABASE: &str = "database";
const ARG_USERNAME: &str = "username";
const ARG_PASSWORD: &str = "password";
const ARG_COLLECTION: &str = "collection";
const ARG_TRANSPORT: &str = "transport";
const ARG_CURL_PROGRAM: &str = "curl-program";
const ARG_BATCH_BYTES: &str = "batch-bytes";
const ARG_CONCURRENCY: &str = "concurrency";
const ARG_ON_DUPLICATE: &str = "on-duplicate";
const ARG_INPUT_FORMAT: &str = "input-format";
const ARG_PROFILE: &str = "profile";
const ARG_UNSUPPORTED_GEOMETRY: &str = "unsupported-geometry";
const ARG_INVALID_JSON: &str = "invalid-json";
const ARG_TOO_LONG_LINE: &str = "too-long-line";
const ARG_MAX_LINE_BYTES: &str = "max-line-bytes";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";
const ENV_INPUT: &str = "OSMLOAD_CMDS_IMPORT_INPUT";
const ENV_COLLECTION: &str = "OSMLOAD_CMDS_IMPORT_COLLECTION";

const ARG_REGION: &str = "region";
const ARG_MIRROR: &str = "mirror";
const ARG_OUTPUT_DIR: &str = "output-dir";
const ENV_REGION: &str = "OSMLOAD_CMDS_DOWNLOAD_REGION";

const DEFAULT_LOG_FILTER: &str = "info";

/// Run the osmload CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Import(args) => {
            let config = resolve_import_config(args)?;
            let mut progress = if std::io::stderr().is_terminal() {
                SpinnerProgress::new()
            } else {
                SpinnerProgress::hidden()
            };
            let summary = runtime.block_on(execute_import(config, &mut progress))?;
            write_summary(&mut stdout, &summary)
        }
        Command::Download(args) => {
            let config = resolve_download_config(args)?;
            let source = http_source(&config)?;
            let report = runtime.block_on(execute_download(&config, &source))?;
            write_download_report(&mut stdout, &report)
        }
    }
}

/// Initialise `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .format_timestamp_secs()
        .init();
}

#[derive(Debug, Parser)]
#[command(
    name = "osmload",
    about = "Stream OpenStreetMap features into a document store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import NDJSON features from a file, standard input or an extract.
    Import(ImportArgs),
    /// Download a regional extract from a mirror.
    Download(DownloadArgs),
}

fn write_summary(writer: &mut dyn Write, summary: &ImportSummary) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(CliError::SerializeSummary)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

fn write_download_report(writer: &mut dyn Write, report: &DownloadReport) -> Result<(), CliError> {
    info!("downloaded {}", report.url);
    writeln!(
        writer,
        "{} ({} bytes)",
        report.output_path.display(),
        report.bytes_written
    )
    .map_err(CliError::WriteOutput)
}

#[cfg(test)]
mod tests;
