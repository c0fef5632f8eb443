//! Where an import reads its lines from.

use std::path::PathBuf;
use std::time::Duration;

use log::{error, info};
use osmload_core::ImportSummary;

use super::{ImportError, ImportOrchestrator, ProgressSink};
use crate::convert::{ConversionCommand, ConversionError};
use crate::transport::UploadTransport;

/// How long a failed run waits for the converter to report its own exit.
const EXIT_GRACE: Duration = Duration::from_millis(250);

/// Input for [`ImportOrchestrator::run_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    /// An NDJSON file on disk.
    File(PathBuf),
    /// Standard input.
    Stdin,
    /// The stdout of a converter run over an extract.
    Convert(ConversionCommand),
}

impl<T: UploadTransport + ?Sized + 'static> ImportOrchestrator<T> {
    /// Open `source` and import it.
    ///
    /// For [`ImportSource::Convert`] the converter's exit status is checked
    /// after the last line is read; an unsuccessful exit fails the run even
    /// when every upload succeeded. If the import fails first and the
    /// converter has already exited unsuccessfully, the converter's failure
    /// is reported in place of the downstream error; otherwise the converter
    /// is killed.
    ///
    /// # Errors
    /// Returns [`ImportError::Open`] when a file cannot be opened,
    /// [`ImportError::Conversion`] when the converter fails, and otherwise
    /// whatever [`Self::run`] returns.
    pub async fn run_source(
        &self,
        source: ImportSource,
        progress: &mut dyn ProgressSink,
    ) -> Result<ImportSummary, ImportError> {
        match source {
            ImportSource::File(path) => {
                info!("importing {}", path.display());
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|source| ImportError::Open { path, source })?;
                self.run(file, progress).await
            }
            ImportSource::Stdin => {
                info!("importing from standard input");
                self.run(tokio::io::stdin(), progress).await
            }
            ImportSource::Convert(command) => self.run_converted(&command, progress).await,
        }
    }

    async fn run_converted(
        &self,
        command: &ConversionCommand,
        progress: &mut dyn ProgressSink,
    ) -> Result<ImportSummary, ImportError> {
        let mut process = command.spawn()?;
        let Some(mut stdout) = process.take_stdout() else {
            let program = process.program().to_owned();
            process.abort().await;
            return Err(ConversionError::Io {
                program,
                source: std::io::Error::other("converter stdout was not captured"),
            }
            .into());
        };
        let outcome = self.run(&mut stdout, progress).await;
        match outcome {
            Ok(summary) => {
                drop(stdout);
                process.finish().await?;
                Ok(summary)
            }
            Err(err) => {
                // A converter killed mid-write leaves a truncated last line.
                if let Some(failure) = process.exit_failure(EXIT_GRACE).await {
                    error!("converter `{}` failed: {failure}", process.program());
                    return Err(failure.into());
                }
                error!("import failed; stopping converter `{}`", process.program());
                drop(stdout);
                process.abort().await;
                Err(err)
            }
        }
    }
}
