//! Spawning the external converter that turns a `.osm.pbf` extract into
//! GeoJSON text sequences.
//!
//! The converter writes one feature per line to stdout, which the import
//! pipeline reads directly; nothing is staged on disk.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Converter run when none is configured.
pub const DEFAULT_CONVERTER: &str = "osmium";

/// Element attributes requested from the converter.
pub const EXPORT_ATTRIBUTES: &str = "type,id,version,changeset,timestamp,uid,user";

const SIGKILL: i32 = 9;

/// Errors raised by the converter process.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The converter executable could not be found.
    #[error(
        "converter `{program}` was not found; install osmium-tool (for example \
         `apt install osmium-tool` or `brew install osmium-tool`) or point \
         --converter at the binary"
    )]
    BinaryNotFound {
        /// Program that was looked up.
        program: String,
    },
    /// Starting or talking to the converter failed.
    #[error("failed to run converter `{program}`: {source}")]
    Io {
        /// Program being run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The converter exited with a non-zero status.
    #[error("converter `{program}` exited with status {code}: {stderr}")]
    AbnormalExit {
        /// Program that failed.
        program: String,
        /// Exit code.
        code: i32,
        /// Trimmed standard error output.
        stderr: String,
    },
    /// The converter was terminated by a signal.
    #[error("converter `{program}` was killed by signal {signal}: {hint}")]
    Killed {
        /// Program that was killed.
        program: String,
        /// Terminating signal number.
        signal: i32,
        /// Remediation hint.
        hint: String,
    },
}

/// How to run the converter for one extract.
///
/// # Examples
/// ```
/// use osmload_data::convert::ConversionCommand;
///
/// let command = ConversionCommand::new("berlin-latest.osm.pbf");
/// assert_eq!(command.program, "osmium");
/// assert_eq!(command.args().first().map(String::as_str), Some("export"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionCommand {
    /// Executable name or path.
    pub program: String,
    /// Extract to convert.
    pub input: PathBuf,
    /// Extra arguments appended after the export arguments.
    pub extra_args: Vec<String>,
}

impl ConversionCommand {
    /// Convert `input` with the default converter.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            program: DEFAULT_CONVERTER.to_owned(),
            input: input.into(),
            extra_args: Vec::new(),
        }
    }

    /// Use `program` instead of `osmium`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Append `args` to the export arguments.
    #[must_use]
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments passed to the converter.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "export".to_owned(),
            self.input.to_string_lossy().into_owned(),
            "-f".to_owned(),
            "geojsonseq".to_owned(),
            "-a".to_owned(),
            EXPORT_ATTRIBUTES.to_owned(),
            "-o".to_owned(),
            "-".to_owned(),
            "--overwrite".to_owned(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Start the converter with stdout piped.
    ///
    /// Must be called from within a Tokio runtime; stderr is drained on a
    /// background task.
    ///
    /// # Errors
    /// Returns [`ConversionError::BinaryNotFound`] when the program does not
    /// exist and [`ConversionError::Io`] for other spawn failures.
    pub fn spawn(&self) -> Result<ConversionProcess, ConversionError> {
        info!(
            "converting {} with {}",
            self.input.display(),
            self.program
        );
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    ConversionError::BinaryNotFound {
                        program: self.program.clone(),
                    }
                } else {
                    ConversionError::Io {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut captured = Vec::new();
                if let Err(err) = stderr.read_to_end(&mut captured).await {
                    debug!("failed to read converter stderr: {err}");
                }
                captured
            })
        });
        Ok(ConversionProcess {
            program: self.program.clone(),
            child,
            stdout,
            stderr,
        })
    }
}

/// A running converter.
#[derive(Debug)]
pub struct ConversionProcess {
    program: String,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl ConversionProcess {
    /// Take the converter's stdout. Returns `None` on the second call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Program being run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Wait for the converter to exit and classify its status.
    ///
    /// # Errors
    /// Returns [`ConversionError::AbnormalExit`] or
    /// [`ConversionError::Killed`] for unsuccessful exits.
    pub async fn finish(mut self) -> Result<(), ConversionError> {
        drop(self.stdout.take());
        let status = self.child.wait().await.map_err(|source| ConversionError::Io {
            program: self.program.clone(),
            source,
        })?;
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };
        classify_exit(&self.program, status, &String::from_utf8_lossy(&stderr))
    }

    /// Classify the converter's exit if it has stopped, or stops within
    /// `grace`.
    ///
    /// Returns `None` while the converter is still running or when it exited
    /// successfully. Stdout stays open while waiting, so a live converter is
    /// not pushed into a broken pipe.
    pub async fn exit_failure(&mut self, grace: Duration) -> Option<ConversionError> {
        let status = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                debug!("failed to poll converter `{}`: {err}", self.program);
                return None;
            }
            Err(_) => return None,
        };
        let stderr = match self.stderr.take() {
            Some(handle) => match tokio::time::timeout(grace, handle).await {
                Ok(captured) => captured.unwrap_or_default(),
                Err(_) => Vec::new(),
            },
            None => Vec::new(),
        };
        classify_exit(&self.program, status, &String::from_utf8_lossy(&stderr)).err()
    }

    /// Kill the converter and reap it.
    pub async fn abort(mut self) {
        if let Err(err) = self.child.start_kill() {
            debug!("converter already exited: {err}");
        }
        if let Err(err) = self.child.wait().await {
            warn!("failed to reap converter `{}`: {err}", self.program);
        }
    }
}

fn classify_exit(program: &str, status: ExitStatus, stderr: &str) -> Result<(), ConversionError> {
    if status.success() {
        return Ok(());
    }
    match (status.code(), exit_signal(status)) {
        (_, Some(signal)) => Err(killed(program, signal)),
        (Some(code), None) => Err(ConversionError::AbnormalExit {
            program: program.to_owned(),
            code,
            stderr: stderr.trim().to_owned(),
        }),
        (None, None) => Err(ConversionError::AbnormalExit {
            program: program.to_owned(),
            code: -1,
            stderr: stderr.trim().to_owned(),
        }),
    }
}

fn killed(program: &str, signal: i32) -> ConversionError {
    let hint = if signal == SIGKILL {
        "the process was most likely killed for running out of memory; try a smaller \
         extract, free memory or add swap"
            .to_owned()
    } else {
        format!("the process received signal {signal} before finishing")
    };
    ConversionError::Killed {
        program: program.to_owned(),
        signal,
        hint,
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}
