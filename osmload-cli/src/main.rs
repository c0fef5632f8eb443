//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use clap::error::ErrorKind;
use osmload_cli::CliError;

fn main() {
    osmload_cli::init_logging();
    match osmload_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err))
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            err.exit()
        }
        Err(err) => {
            eprintln!("osmload: {err}");
            std::process::exit(1);
        }
    }
}
