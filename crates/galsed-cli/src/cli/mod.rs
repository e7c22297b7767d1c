mod commands;

use std::path::PathBuf;

use clap::Parser;
use galsed_core::domain::{ErrorCategory, SynthesisError};

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error[{}]: {}", error.category().as_str(), error);
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("galsed".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();

    match Cli::try_parse_from(&full_args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(error) => match error.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{error}");
                Ok(0)
            }
            _ => Err(CliError::Usage(error.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "galsed", about = "Galaxy SED and broadband magnitude synthesis")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Synthesize full spectra from merger-tree star formation histories
    Spectrum(commands::RunIo),
    /// Synthesize broadband AB magnitudes from merger-tree histories
    Photometry(commands::RunIo),
    /// Synthesize from pre-flattened histories with a selectable output mode
    Composite(commands::RunIo),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Spectrum(io) => commands::run_spectrum_command(io),
        CliCommand::Photometry(io) => commands::run_photometry_command(io),
        CliCommand::Composite(io) => commands::run_composite_command(io),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("run description '{path}' is not valid JSON: {message}")]
    Description { path: PathBuf, message: String },
    #[error("library manifest '{path}' attaches no filter curves")]
    MissingFilters { path: PathBuf },
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Usage(_) | Self::Description { .. } | Self::MissingFilters { .. } => {
                ErrorCategory::InputValidation
            }
            Self::Synthesis(error) => error.category(),
            Self::Internal(_) => ErrorCategory::IoSystem,
        }
    }

    fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }
}
