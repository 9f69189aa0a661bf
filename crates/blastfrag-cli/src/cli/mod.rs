mod commands;
mod dispatch;
mod helpers;

use blastfrag_core::domain::CalcError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let calc_error = error.as_calc_error();
            eprintln!("{}", calc_error.diagnostic_line());
            if let Some(summary_line) = calc_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            calc_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("blastfrag".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "blastfrag",
    version,
    about = "Kuz-Ram blast fragmentation and PSD reconciliation"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Calculate all fragmentation results and reconcile PSD curves
    Run(commands::RunArgs),
    /// Generate the reference PSD curve only
    Reference(commands::ReferenceArgs),
    /// List configured parameters and report bound violations
    Params(commands::ParamsArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_calculation_command(args),
        CliCommand::Reference(args) => commands::run_reference_command(args),
        CliCommand::Params(args) => commands::run_params_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(CalcError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CalcError> for CliError {
    fn from(error: CalcError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_calc_error(&self) -> CalcError {
        match self {
            Self::Usage(message) => CalcError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => CalcError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
