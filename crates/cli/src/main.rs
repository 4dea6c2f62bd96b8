// Tally CLI - sequence audits and account reconciliation from CSV extracts

mod audit;
mod exit_codes;
mod recon;
mod rule;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tally_config::Context;
use tracing_subscriber::EnvFilter;

use audit::AuditCommands;
use exit_codes::{EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};
use recon::ReconCommands;
use rule::RuleCommands;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Find missing transactions and link records across accounts")]
#[command(version)]
struct Cli {
    /// Context file (defaults to ~/.config/tally/context.toml)
    #[arg(long, global = true, env = "TALLY_CONTEXT", value_name = "FILE")]
    context: Option<PathBuf>,

    /// Log debug output to stderr (overrides TALLY_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect gaps in sequential transaction identifiers
    #[command(subcommand)]
    Audit(AuditCommands),

    /// Match primary records against associated accounts
    #[command(subcommand)]
    Recon(ReconCommands),

    /// Evaluate rule expressions over a CSV extract
    #[command(subcommand)]
    Rule(RuleCommands),
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // try_init also installs the log -> tracing bridge
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_context(path: Option<PathBuf>) -> Result<Context, CliError> {
    match path {
        Some(path) => Context::load(&path).map_err(|e| {
            CliError::config(format!("{}: {e}", path.display()))
                .with_hint("see `date_format`, `id_date_offset_years` and `[record_types.*]`")
        }),
        None => Ok(Context::load_default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_context(cli.context).and_then(|ctx| match cli.command {
        Commands::Audit(cmd) => audit::cmd_audit(cmd, &ctx),
        Commands::Recon(cmd) => recon::cmd_recon(cmd, &ctx),
        Commands::Rule(cmd) => rule::cmd_rule(cmd, &ctx),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INVALID_CONFIG, msg)
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
