//! `tally recon`: config-driven cross-account matching.

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Subcommand;
use tally_config::Context;
use tally_recon::{MatchEngine, ReconConfig, ReconError, ReconOptions};

use crate::exit_codes::{EXIT_FINDINGS, EXIT_INVALID_CONFIG, EXIT_RUNTIME};
use crate::util::{base_dir, emit_json, read_file};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  tally recon run recon.toml
  tally recon run recon.toml --expand --json
  tally recon run recon.toml --output result.json
  tally recon run recon.toml --references links.json --strict")]
    Run {
        /// Path to the recon TOML config
        config: PathBuf,

        /// Retry unmatched records with expanded rule columns relaxed
        #[arg(long)]
        expand: bool,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write both reference entries of every match to file (JSON)
        #[arg(long, value_name = "FILE")]
        references: Option<PathBuf>,

        /// Exit 5 when any primary record is left unmatched
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  tally recon validate recon.toml")]
    Validate {
        /// Path to the recon TOML config
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, expand, json, output, references, strict } => {
            cmd_recon_run(ctx, config, expand, json, output, references, strict)
        }
        ReconCommands::Validate { config } => cmd_recon_validate(ctx, config),
    }
}

fn recon_err(e: ReconError) -> CliError {
    let code = match e {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        _ => EXIT_RUNTIME,
    };
    CliError::new(code, e.to_string())
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = read_file(config_path)?;
    ReconConfig::from_toml(&config_str).map_err(recon_err)
}

fn cmd_recon_run(
    ctx: &Context,
    config_path: PathBuf,
    expand: bool,
    json_output: bool,
    output_file: Option<PathBuf>,
    references_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to the config file's directory
    let base = base_dir(&config_path);
    let engine = MatchEngine::new(ctx);
    let (primary, accounts) = engine
        .load_accounts(&config, |file| {
            let path = base.join(file);
            std::fs::read_to_string(&path).map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))
        })
        .map_err(recon_err)?;

    let options = ReconOptions::new(Local::now().naive_local()).expanded(expand);
    let report = engine.reconcile(&primary, &accounts, &options);

    if json_output || output_file.is_some() {
        emit_json(&report, json_output, output_file.as_deref())?;
    }
    if let Some(path) = references_file {
        emit_json(&report.reference_entries(), false, Some(path.as_path()))?;
    }

    // Human summary to stderr
    let s = &report.summary;
    eprintln!(
        "recon '{}': {} records, {} matched ({} strict, {} expanded), {} unmatched",
        config.name,
        s.total,
        s.strict + s.expanded,
        s.strict,
        s.expanded,
        s.unmatched,
    );
    if s.ambiguous > 0 {
        eprintln!("{} matches had more than one candidate", s.ambiguous);
    }
    for skipped in &report.skipped_accounts {
        eprintln!("skipped account '{}': {}", skipped.account, skipped.reason);
    }

    if strict && s.unmatched > 0 {
        return Err(CliError::new(EXIT_FINDINGS, "unmatched records found"));
    }
    Ok(())
}

fn cmd_recon_validate(ctx: &Context, config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    for account in &config.accounts {
        if !ctx.is_registered(&account.source.record_type) {
            log::warn!(
                "record type '{}' of account '{}' is not registered in the context",
                account.source.record_type,
                account.source.name
            );
        }
        // A bad subset rule only skips its account at run time, so report it here
        if let Some(subset) = &account.subset {
            match tally_engine::parse(subset) {
                Ok(rule) => log::debug!(
                    "account '{}' subset reads columns {:?}",
                    account.source.name,
                    rule.columns()
                ),
                Err(e) => eprintln!("warning: account '{}' will be skipped: {e}", account.source.name),
            }
        }
    }

    let rules: usize = config.accounts.iter().map(|a| a.rules.len()).sum();
    eprintln!(
        "ok: '{}' ({} accounts, {} association rules)",
        config.name,
        config.accounts.len(),
        rules
    );
    Ok(())
}
