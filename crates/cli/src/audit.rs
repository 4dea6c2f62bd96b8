//! `tally audit`: sequential identifier gap detection.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Subcommand;
use tally_audit::{AuditConfig, AuditError, GapDetector, GapInput, GapSource};
use tally_config::Context;
use tally_recon::SourceConfig;

use crate::exit_codes::{EXIT_FINDINGS, EXIT_INVALID_CONFIG, EXIT_RUNTIME};
use crate::util::{base_dir, emit_json, read_records};
use crate::CliError;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Report identifiers missing from one audit date
    #[command(after_help = "\
Examples:
  tally audit run receipts.audit.toml
  tally audit run receipts.audit.toml --json
  tally audit run receipts.audit.toml --output gaps.json --strict
  tally audit run receipts.audit.toml --stubs missing.json")]
    Run {
        /// Path to the audit TOML config
        config: PathBuf,

        /// Output JSON to stdout instead of the missing-id list
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write placeholder records for the missing identifiers (JSON)
        #[arg(long, value_name = "FILE")]
        stubs: Option<PathBuf>,

        /// Exit 5 when any identifier is missing
        #[arg(long)]
        strict: bool,
    },

    /// Print the next identifier in the sequence for a date
    #[command(after_help = "\
Examples:
  tally audit next-id receipts.audit.toml --date 2024-03-05")]
    NextId {
        /// Path to the audit TOML config
        config: PathBuf,

        /// Date whose sequence to extend (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
}

pub fn cmd_audit(cmd: AuditCommands, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        AuditCommands::Run { config, json, output, stubs, strict } => {
            cmd_audit_run(ctx, config, json, output, stubs, strict)
        }
        AuditCommands::NextId { config, date } => cmd_audit_next_id(ctx, config, date),
    }
}

fn audit_err(e: AuditError) -> CliError {
    let code = match e {
        AuditError::Io(_) => EXIT_RUNTIME,
        _ => EXIT_INVALID_CONFIG,
    };
    CliError::new(code, e.to_string())
}

/// Column layout shared by the extract, imports and superset files.
fn source_for(config: &AuditConfig, file: &str) -> SourceConfig {
    SourceConfig {
        name: config.name.clone(),
        record_type: config.record_type.clone(),
        file: file.to_string(),
        id_column: config.id_column.clone(),
        date_column: config.date_column.clone(),
        reference_column: None,
    }
}

fn load_optional(
    ctx: &Context,
    config: &AuditConfig,
    base: &Path,
    file: Option<&str>,
) -> Result<Option<Vec<tally_core::Record>>, CliError> {
    match file {
        Some(file) => Ok(Some(read_records(&base.join(file), &source_for(config, file), ctx)?)),
        None => Ok(None),
    }
}

fn cmd_audit_run(
    ctx: &Context,
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    stubs_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = AuditConfig::load(&config_path).map_err(audit_err)?;
    let schema = config.schema(ctx).map_err(audit_err)?;
    let base = base_dir(&config_path);

    let records = read_records(&base.join(&config.file), &source_for(&config, &config.file), ctx)?;
    let imports = load_optional(ctx, &config, &base, config.imports_file.as_deref())?.unwrap_or_default();
    let superset = load_optional(ctx, &config, &base, config.superset_file.as_deref())?;

    let input = GapInput::from_records(config.period_date, &records, &imports, superset.as_deref());
    let report = GapDetector::new(&schema).detect(&input);

    if json_output || output_file.is_some() {
        emit_json(&report, json_output, output_file.as_deref())?;
    }
    if let Some(path) = stubs_file {
        let stubs = report.stubs(&config.record_type, ctx.record_kind(&config.record_type));
        emit_json(&stubs, false, Some(path.as_path()))?;
    }
    if !json_output {
        for id in report.missing_ids() {
            println!("{id}");
        }
    }

    eprintln!(
        "audit '{}' {}: {} missing ({} cross-period, {} intra-period, {} end-of-period), {} nonconforming",
        config.name,
        config.period_date,
        report.gaps.len(),
        report.count(GapSource::CrossPeriod),
        report.count(GapSource::IntraPeriod),
        report.count(GapSource::EndOfPeriod),
        report.nonconforming.len(),
    );

    if strict && !report.is_empty() {
        return Err(CliError::new(EXIT_FINDINGS, "missing transactions found"));
    }
    Ok(())
}

fn cmd_audit_next_id(ctx: &Context, config_path: PathBuf, date: NaiveDate) -> Result<(), CliError> {
    let config = AuditConfig::load(&config_path).map_err(audit_err)?;
    let schema = config.schema(ctx).map_err(audit_err)?;
    let base = base_dir(&config_path);

    let mut records = read_records(&base.join(&config.file), &source_for(&config, &config.file), ctx)?;
    if let Some(imports) = load_optional(ctx, &config, &base, config.imports_file.as_deref())? {
        records.extend(imports);
    }

    let next = schema.next_id(records.iter().map(|r| r.id.as_str()), date).ok_or_else(|| {
        CliError::runtime(format!("no identifier left for {date}: numeric field of '{}' is full", schema.template()))
            .with_hint("widen the numeric placeholder in the template")
    })?;
    println!("{next}");
    Ok(())
}
