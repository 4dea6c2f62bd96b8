//! `tally rule`: evaluate rule expressions against a CSV extract.

use std::io;
use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;
use tally_config::Context;
use tally_core::Value;
use tally_engine::{column_total, evaluate_rule_set, generate_column, parse, Expr, RuleError, RuleSet};
use tally_recon::SourceConfig;

use crate::util::{emit_json, read_records};
use crate::CliError;

#[derive(Subcommand)]
pub enum RuleCommands {
    /// Evaluate an expression for every row of a CSV file
    #[command(after_help = "\
Examples:
  tally rule eval 'Amount * -1' deposits.csv
  tally rule eval \"Status == 'void'\" deposits.csv --json
  tally rule eval Amount deposits.csv --filter 'Amount > 0' --total
  tally rule eval Memo deposits.csv --or-else Payee --filter \"Status != 'void'\" --filter 'Amount > 0'")]
    Eval {
        /// Rule expression (column names, literals, arithmetic, comparisons)
        expr: String,

        /// CSV extract with a header row
        csv: PathBuf,

        /// Only evaluate rows for which this rule holds. Repeatable; all must hold.
        #[arg(long, value_name = "EXPR")]
        filter: Vec<String>,

        /// Expression used when the previous ones yield an empty value. Repeatable.
        #[arg(long, value_name = "EXPR", conflicts_with = "total")]
        or_else: Vec<String>,

        /// Print the sum over the (filtered) rows instead of per-row values
        #[arg(long)]
        total: bool,

        /// Output JSON instead of CSV
        #[arg(long)]
        json: bool,

        /// Identifier column
        #[arg(long, default_value = "RecordID")]
        id_column: String,

        /// Date column
        #[arg(long, default_value = "RecordDate")]
        date_column: String,
    },
}

#[derive(Serialize)]
struct RowValue<'a> {
    id: &'a str,
    value: Value,
}

pub fn cmd_rule(cmd: RuleCommands, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        RuleCommands::Eval { expr, csv, filter, or_else, total, json, id_column, date_column } => {
            cmd_rule_eval(ctx, &expr, csv, &filter, &or_else, total, json, id_column, date_column)
        }
    }
}

fn parse_arg(flag: &str, text: &str) -> Result<Expr, CliError> {
    parse(text).map_err(|e| CliError::args(format!("{flag}: {e}")))
}

fn eval_err(e: RuleError) -> CliError {
    match e {
        RuleError::Parse(_) => CliError::args(e.to_string()),
        RuleError::UnknownColumn(_) => {
            CliError::runtime(e.to_string()).with_hint("column names are case-sensitive and must match the CSV header")
        }
        RuleError::Eval(_) => CliError::runtime(e.to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_rule_eval(
    ctx: &Context,
    expr_text: &str,
    csv_path: PathBuf,
    filters: &[String],
    fallbacks: &[String],
    total: bool,
    json_output: bool,
    id_column: String,
    date_column: String,
) -> Result<(), CliError> {
    let expr = parse_arg("expression", expr_text)?;
    let mut exprs = vec![expr];
    for text in fallbacks {
        exprs.push(parse_arg("--or-else", text)?);
    }
    let rules = RuleSet::parse(filters.iter().enumerate().map(|(i, f)| (format!("filter {}", i + 1), f)))
        .map_err(|e| CliError::args(e.to_string()))?;

    let source = SourceConfig {
        name: "input".to_string(),
        record_type: String::new(),
        file: csv_path.display().to_string(),
        id_column,
        date_column,
        reference_column: None,
    };
    let mut records = read_records(&csv_path, &source, ctx)?;

    if !rules.is_empty() {
        let keep = evaluate_rule_set(&records, &rules).map_err(eval_err)?;
        records = records
            .into_iter()
            .zip(keep)
            .filter_map(|(record, keep)| keep.then_some(record))
            .collect();
        log::debug!("{} records pass {} filters", records.len(), rules.len());
    }

    if total {
        let sum = column_total(&records, &exprs[0], None).map_err(eval_err)?;
        let value = Value::Number(sum);
        if json_output {
            return emit_json(&value, true, None);
        }
        println!("{value}");
        return Ok(());
    }

    let column = generate_column(&records, &exprs).map_err(eval_err)?;
    let values: Vec<RowValue> = records
        .iter()
        .zip(column)
        .map(|(record, value)| RowValue { id: &record.id, value })
        .collect();

    if json_output {
        return emit_json(&values, true, None);
    }

    let mut wtr = csv::Writer::from_writer(io::stdout());
    let write = |e: csv::Error| CliError::runtime(format!("cannot write output: {e}"));
    wtr.write_record(["RecordID", "Value"]).map_err(write)?;
    for row in &values {
        wtr.write_record([row.id.to_string(), row.value.to_string()]).map_err(write)?;
    }
    wtr.flush().map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
    Ok(())
}
