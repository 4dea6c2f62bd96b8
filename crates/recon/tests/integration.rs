use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tally_config::Context;
use tally_core::RecordKind;
use tally_recon::matcher::EXPANDED_WARNING;
use tally_recon::{attach_references, MatchEngine, MatchPass, ReconConfig, ReconError, ReconOptions};

const CONFIG: &str = r#"
name = "March statement"

[primary]
name = "statement"
record_type = "bank_statement"
file = "statement.csv"
reference_column = "ReferenceID"

[[accounts]]
name = "deposits"
record_type = "deposit"
file = "deposits.csv"
subset = "Status != 'void'"

[accounts.rules.Amount]
Column = "DepositAmount"

[accounts.rules.TransactionDate]
Column = "DepositDate"
Expanded = true
Description = "transaction dates do not match"

[[accounts]]
name = "expenses"
record_type = "cash_expense"
file = "expenses.csv"
id_column = "ExpenseID"
date_column = "Posted"

[accounts.rules.Amount]
column = "Total"
"#;

const STATEMENT: &str = "\
RecordID,RecordDate,Amount,TransactionDate,ReferenceID
BS-001,2024-03-01,500.00,2024-03-01,
BS-002,2024-03-01,120.00,2024-03-02,
BS-003,2024-03-02,-80.00,2024-03-02,
BS-004,2024-03-02,999.00,2024-03-02,
BS-005,2024-03-03,42.00,2024-03-03,DP-OLD
";

const DEPOSITS: &str = "\
RecordID,RecordDate,DepositAmount,DepositDate,Status
DP-001,2024-03-01,500.00,2024-03-01,cleared
DP-002,2024-03-01,120.00,2024-03-01,cleared
DP-003,2024-03-01,999.00,2024-03-02,void
";

const EXPENSES: &str = "\
ExpenseID,Posted,Total
EX-001,2024-03-02,-80.00
";

fn matched_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 31)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap()
}

fn write_fixtures(dir: &Path) {
    std::fs::write(dir.join("recon.toml"), CONFIG).unwrap();
    std::fs::write(dir.join("statement.csv"), STATEMENT).unwrap();
    std::fs::write(dir.join("deposits.csv"), DEPOSITS).unwrap();
    std::fs::write(dir.join("expenses.csv"), EXPENSES).unwrap();
}

fn context() -> Context {
    Context::default()
        .with_record_type("bank_statement", RecordKind::Standard)
        .with_record_type("deposit", RecordKind::Deposit)
        .with_record_type("cash_expense", RecordKind::Standard)
}

#[test]
fn reconcile_from_files() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let config = ReconConfig::load(&dir.path().join("recon.toml")).unwrap();
    let ctx = context();
    let engine = MatchEngine::new(&ctx);
    let (mut primary, mut accounts) = engine
        .load_accounts(&config, |file| {
            std::fs::read_to_string(dir.path().join(file)).map_err(|e| ReconError::Io(e.to_string()))
        })
        .unwrap();
    assert_eq!(accounts[0].records[0].kind, RecordKind::Deposit);

    // Strict only: BS-002 differs on the expanded date column
    let strict = engine.reconcile(&primary, &accounts, &ReconOptions::new(matched_at()));
    let pairs: Vec<_> = strict
        .results
        .iter()
        .map(|r| (r.record_id.as_str(), r.reference_id.as_str()))
        .collect();
    assert_eq!(pairs, vec![("BS-001", "DP-001"), ("BS-003", "EX-001")]);
    // BS-004 only matches a voided deposit; BS-005 is already linked
    assert_eq!(strict.unmatched, vec!["BS-002", "BS-004"]);

    // Expanded search picks up BS-002 with a warning
    let options = ReconOptions::new(matched_at()).expanded(true);
    let expanded = engine.reconcile(&primary, &accounts, &options);
    let bs2 = expanded.results.iter().find(|r| r.record_id == "BS-002").unwrap();
    assert_eq!(bs2.reference_id, "DP-002");
    assert_eq!(bs2.pass, MatchPass::Expanded);
    assert_eq!(
        bs2.warning.as_deref(),
        Some(format!("{EXPANDED_WARNING}\n- transaction dates do not match").as_str())
    );
    assert_eq!(expanded.summary.strict, 2);
    assert_eq!(expanded.summary.expanded, 1);
    assert_eq!(expanded.unmatched, vec!["BS-004"]);

    // Reference entries are symmetrical
    let entries = bs2.reference_entries();
    assert_eq!(entries[0].record_id, "BS-002");
    assert_eq!(entries[1].record_id, "DP-002");
    assert_eq!(entries[1].reference_type, "bank_statement");
    let json = serde_json::to_value(&entries[0]).unwrap();
    assert_eq!(json["ReferenceID"], "DP-002");
    assert_eq!(json["IsApproved"], false);

    attach_references(&mut primary.records, &mut accounts, &expanded.results);
    let rerun = engine.reconcile(&primary, &accounts, &options);
    assert!(rerun.results.is_empty());
    assert_eq!(rerun.unmatched, vec!["BS-004"]);
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recon.toml");
    std::fs::write(&path, CONFIG.replace("name = \"expenses\"", "name = \"statement\"")).unwrap();
    let err = ReconConfig::load(&path).unwrap_err();
    assert!(matches!(err, ReconError::ConfigValidation(_)));
}
