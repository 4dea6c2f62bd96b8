use chrono::{NaiveDate, NaiveTime};
use tally_config::Context;
use tally_core::{Record, RecordReference, Value};

use crate::config::{ReconConfig, SourceConfig};
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::matcher::match_record;
use crate::model::{Account, MatchResult, Primary, ReconOptions, ReconReport, SkippedAccount};
use crate::pool::CandidatePool;

pub struct MatchEngine<'a> {
    ctx: &'a Context,
}

impl<'a> MatchEngine<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Match every unlinked primary record against the associated accounts.
    ///
    /// Greedy and single-pass: primary records are visited in input order and
    /// each takes the first qualifying candidate, so both the primary order
    /// and the account order decide ties.
    pub fn reconcile(&self, primary: &Primary, accounts: &[Account], options: &ReconOptions) -> ReconReport {
        log::info!("reconciling account {}", primary.name);
        log::debug!("expanded search is {}", if options.expand { "on" } else { "off" });

        let mut pools = Vec::with_capacity(accounts.len());
        let mut skipped_accounts = Vec::new();
        for account in accounts {
            log::debug!(
                "adding account '{}' ({}) to the candidate pools",
                account.name,
                self.ctx.record_kind(&account.record_type)
            );
            match CandidatePool::build(&primary.records, account) {
                Ok(Some(pool)) => pools.push(pool),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("{e}; account skipped");
                    skipped_accounts.push(SkippedAccount {
                        account: account.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut results = Vec::new();
        let mut unmatched = Vec::new();
        for record in &primary.records {
            if record.is_referenced() {
                continue;
            }
            match match_record(&mut pools, record, options.expand) {
                Some(sel) => {
                    let pool = &pools[sel.pool];
                    results.push(MatchResult {
                        record_id: record.id.clone(),
                        record_type: primary.record_type.clone(),
                        reference_id: pool.row(sel.row).record_id.clone(),
                        reference_account: pool.account.clone(),
                        reference_type: pool.record_type.clone(),
                        matched_at: options.matched_at,
                        warning: sel.warning,
                        pass: sel.pass,
                        ambiguous: sel.ambiguous,
                    });
                }
                None => unmatched.push(record.id.clone()),
            }
        }

        let summary = compute_summary(&results, unmatched.len());
        log::info!(
            "{}: {} matched ({} expanded, {} ambiguous), {} unmatched",
            primary.name,
            results.len(),
            summary.expanded,
            summary.ambiguous,
            summary.unmatched
        );

        ReconReport {
            account: primary.name.clone(),
            summary,
            results,
            unmatched,
            skipped_accounts,
        }
    }

    pub fn load_records(&self, source: &SourceConfig, csv_data: &str) -> Result<Vec<Record>, ReconError> {
        load_csv_records(source, csv_data, self.ctx)
    }

    /// Accounts of a config with their records loaded through `read`, which
    /// maps a configured file name to its CSV text.
    pub fn load_accounts<F>(&self, config: &ReconConfig, mut read: F) -> Result<(Primary, Vec<Account>), ReconError>
    where
        F: FnMut(&str) -> Result<String, ReconError>,
    {
        let primary = Primary {
            name: config.primary.name.clone(),
            record_type: config.primary.record_type.clone(),
            records: self.load_records(&config.primary, &read(&config.primary.file)?)?,
        };

        let mut accounts = Vec::with_capacity(config.accounts.len());
        for account in &config.accounts {
            let source = &account.source;
            accounts.push(Account {
                name: source.name.clone(),
                record_type: source.record_type.clone(),
                rules: account.rules.clone(),
                subset: account.subset.clone(),
                records: self.load_records(source, &read(&source.file)?)?,
            });
        }

        Ok((primary, accounts))
    }
}

/// Write the reference of every result onto both linked records. Returns the
/// number of records updated.
pub fn attach_references(primary: &mut [Record], accounts: &mut [Account], results: &[MatchResult]) -> usize {
    let mut updated = 0;
    for r in results {
        if let Some(record) = primary.iter_mut().find(|rec| rec.id == r.record_id) {
            record.reference = Some(RecordReference {
                reference_id: r.reference_id.clone(),
                reference_type: r.reference_type.clone(),
                reference_date: r.matched_at,
                notes: r.warning.clone(),
            });
            updated += 1;
        }

        let linked = accounts
            .iter_mut()
            .filter(|a| a.name == r.reference_account)
            .flat_map(|a| a.records.iter_mut())
            .find(|rec| rec.id == r.reference_id);
        if let Some(record) = linked {
            record.reference = Some(RecordReference {
                reference_id: r.record_id.clone(),
                reference_type: r.record_type.clone(),
                reference_date: r.matched_at,
                notes: r.warning.clone(),
            });
            updated += 1;
        }
    }
    updated
}

/// Load CSV rows into records, typing cells with the context's date format.
pub fn load_csv_records(source: &SourceConfig, csv_data: &str, ctx: &Context) -> Result<Vec<Record>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, ReconError> {
        headers.iter().position(|h| h == name).ok_or_else(|| ReconError::MissingColumn {
            source: source.name.clone(),
            column: name.into(),
        })
    };

    let id_idx = idx(&source.id_column)?;
    let date_idx = idx(&source.date_column)?;
    let reference_idx = match &source.reference_column {
        Some(column) => Some(idx(column)?),
        None => None,
    };

    let date_format = ctx.chrono_date_format();
    let kind = ctx.record_kind(&source.record_type);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ReconError::Io(e.to_string()))?;

        let id = row.get(id_idx).unwrap_or("").trim().to_string();
        if id.is_empty() {
            log::warn!("'{}': skipping row without an identifier", source.name);
            continue;
        }

        let date_str = row.get(date_idx).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(date_str, &date_format).map_err(|_| ReconError::DateParse {
            source: source.name.clone(),
            record_id: id.clone(),
            value: date_str.into(),
        })?;

        let mut record = Record::new(id.clone(), date, &source.record_type).with_kind(kind);
        for (i, header) in headers.iter().enumerate() {
            if Some(i) == reference_idx {
                continue;
            }
            let value = if i == id_idx {
                Value::Text(id.clone())
            } else if i == date_idx {
                Value::Date(date)
            } else {
                Value::infer(row.get(i).unwrap_or(""), &date_format)
            };
            record.columns.insert(header.clone(), value);
        }

        if let Some(ri) = reference_idx {
            let reference_id = row.get(ri).unwrap_or("").trim();
            if !reference_id.is_empty() {
                record.reference = Some(RecordReference {
                    reference_id: reference_id.to_string(),
                    reference_type: String::new(),
                    reference_date: date.and_time(NaiveTime::MIN),
                    notes: None,
                });
            }
        }

        records.push(record);
    }

    log::debug!("'{}': loaded {} records", source.name, records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssociationRule;
    use crate::model::MatchPass;
    use tally_core::RecordKind;

    fn at() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn source(name: &str, record_type: &str) -> SourceConfig {
        SourceConfig {
            name: name.into(),
            record_type: record_type.into(),
            file: format!("{name}.csv"),
            id_column: "RecordID".into(),
            date_column: "RecordDate".into(),
            reference_column: Some("ReferenceID".into()),
        }
    }

    fn primary(rows: &[(&str, f64)]) -> Primary {
        Primary {
            name: "statement".into(),
            record_type: "bank_statement".into(),
            records: rows
                .iter()
                .map(|(id, amt)| Record::new(*id, d(1), "bank_statement").with_column("Amount", *amt))
                .collect(),
        }
    }

    fn account(name: &str, rows: &[(&str, f64)]) -> Account {
        Account::new(name, "deposit")
            .with_rule("Amount", AssociationRule::strict("Total"))
            .with_records(
                rows.iter()
                    .map(|(id, amt)| Record::new(*id, d(1), "deposit").with_column("Total", *amt))
                    .collect(),
            )
    }

    #[test]
    fn load_csv_basic() {
        let csv = "\
RecordID,RecordDate,Amount,Memo,ReferenceID
BS-001,2024-03-01,\"1,250.00\",rent,
BS-002,2024-03-02,-40,,TX-9
,2024-03-02,1,orphan,
";
        let ctx = Context::default().with_record_type("bank_statement", RecordKind::Standard);
        let records = load_csv_records(&source("statement", "bank_statement"), csv, &ctx).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "BS-001");
        assert_eq!(records[0].get("Amount"), Some(Value::Number(1250.0)));
        assert_eq!(records[0].get("Memo"), Some(Value::from("rent")));
        assert_eq!(records[0].get("RecordDate"), Some(Value::Date(d(1))));
        assert!(!records[0].is_referenced());
        assert_eq!(records[1].get("Memo"), Some(Value::Empty));
        assert_eq!(records[1].reference.as_ref().unwrap().reference_id, "TX-9");
        assert!(!records[1].has_column("ReferenceID"));
    }

    #[test]
    fn load_csv_errors() {
        let ctx = Context::default();
        let missing = load_csv_records(&source("statement", "bank_statement"), "RecordID,Amount\n", &ctx);
        assert!(matches!(missing.unwrap_err(), ReconError::MissingColumn { .. }));

        let bad_date = "RecordID,RecordDate,ReferenceID\nBS-1,03/01/2024,\n";
        let err = load_csv_records(&source("statement", "bank_statement"), bad_date, &ctx).unwrap_err();
        assert!(matches!(err, ReconError::DateParse { .. }));
    }

    #[test]
    fn each_candidate_is_used_once() {
        let ctx = Context::default();
        let engine = MatchEngine::new(&ctx);
        let p = primary(&[("BS-1", 50.0), ("BS-2", 50.0), ("BS-3", 50.0)]);
        let a = account("deposits", &[("DP-1", 50.0), ("DP-2", 50.0)]);

        let report = engine.reconcile(&p, &[a], &ReconOptions::new(at()));
        let refs: Vec<_> = report.results.iter().map(|r| r.reference_id.as_str()).collect();
        assert_eq!(refs, vec!["DP-1", "DP-2"]);
        assert_eq!(report.unmatched, vec!["BS-3"]);
        assert_eq!(report.summary.ambiguous, 1);
        assert_eq!(report.summary.unmatched, 1);
    }

    #[test]
    fn account_order_breaks_ties() {
        let ctx = Context::default();
        let engine = MatchEngine::new(&ctx);
        let p = primary(&[("BS-1", 75.0)]);
        let first = account("first", &[("A-1", 75.0)]);
        let second = account("second", &[("B-1", 75.0)]);

        let report = engine.reconcile(&p, &[second.clone(), first.clone()], &ReconOptions::new(at()));
        assert_eq!(report.results[0].reference_account, "second");
        assert!(report.results[0].ambiguous);

        let report = engine.reconcile(&p, &[first, second], &ReconOptions::new(at()));
        assert_eq!(report.results[0].reference_account, "first");
    }

    #[test]
    fn primary_order_decides_greedy_outcome() {
        let ctx = Context::default();
        let engine = MatchEngine::new(&ctx);
        let row = |id: &str, day: u32| {
            Record::new(id, d(1), "bank_statement")
                .with_column("Amount", 50.0)
                .with_column("TransactionDate", d(day))
        };
        let deposits = Account::new("deposits", "deposit")
            .with_rule("Amount", AssociationRule::strict("Total"))
            .with_rule(
                "TransactionDate",
                AssociationRule::expanded("Posted", "transaction dates do not match"),
            )
            .with_records(vec![Record::new("DP-1", d(1), "deposit")
                .with_column("Total", 50.0)
                .with_column("Posted", d(3))]);
        let options = ReconOptions::new(at()).expanded(true);

        // BS-1 only qualifies through the expanded pass but comes first
        let mut p = Primary {
            name: "statement".into(),
            record_type: "bank_statement".into(),
            records: vec![row("BS-1", 2), row("BS-2", 3)],
        };
        let report = engine.reconcile(&p, std::slice::from_ref(&deposits), &options);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].record_id, "BS-1");
        assert_eq!(report.results[0].pass, MatchPass::Expanded);
        assert_eq!(report.unmatched, vec!["BS-2"]);

        p.records.reverse();
        let report = engine.reconcile(&p, &[deposits], &options);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].record_id, "BS-2");
        assert_eq!(report.results[0].pass, MatchPass::Strict);
        assert_eq!(report.unmatched, vec!["BS-1"]);
    }

    #[test]
    fn failing_subset_skips_only_that_account() {
        let ctx = Context::default();
        let engine = MatchEngine::new(&ctx);
        let p = primary(&[("BS-1", 10.0)]);
        let broken = account("broken", &[("X-1", 10.0)]).with_subset("NoSuchColumn == 1");
        let good = account("good", &[("G-1", 10.0)]);

        let report = engine.reconcile(&p, &[broken, good], &ReconOptions::new(at()));
        assert_eq!(report.skipped_accounts.len(), 1);
        assert_eq!(report.skipped_accounts[0].account, "broken");
        assert_eq!(report.results[0].reference_id, "G-1");
    }

    #[test]
    fn linked_primary_records_are_skipped() {
        let ctx = Context::default();
        let engine = MatchEngine::new(&ctx);
        let mut p = primary(&[("BS-1", 10.0), ("BS-2", 20.0)]);
        let mut accounts = vec![account("deposits", &[("DP-1", 10.0), ("DP-2", 20.0)])];

        let options = ReconOptions::new(at());
        let first = engine.reconcile(&p, &accounts, &options);
        assert_eq!(first.summary.strict, 2);

        let updated = attach_references(&mut p.records, &mut accounts, &first.results);
        assert_eq!(updated, 4);
        assert_eq!(p.records[0].reference.as_ref().unwrap().reference_id, "DP-1");
        let back = accounts[0].records[0].reference.as_ref().unwrap();
        assert_eq!(back.reference_id, "BS-1");
        assert_eq!(back.reference_type, "bank_statement");
        assert_eq!(back.reference_date, at());

        // A second run finds nothing left to do
        let second = engine.reconcile(&p, &accounts, &options);
        assert!(second.results.is_empty());
        assert!(second.unmatched.is_empty());
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let ctx = Context::default();
        let engine = MatchEngine::new(&ctx);
        let p = primary(&[("BS-1", 10.0), ("BS-2", 10.0)]);
        let accounts = vec![account("deposits", &[("DP-1", 10.0), ("DP-2", 10.0)])];
        let options = ReconOptions::new(at()).expanded(true);

        let a = engine.reconcile(&p, &accounts, &options);
        let b = engine.reconcile(&p, &accounts, &options);
        assert_eq!(a.results, b.results);
        assert!(a.results.iter().all(|r| r.pass == MatchPass::Strict));
    }
}
