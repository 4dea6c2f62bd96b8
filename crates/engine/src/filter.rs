//! Table-level rule helpers: subsets, rule sets, default-value columns and
//! summary totals.
//!
//! All helpers evaluate row by row in input order and stop at the first
//! failing row, returning that row's error.

use tally_core::{Record, Value};

use crate::error::RuleError;
use crate::rule::{parse, Expr};

/// Indices of the rows for which `rule` holds.
pub fn subset_indices(records: &[Record], rule: &Expr) -> Result<Vec<usize>, RuleError> {
    let mut keep = Vec::new();
    for (i, record) in records.iter().enumerate() {
        if rule.test_record(record)? {
            keep.push(i);
        }
    }
    Ok(keep)
}

/// Rows for which `rule` holds.
pub fn subset<'a>(records: &'a [Record], rule: &Expr) -> Result<Vec<&'a Record>, RuleError> {
    Ok(subset_indices(records, rule)?
        .into_iter()
        .map(|i| &records[i])
        .collect())
}

/// Named conditions that must all hold.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(String, Expr)>,
}

impl RuleSet {
    pub fn parse<I, N, R>(rules: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = (N, R)>,
        N: Into<String>,
        R: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for (name, text) in rules {
            let name = name.into();
            let expr = parse(text.as_ref())
                .map_err(|e| RuleError::Parse(format!("rule '{name}': {e}")))?;
            parsed.push((name, expr));
        }
        Ok(Self { rules: parsed })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Names of the rules `record` fails, in rule order.
    pub fn failures(&self, record: &Record) -> Result<Vec<&str>, RuleError> {
        let mut failed = Vec::new();
        for (name, expr) in &self.rules {
            if !expr.test_record(record)? {
                failed.push(name.as_str());
            }
        }
        Ok(failed)
    }

    pub fn test(&self, record: &Record) -> Result<bool, RuleError> {
        for (_, expr) in &self.rules {
            if !expr.test_record(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Pass/fail of every row against a rule set.
pub fn evaluate_rule_set(records: &[Record], rules: &RuleSet) -> Result<Vec<bool>, RuleError> {
    records.iter().map(|r| rules.test(r)).collect()
}

/// Default-value column: each row takes the value of the first rule that
/// yields a non-empty value, or `Empty` when none does.
pub fn generate_column(records: &[Record], rules: &[Expr]) -> Result<Vec<Value>, RuleError> {
    let mut column = Vec::with_capacity(records.len());
    for record in records {
        let mut value = Value::Empty;
        for rule in rules {
            let candidate = rule.eval_record(record)?;
            if !candidate.is_empty() {
                value = candidate;
                break;
            }
        }
        column.push(value);
    }
    Ok(column)
}

/// Sum of a numeric expression over the rows passing `filter`. Empty values
/// are skipped.
pub fn column_total(records: &[Record], expr: &Expr, filter: Option<&Expr>) -> Result<f64, RuleError> {
    let mut total = 0.0;
    for record in records {
        if let Some(filter) = filter {
            if !filter.test_record(record)? {
                continue;
            }
        }
        match expr.eval_record(record)? {
            Value::Empty => {}
            Value::Number(n) => total += n,
            other => {
                return Err(RuleError::Eval(format!(
                    "record {}: total of non-numeric value '{other}'",
                    record.id
                )))
            }
        }
    }
    log::debug!("total of {expr} over {} records: {total}", records.len());
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn records() -> Vec<Record> {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        vec![
            Record::new("TX-1", d, "transaction")
                .with_column("Amount", 100.0)
                .with_column("Type", "cash")
                .with_column("Memo", Value::Empty),
            Record::new("TX-2", d, "transaction")
                .with_column("Amount", 40.0)
                .with_column("Type", "check")
                .with_column("Memo", "rent"),
            Record::new("TX-3", d, "transaction")
                .with_column("Amount", Value::Empty)
                .with_column("Type", "cash")
                .with_column("Memo", Value::Empty),
        ]
    }

    #[test]
    fn subset_by_rule() {
        let recs = records();
        let rule = parse("Type == 'cash'").unwrap();
        let ids: Vec<_> = subset(&recs, &rule).unwrap().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["TX-1", "TX-3"]);
    }

    #[test]
    fn subset_propagates_unknown_column() {
        let recs = records();
        let rule = parse("Payee == 'x'").unwrap();
        assert_eq!(subset(&recs, &rule).unwrap_err(), RuleError::UnknownColumn("Payee".into()));
    }

    #[test]
    fn rule_set_all_must_hold() {
        let recs = records();
        let set = RuleSet::parse([("positive", "Amount > 0"), ("cash", "Type = 'cash'")]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(evaluate_rule_set(&recs, &set).unwrap(), vec![true, false, false]);
        assert_eq!(set.failures(&recs[1]).unwrap(), vec!["cash"]);
    }

    #[test]
    fn rule_set_parse_error_names_rule() {
        let err = RuleSet::parse([("bad", "Amount >")]).unwrap_err();
        assert!(err.to_string().contains("rule 'bad'"));
    }

    #[test]
    fn generated_column_takes_first_non_empty() {
        let recs = records();
        let rules = vec![parse("Memo").unwrap(), parse("Type").unwrap()];
        let col = generate_column(&recs, &rules).unwrap();
        assert_eq!(
            col,
            vec![Value::from("cash"), Value::from("rent"), Value::from("cash")]
        );
    }

    #[test]
    fn totals_skip_empty_and_respect_filter() {
        let recs = records();
        let amount = parse("Amount").unwrap();
        assert_eq!(column_total(&recs, &amount, None).unwrap(), 140.0);
        let cash = parse("Type == 'cash'").unwrap();
        assert_eq!(column_total(&recs, &amount, Some(&cash)).unwrap(), 100.0);
        let text = parse("Type").unwrap();
        assert!(column_total(&recs, &text, None).is_err());
    }
}
