// Candidate pools - one arena of projected rows per associated account.
// Rows are addressed by index; a consumed row is never offered again.

use tally_core::{Record, Value};
use tally_engine::rule::parse;

use crate::error::ReconError;
use crate::model::{Account, MatchPass};

/// One usable association rule, resolved against the loaded data.
#[derive(Debug, Clone)]
pub struct PoolColumn {
    /// Primary account column name.
    pub local: String,
    /// Associated account column name.
    pub remote: String,
    pub expanded: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub record_id: String,
    /// Values in `CandidatePool::columns` order.
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct CandidatePool {
    pub account: String,
    pub record_type: String,
    pub columns: Vec<PoolColumn>,
    rows: Vec<Candidate>,
    consumed: Vec<bool>,
}

impl CandidatePool {
    /// Build the pool for `account`. `Ok(None)` when the account has no
    /// records or none of its rules can be applied.
    pub fn build(primary: &[Record], account: &Account) -> Result<Option<Self>, ReconError> {
        if account.records.is_empty() {
            log::debug!("account '{}' has no records to match against", account.name);
            return Ok(None);
        }

        let mut columns = Vec::new();
        for (local, rule) in &account.rules {
            if !primary.iter().any(|r| r.has_column(local)) {
                log::warn!(
                    "association rule column '{local}' is missing from the primary account data; rule dropped"
                );
                continue;
            }
            if !account.records.iter().any(|r| r.has_column(&rule.column)) {
                log::warn!(
                    "association rule reference column '{}' is missing from account '{}' data; rule dropped",
                    rule.column,
                    account.name
                );
                continue;
            }
            columns.push(PoolColumn {
                local: local.clone(),
                remote: rule.column.clone(),
                expanded: rule.expanded,
                description: rule.description.clone(),
            });
        }

        if columns.is_empty() {
            log::warn!("account '{}' has no usable association rules; skipped", account.name);
            return Ok(None);
        }

        let subset = match &account.subset {
            Some(text) => Some(parse(text).map_err(|error| ReconError::Rule {
                account: account.name.clone(),
                error,
            })?),
            None => None,
        };

        let mut rows = Vec::new();
        let mut already_linked = 0;
        for record in &account.records {
            if record.is_referenced() {
                already_linked += 1;
                continue;
            }
            if let Some(rule) = &subset {
                let keep = rule.test_record(record).map_err(|error| ReconError::Rule {
                    account: account.name.clone(),
                    error,
                })?;
                if !keep {
                    continue;
                }
            }
            let values = columns
                .iter()
                .map(|c| record.get(&c.remote).unwrap_or(Value::Empty))
                .collect();
            rows.push(Candidate {
                record_id: record.id.clone(),
                values,
            });
        }

        log::debug!(
            "account '{}': {} candidates ({already_linked} already linked)",
            account.name,
            rows.len()
        );

        let consumed = vec![false; rows.len()];
        Ok(Some(Self {
            account: account.name.clone(),
            record_type: account.record_type.clone(),
            columns,
            rows,
            consumed,
        }))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn available(&self) -> usize {
        self.consumed.iter().filter(|c| !**c).count()
    }

    pub fn row(&self, index: usize) -> &Candidate {
        &self.rows[index]
    }

    pub fn is_consumed(&self, index: usize) -> bool {
        self.consumed[index]
    }

    /// Mark a row as matched. Returns false if it already was.
    pub fn consume(&mut self, index: usize) -> bool {
        !std::mem::replace(&mut self.consumed[index], true)
    }

    /// Indices into `columns` compared in the given pass.
    pub fn compared_columns(&self, pass: MatchPass) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| pass == MatchPass::Strict || !c.expanded)
            .map(|(i, _)| i)
            .collect()
    }

    /// Rows still available whose compared columns all match `values`
    /// (primary values in `columns` order).
    pub fn candidates(&self, values: &[Value], pass: MatchPass) -> Vec<usize> {
        let compared = self.compared_columns(pass);
        if compared.is_empty() {
            return Vec::new();
        }
        (0..self.rows.len())
            .filter(|&i| !self.consumed[i])
            .filter(|&i| compared.iter().all(|&c| values[c].matches(&self.rows[i].values[c])))
            .collect()
    }
}
