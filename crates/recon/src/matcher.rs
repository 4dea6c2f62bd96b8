use tally_core::{Record, Value};

use crate::model::MatchPass;
use crate::pool::CandidatePool;

/// First line of the warning attached to every expanded-search match.
pub const EXPANDED_WARNING: &str =
    "Potential false positive: the association is the result of an expanded search";

/// The candidate chosen for one primary record.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub pool: usize,
    pub row: usize,
    pub pass: MatchPass,
    pub ambiguous: bool,
    pub warning: Option<String>,
}

/// Primary values in the order of `pool.columns`.
fn primary_values(record: &Record, pool: &CandidatePool) -> Vec<Value> {
    pool.columns
        .iter()
        .map(|c| record.get(&c.local).unwrap_or(Value::Empty))
        .collect()
}

/// Candidates across every pool, in account order then row order.
pub fn search(pools: &[CandidatePool], record: &Record, pass: MatchPass) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    for (p, pool) in pools.iter().enumerate() {
        let values = primary_values(record, pool);
        found.extend(pool.candidates(&values, pass).into_iter().map(|row| (p, row)));
    }
    found
}

/// Warning for an expanded match: the fixed notice plus one line per
/// expanded column on which the two records disagree.
fn expanded_warning(record: &Record, pool: &CandidatePool, row: usize) -> String {
    let values = primary_values(record, pool);
    let candidate = pool.row(row);

    let mut lines = vec![EXPANDED_WARNING.to_string()];
    for (i, column) in pool.columns.iter().enumerate() {
        if !column.expanded || values[i].matches(&candidate.values[i]) {
            continue;
        }
        match &column.description {
            Some(description) => lines.push(format!("- {description}")),
            None => log::warn!(
                "no description provided for expanded association rule '{}' of account '{}'",
                column.local,
                pool.account
            ),
        }
    }
    lines.join("\n")
}

/// Greedy match of one primary record: strict pass first, then (with
/// `expand`) the expanded pass. The chosen candidate is consumed.
pub fn match_record(pools: &mut [CandidatePool], record: &Record, expand: bool) -> Option<Selection> {
    let mut pass = MatchPass::Strict;
    let mut found = search(pools, record, pass);
    if found.is_empty() && expand {
        pass = MatchPass::Expanded;
        found = search(pools, record, pass);
    }

    let &(pool, row) = found.first()?;
    let ambiguous = found.len() > 1;
    if ambiguous {
        log::warn!(
            "found {} {pass} candidates for record '{}'; using '{}' from account '{}'",
            found.len(),
            record.id,
            pools[pool].row(row).record_id,
            pools[pool].account
        );
    }

    let warning = match pass {
        MatchPass::Strict => None,
        MatchPass::Expanded => Some(expanded_warning(record, &pools[pool], row)),
    };

    log::debug!(
        "associating {} record '{}' to record '{}' ({pass})",
        pools[pool].account,
        pools[pool].row(row).record_id,
        record.id
    );
    pools[pool].consume(row);

    Some(Selection {
        pool,
        row,
        pass,
        ambiguous,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssociationRule;
    use crate::model::Account;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn statement_row(id: &str, amount: f64, day: u32) -> Record {
        Record::new(id, d(1), "bank_statement")
            .with_column("Amount", amount)
            .with_column("TransactionDate", d(day))
    }

    fn deposit_row(id: &str, amount: f64, day: u32) -> Record {
        Record::new(id, d(1), "deposit")
            .with_column("DepositAmount", amount)
            .with_column("DepositDate", d(day))
    }

    fn pools(rows: Vec<Record>, primary: &[Record]) -> Vec<CandidatePool> {
        let account = Account::new("deposits", "deposit")
            .with_rule("Amount", AssociationRule::strict("DepositAmount"))
            .with_rule(
                "TransactionDate",
                AssociationRule::expanded("DepositDate", "transaction dates do not match"),
            )
            .with_records(rows);
        vec![CandidatePool::build(primary, &account).unwrap().unwrap()]
    }

    #[test]
    fn strict_match_has_no_warning() {
        let primary = vec![statement_row("BS-1", 50.0, 2)];
        let mut p = pools(vec![deposit_row("DP-1", 50.0, 2)], &primary);
        let sel = match_record(&mut p, &primary[0], false).unwrap();
        assert_eq!(sel.pass, MatchPass::Strict);
        assert!(!sel.ambiguous);
        assert_eq!(sel.warning, None);
        assert!(p[0].is_consumed(0));
    }

    #[test]
    fn no_candidates_without_expand() {
        let primary = vec![statement_row("BS-1", 50.0, 2)];
        let mut p = pools(vec![deposit_row("DP-1", 50.0, 3)], &primary);
        assert_eq!(match_record(&mut p, &primary[0], false), None);
        assert_eq!(p[0].available(), 1);
    }

    #[test]
    fn expanded_match_warns_with_description() {
        let primary = vec![statement_row("BS-1", 50.0, 2)];
        let mut p = pools(vec![deposit_row("DP-1", 50.0, 3)], &primary);
        let sel = match_record(&mut p, &primary[0], true).unwrap();
        assert_eq!(sel.pass, MatchPass::Expanded);
        assert_eq!(
            sel.warning.as_deref(),
            Some(
                "Potential false positive: the association is the result of an expanded search\n\
                 - transaction dates do not match"
            )
        );
    }

    #[test]
    fn ambiguous_takes_first_in_pool_order() {
        let primary = vec![statement_row("BS-1", 50.0, 2)];
        let mut p = pools(
            vec![deposit_row("DP-1", 50.0, 2), deposit_row("DP-2", 50.0, 2)],
            &primary,
        );
        let sel = match_record(&mut p, &primary[0], false).unwrap();
        assert!(sel.ambiguous);
        assert_eq!(p[0].row(sel.row).record_id, "DP-1");
        assert_eq!(p[0].available(), 1);
    }
}
