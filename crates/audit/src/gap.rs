// Gap detection - infers which identifiers of an audit period were never
// recorded, from the sequence of identifiers that were.

use std::collections::BTreeSet;
use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tally_core::{Record, RecordKind};

use crate::schema::IdentifierSchema;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Identifiers known for one audit period.
///
/// Lists are re-sorted by the detector; callers may pass them in any order.
#[derive(Debug, Clone, Default)]
pub struct GapInput {
    pub period_date: Option<NaiveDate>,
    /// Identifiers recorded on the audit date.
    pub current_ids: Vec<String>,
    /// Identifiers already queued for import. Never reported as missing.
    pub existing_imports: BTreeSet<String>,
    /// Identifiers of the most recent earlier date.
    pub prior_period_last_ids: Vec<String>,
    /// Every identifier on the audit date, including ones created after the
    /// current extract was taken.
    pub end_of_period_superset: Vec<String>,
}

impl GapInput {
    pub fn new(period_date: NaiveDate, current_ids: Vec<String>) -> Self {
        Self {
            period_date: Some(period_date),
            current_ids,
            ..Self::default()
        }
    }

    pub fn with_existing_imports<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.existing_imports = ids.into_iter().collect();
        self
    }

    pub fn with_prior_period<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.prior_period_last_ids = ids.into_iter().collect();
        self
    }

    pub fn with_superset<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.end_of_period_superset = ids.into_iter().collect();
        self
    }

    /// Build the input from loaded records: current ids are the records on
    /// `period_date`, prior ids the records on the latest earlier date.
    /// Without a separate superset the current records stand in for it.
    pub fn from_records(
        period_date: NaiveDate,
        records: &[Record],
        existing_imports: &[Record],
        superset: Option<&[Record]>,
    ) -> Self {
        let on = |records: &[Record], date: NaiveDate| -> Vec<String> {
            records
                .iter()
                .filter(|r| r.date == date)
                .map(|r| r.id.clone())
                .collect()
        };

        let current_ids = on(records, period_date);
        let prior_date = records.iter().map(|r| r.date).filter(|d| *d < period_date).max();
        let prior = match prior_date {
            Some(date) => {
                log::info!("most recent date prior to {period_date} is {date}");
                on(records, date)
            }
            None => {
                log::warn!("no date found prior to audit date {period_date}");
                Vec::new()
            }
        };
        let superset = match superset {
            Some(rows) => on(rows, period_date),
            None => current_ids.clone(),
        };

        Self::new(period_date, current_ids)
            .with_existing_imports(existing_imports.iter().map(|r| r.id.clone()))
            .with_prior_period(prior)
            .with_superset(superset)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Detection step that found a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSource {
    /// Between the prior period's last identifier and the anchor.
    CrossPeriod,
    /// Skipped number inside the current period.
    IntraPeriod,
    /// Created after the last identifier of the current extract.
    EndOfPeriod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub id: String,
    pub number: u64,
    pub source: GapSource,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GapReport {
    pub period_date: Option<NaiveDate>,
    /// First conforming identifier of the period.
    pub anchor: Option<String>,
    /// Predecessor found in the prior period.
    pub predecessor: Option<String>,
    pub gaps: Vec<Gap>,
    /// Identifiers excluded for not matching the schema.
    pub nonconforming: Vec<String>,
}

impl GapReport {
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn missing_ids(&self) -> Vec<&str> {
        self.gaps.iter().map(|g| g.id.as_str()).collect()
    }

    pub fn count(&self, source: GapSource) -> usize {
        self.gaps.iter().filter(|g| g.source == source).count()
    }

    /// Create a record for every missing identifier.
    pub fn materialize<F>(&self, mut create: F) -> Vec<Record>
    where
        F: FnMut(&Gap) -> Record,
    {
        self.gaps.iter().map(|g| create(g)).collect()
    }

    /// Placeholder records dated on the audit date.
    pub fn stubs(&self, record_type: &str, kind: RecordKind) -> Vec<Record> {
        let Some(date) = self.period_date else {
            return Vec::new();
        };
        self.materialize(|g| Record::stub(g.id.clone(), date, record_type, kind))
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

pub struct GapDetector<'a> {
    schema: &'a IdentifierSchema,
}

struct Collector<'i> {
    known: HashSet<&'i str>,
    imports: &'i BTreeSet<String>,
    seen: HashSet<String>,
    gaps: Vec<Gap>,
}

impl<'i> Collector<'i> {
    fn is_known(&self, id: &str) -> bool {
        self.known.contains(id) || self.imports.contains(id)
    }

    fn push(&mut self, id: String, number: u64, source: GapSource) -> bool {
        if self.is_known(&id) || !self.seen.insert(id.clone()) {
            return false;
        }
        self.gaps.push(Gap { id, number, source });
        true
    }
}

impl<'a> GapDetector<'a> {
    pub fn new(schema: &'a IdentifierSchema) -> Self {
        Self { schema }
    }

    pub fn detect(&self, input: &GapInput) -> GapReport {
        let schema = self.schema;

        let mut current: Vec<&str> = input.current_ids.iter().map(String::as_str).collect();
        current.sort_unstable();
        current.dedup();

        let mut report = GapReport {
            period_date: input.period_date,
            ..GapReport::default()
        };

        // Anchor: first conforming identifier of the period
        let mut anchor = None;
        for (i, id) in current.iter().enumerate() {
            match schema.decompose(id) {
                Some((number, date)) => {
                    anchor = Some((i, number, date));
                    break;
                }
                None => {
                    log::warn!("identifier '{id}' does not conform to '{}'", schema.template());
                    report.nonconforming.push(id.to_string());
                }
            }
        }
        // Without an anchor there is no date cycle to check the tail against
        let Some((start, n0, d0)) = anchor else {
            log::info!("no conforming identifiers in period; nothing to audit");
            return report;
        };
        report.anchor = Some(current[start].to_string());
        log::debug!("first transaction ID is {}", current[start]);

        let mut out = Collector {
            known: current.iter().copied().collect(),
            imports: &input.existing_imports,
            seen: HashSet::new(),
            gaps: Vec::new(),
        };

        // Cross-period: numbers between the prior period's last id and the anchor
        let mut prior: Vec<&str> = input.prior_period_last_ids.iter().map(String::as_str).collect();
        prior.sort_unstable_by(|a, b| b.cmp(a));
        let predecessor = prior.iter().find_map(|id| match schema.decompose(id) {
            Some((n, _)) if n > n0 => None,
            Some((n, date)) => Some((*id, n, date)),
            None => {
                log::warn!("inconsistent format found in previous record ID '{id}'");
                None
            }
        });
        if let Some((pred_id, pred_n, pred_date)) = predecessor {
            report.predecessor = Some(pred_id.to_string());
            let range = if pred_date != d0 { 1..n0 } else { pred_n + 1..n0 };
            let mut found = 0;
            for k in range {
                if out.push(schema.format_raw(k, d0), k, GapSource::CrossPeriod) {
                    found += 1;
                }
            }
            log::debug!("found {found} skipped identifiers between {pred_id} and {}", current[start]);
        }

        // Intra-period: skipped numbers after the anchor
        let mut expected = n0;
        let mut found = 0;
        for id in &current[start..] {
            let Some((n, _)) = schema.decompose(id) else {
                log::warn!("identifier '{id}' does not conform to '{}'", schema.template());
                report.nonconforming.push(id.to_string());
                continue;
            };
            for k in expected..n {
                if out.push(schema.format_raw(k, d0), k, GapSource::IntraPeriod) {
                    found += 1;
                }
            }
            expected = n + 1;
        }
        log::debug!("found {found} skipped identifiers within the period");

        // End of period: identifiers created after the extract's last id
        if let Some(cursor) = current.last() {
            let mut superset: Vec<&str> = input.end_of_period_superset.iter().map(String::as_str).collect();
            superset.sort_unstable_by(|a, b| b.cmp(a));
            for id in superset {
                if id == *cursor {
                    break;
                }
                match schema.decompose(id) {
                    Some((n, date)) if date == d0 => {
                        out.push(id.to_string(), n, GapSource::EndOfPeriod);
                    }
                    Some(_) => {}
                    None => log::warn!("identifier '{id}' does not conform to '{}'", schema.template()),
                }
            }
        }

        report.gaps = out.gaps;
        log::info!("{} potentially missing identifiers", report.gaps.len());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> IdentifierSchema {
        IdentifierSchema::compile("{RV}{YYYY-MM}-{000}").unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ids(schema: &IdentifierSchema, date: &str, numbers: &[u64]) -> Vec<String> {
        numbers.iter().map(|n| schema.format_raw(*n, date)).collect()
    }

    #[test]
    fn intra_period_gap() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 5), ids(&s, "2024-03", &[1, 3, 4]));
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.missing_ids(), vec!["RV2024-03-002"]);
        assert_eq!(report.gaps[0].source, GapSource::IntraPeriod);
        assert_eq!(report.anchor.as_deref(), Some("RV2024-03-001"));
    }

    #[test]
    fn new_month_after_prior_period_has_no_gap() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 1), ids(&s, "2024-03", &[1, 2]))
            .with_prior_period(ids(&s, "2024-02", &[57, 58]));
        let report = GapDetector::new(&s).detect(&input);
        assert!(report.is_empty(), "{:?}", report.gaps);
        // Prior numbers above the anchor are never a predecessor
        assert_eq!(report.predecessor, None);
    }

    #[test]
    fn new_month_missing_first_numbers() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 1), ids(&s, "2024-03", &[3, 4]))
            .with_prior_period(ids(&s, "2024-02", &[1, 2]));
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.predecessor.as_deref(), Some("RV2024-02-002"));
        assert_eq!(report.missing_ids(), vec!["RV2024-03-001", "RV2024-03-002"]);
        assert_eq!(report.count(GapSource::CrossPeriod), 2);
    }

    #[test]
    fn same_month_cross_period_gap_skips_larger_prior_numbers() {
        let s = schema();
        // 40 belongs to a later batch and is skipped when looking for the predecessor
        let input = GapInput::new(d(2024, 3, 6), ids(&s, "2024-03", &[15, 16]))
            .with_prior_period(ids(&s, "2024-03", &[11, 12, 40]));
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.predecessor.as_deref(), Some("RV2024-03-012"));
        assert_eq!(report.missing_ids(), vec!["RV2024-03-013", "RV2024-03-014"]);
    }

    #[test]
    fn existing_imports_are_not_double_counted() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 5), ids(&s, "2024-03", &[1, 4]))
            .with_existing_imports(ids(&s, "2024-03", &[2]));
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.missing_ids(), vec!["RV2024-03-003"]);
    }

    #[test]
    fn nonconforming_ids_are_excluded() {
        let s = schema();
        let mut current = ids(&s, "2024-03", &[1, 2, 3]);
        current.push("RV2024-03-00X".to_string());
        current.push("garbage".to_string());
        let input = GapInput::new(d(2024, 3, 5), current);
        let report = GapDetector::new(&s).detect(&input);
        assert!(report.is_empty());
        assert_eq!(report.nonconforming.len(), 2);
    }

    #[test]
    fn nonconforming_id_inside_the_run_does_not_advance_the_walk() {
        let s = schema();
        // Sorts between 001 and 003
        let mut current = ids(&s, "2024-03", &[1, 3]);
        current.push("RV2024-03-002x".to_string());
        let report = GapDetector::new(&s).detect(&GapInput::new(d(2024, 3, 5), current));
        assert_eq!(report.missing_ids(), vec!["RV2024-03-002"]);
        assert_eq!(report.gaps[0].source, GapSource::IntraPeriod);
        assert_eq!(report.nonconforming, vec!["RV2024-03-002x"]);
    }

    #[test]
    fn no_anchor_skips_the_tail_scan() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 5), vec!["RV-LATE".to_string()])
            .with_superset(ids(&s, "2024-03", &[1, 2]));
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.anchor, None);
        assert!(report.is_empty());
        assert_eq!(report.nonconforming, vec!["RV-LATE"]);
    }

    #[test]
    fn tail_scan_finds_late_records() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 5), ids(&s, "2024-03", &[1, 2]))
            .with_superset(ids(&s, "2024-03", &[1, 2, 3, 4]))
            .with_existing_imports(ids(&s, "2024-03", &[4]));
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.missing_ids(), vec!["RV2024-03-003"]);
        assert_eq!(report.gaps[0].source, GapSource::EndOfPeriod);
    }

    #[test]
    fn empty_and_single_inputs() {
        let s = schema();
        let empty = GapInput::new(d(2024, 3, 5), Vec::new());
        assert!(GapDetector::new(&s).detect(&empty).is_empty());

        let single = GapInput::new(d(2024, 3, 5), ids(&s, "2024-03", &[9]));
        let report = GapDetector::new(&s).detect(&single);
        assert!(report.is_empty());
        assert_eq!(report.anchor.as_deref(), Some("RV2024-03-009"));
    }

    #[test]
    fn unsorted_input_is_sorted() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 5), ids(&s, "2024-03", &[5, 1, 3]));
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.missing_ids(), vec!["RV2024-03-002", "RV2024-03-004"]);
    }

    #[test]
    fn stubs_for_missing_ids() {
        let s = schema();
        let input = GapInput::new(d(2024, 3, 5), ids(&s, "2024-03", &[1, 3]));
        let report = GapDetector::new(&s).detect(&input);
        let stubs = report.stubs("receipt", RecordKind::Standard);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].id, "RV2024-03-002");
        assert_eq!(stubs[0].date, d(2024, 3, 5));
        assert_eq!(stubs[0].record_type, "receipt");

        let custom = report.materialize(|g| {
            Record::new(g.id.clone(), d(2024, 3, 5), "receipt").with_column("Number", g.number as f64)
        });
        assert_eq!(custom[0].get("Number"), Some(tally_core::Value::Number(2.0)));
    }

    #[test]
    fn from_records_picks_prior_date() {
        let s = schema();
        let row = |id: &str, date: NaiveDate| Record::new(id, date, "receipt");
        let records = vec![
            row("RV2024-03-001", d(2024, 3, 1)),
            row("RV2024-03-002", d(2024, 3, 4)),
            row("RV2024-03-003", d(2024, 3, 4)),
            row("RV2024-03-006", d(2024, 3, 5)),
            row("RV2024-03-007", d(2024, 3, 5)),
        ];
        let input = GapInput::from_records(d(2024, 3, 5), &records, &[], None);
        assert_eq!(input.prior_period_last_ids, vec!["RV2024-03-002", "RV2024-03-003"]);
        let report = GapDetector::new(&s).detect(&input);
        assert_eq!(report.missing_ids(), vec!["RV2024-03-004", "RV2024-03-005"]);
    }
}
