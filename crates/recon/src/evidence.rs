use crate::model::{MatchPass, MatchResult, ReconSummary};

/// Compute summary statistics from match results.
pub fn compute_summary(results: &[MatchResult], unmatched: usize) -> ReconSummary {
    let mut summary = ReconSummary {
        total: results.len() + unmatched,
        unmatched,
        ..ReconSummary::default()
    };

    for r in results {
        match r.pass {
            MatchPass::Strict => summary.strict += 1,
            MatchPass::Expanded => summary.expanded += 1,
        }
        if r.ambiguous {
            summary.ambiguous += 1;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn result(pass: MatchPass, ambiguous: bool) -> MatchResult {
        MatchResult {
            record_id: "BS-1".into(),
            record_type: "bank_statement".into(),
            reference_id: "DP-1".into(),
            reference_account: "deposits".into(),
            reference_type: "deposit".into(),
            matched_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            warning: None,
            pass,
            ambiguous,
        }
    }

    #[test]
    fn summary_counts() {
        let results = vec![
            result(MatchPass::Strict, false),
            result(MatchPass::Strict, true),
            result(MatchPass::Expanded, false),
        ];
        let summary = compute_summary(&results, 2);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.strict, 2);
        assert_eq!(summary.expanded, 1);
        assert_eq!(summary.ambiguous, 1);
        assert_eq!(summary.unmatched, 2);
    }
}
