//! Coverage metrics: how much of a record set carries the optional fields
//! the downstream statistics depend on.

use serde::Serialize;

use crate::models::Record;

use super::dates::{accepted_date, published_date};

/// Fractions in `[0, 1]` of records possessing each optional field.
/// Computed fresh per request, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageMetrics {
    pub total_records: usize,
    pub abstract_rate: f64,
    pub affiliation_rate: f64,
    pub accepted_date_rate: f64,
    pub issued_date_rate: f64,
}

/// Computes coverage over a record set. An empty input yields all rates at
/// 0.0, never a division error.
#[must_use]
pub fn coverage_metrics(records: &[Record]) -> CoverageMetrics {
    let total = records.len();
    if total == 0 {
        return CoverageMetrics {
            total_records: 0,
            abstract_rate: 0.0,
            affiliation_rate: 0.0,
            accepted_date_rate: 0.0,
            issued_date_rate: 0.0,
        };
    }

    let mut with_abstract = 0usize;
    let mut with_affiliation = 0usize;
    let mut with_accepted = 0usize;
    let mut with_issued = 0usize;
    for record in records {
        if record
            .abstract_text
            .as_deref()
            .is_some_and(|a| !a.is_empty())
        {
            with_abstract += 1;
        }
        if record.authors.iter().any(|a| !a.affiliation.is_empty()) {
            with_affiliation += 1;
        }
        if accepted_date(record).is_some() {
            with_accepted += 1;
        }
        if published_date(record).is_some() {
            with_issued += 1;
        }
    }

    let rate = |n: usize| {
        #[allow(clippy::cast_precision_loss)]
        let value = n as f64 / total as f64;
        value
    };
    CoverageMetrics {
        total_records: total,
        abstract_rate: rate(with_abstract),
        affiliation_rate: rate(with_affiliation),
        accepted_date_rate: rate(with_accepted),
        issued_date_rate: rate(with_issued),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero_rates() {
        let metrics = coverage_metrics(&[]);
        assert_eq!(metrics.total_records, 0);
        assert_eq!(metrics.abstract_rate, 0.0);
        assert_eq!(metrics.affiliation_rate, 0.0);
        assert_eq!(metrics.accepted_date_rate, 0.0);
        assert_eq!(metrics.issued_date_rate, 0.0);
    }

    #[test]
    fn rates_count_each_field_independently() {
        let records: Vec<Record> = vec![
            serde_json::from_value(serde_json::json!({
                "abstract": "<jats:p>text</jats:p>",
                "author": [{"affiliation": [{"name": "MIT"}]}],
                "issued": {"date-parts": [[2021, 2]]},
                "accepted": {"date-parts": [[2020, 11, 5]]},
            }))
            .unwrap(),
            serde_json::from_value(serde_json::json!({
                "author": [{"affiliation": []}],
            }))
            .unwrap(),
        ];
        let metrics = coverage_metrics(&records);
        assert_eq!(metrics.total_records, 2);
        assert!((metrics.abstract_rate - 0.5).abs() < 1e-12);
        assert!((metrics.affiliation_rate - 0.5).abs() < 1e-12);
        assert!((metrics.accepted_date_rate - 0.5).abs() < 1e-12);
        assert!((metrics.issued_date_rate - 0.5).abs() < 1e-12);
    }
}
