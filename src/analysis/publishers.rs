//! Publisher comparison: per-year volume, market share, and growth for a
//! requested publisher subset.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::Record;

use super::dates::published_date;
use super::growth::span_cagr;

/// Comparison result keyed by the publisher labels observed in the data.
#[derive(Debug, Clone, Serialize)]
pub struct PublisherComparison {
    pub per_publisher_per_year: BTreeMap<String, BTreeMap<i32, u64>>,
    /// Publisher's share of the total volume across all matched publishers,
    /// per year. Years with zero total are omitted.
    pub market_share: BTreeMap<String, BTreeMap<i32, f64>>,
    pub growth: BTreeMap<String, Option<f64>>,
}

/// Compares publishers matched by case-insensitive substring against each
/// record's publisher string. An empty selection compares all publishers.
#[must_use]
pub fn compare_publishers(records: &[Record], selected: &[String]) -> PublisherComparison {
    let selected: Vec<String> = selected.iter().map(|s| s.to_lowercase()).collect();
    let mut by_pub_year: BTreeMap<String, BTreeMap<i32, u64>> = BTreeMap::new();

    for record in records {
        let label = record.publisher_label();
        let label_lower = label.to_lowercase();
        if !selected.is_empty() && !selected.iter().any(|alias| label_lower.contains(alias)) {
            continue;
        }
        let Some(published) = published_date(record) else {
            continue;
        };
        let year = chrono::Datelike::year(&published);
        *by_pub_year
            .entry(label.to_string())
            .or_default()
            .entry(year)
            .or_default() += 1;
    }

    let all_years: std::collections::BTreeSet<i32> = by_pub_year
        .values()
        .flat_map(|years| years.keys().copied())
        .collect();

    let mut market_share: BTreeMap<String, BTreeMap<i32, f64>> = BTreeMap::new();
    for &year in &all_years {
        let total: u64 = by_pub_year
            .values()
            .map(|years| years.get(&year).copied().unwrap_or(0))
            .sum();
        if total == 0 {
            continue;
        }
        for (publisher, years) in &by_pub_year {
            let count = years.get(&year).copied().unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            market_share
                .entry(publisher.clone())
                .or_default()
                .insert(year, count as f64 / total as f64);
        }
    }

    let growth = by_pub_year
        .iter()
        .map(|(publisher, years)| (publisher.clone(), span_cagr(years)))
        .collect();

    PublisherComparison {
        per_publisher_per_year: by_pub_year,
        market_share,
        growth,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(year: i32, publisher: &str) -> Record {
        serde_json::from_value(serde_json::json!({
            "publisher": publisher,
            "issued": {"date-parts": [[year]]},
        }))
        .unwrap()
    }

    #[test]
    fn selection_filters_by_substring_case_insensitive() {
        let records = vec![
            record(2021, "SPIE"),
            record(2021, "Elsevier BV"),
            record(2022, "SPIE"),
        ];
        let result = compare_publishers(&records, &["spie".to_string()]);
        assert_eq!(result.per_publisher_per_year.len(), 1);
        assert_eq!(result.per_publisher_per_year["SPIE"][&2021], 1);
        assert_eq!(result.per_publisher_per_year["SPIE"][&2022], 1);
    }

    #[test]
    fn empty_selection_compares_all_publishers() {
        let records = vec![record(2021, "A"), record(2021, "B")];
        let result = compare_publishers(&records, &[]);
        assert_eq!(result.per_publisher_per_year.len(), 2);
        assert!((result.market_share["A"][&2021] - 0.5).abs() < 1e-12);
        assert!((result.market_share["B"][&2021] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn market_share_sums_to_one_per_year() {
        let records = vec![
            record(2021, "A"),
            record(2021, "A"),
            record(2021, "B"),
            record(2022, "B"),
        ];
        let result = compare_publishers(&records, &[]);
        let total_2021: f64 = result
            .market_share
            .values()
            .filter_map(|years| years.get(&2021))
            .sum();
        assert!((total_2021 - 1.0).abs() < 1e-12);
        // A has no 2022 volume but still gets an explicit zero share.
        assert!((result.market_share["A"][&2022] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn growth_is_absent_for_single_year_publishers() {
        let records = vec![record(2021, "A"), record(2021, "B"), record(2022, "B")];
        let result = compare_publishers(&records, &[]);
        assert_eq!(result.growth["A"], None);
        assert_eq!(result.growth["B"], Some(0.0));
    }
}
