//! Journal intelligence: top container titles by volume with publisher
//! labels and per-year series.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Record;

use super::CountedLabels;
use super::dates::published_date;
use super::overview::JournalTrend;

/// Default ranking size.
pub const DEFAULT_TOP_JOURNALS: usize = 15;

#[derive(Debug, Clone, Serialize)]
pub struct JournalIntelligence {
    pub top_journals: Vec<JournalTrend>,
}

/// Ranks the top `top_n` journals by total volume. Every record counts
/// toward volume; only dated records contribute to the per-year series.
/// The publisher label is the most recently observed one for that journal.
#[must_use]
pub fn journal_intelligence(records: &[Record], top_n: usize) -> JournalIntelligence {
    let mut journals = CountedLabels::default();
    let mut publishers: HashMap<String, String> = HashMap::new();
    let mut per_year: HashMap<String, std::collections::BTreeMap<i32, u64>> = HashMap::new();

    for record in records {
        let journal = record.journal_label().to_string();
        journals.add(&journal);
        publishers.insert(journal.clone(), record.publisher_label().to_string());
        if let Some(published) = published_date(record) {
            *per_year
                .entry(journal)
                .or_default()
                .entry(chrono::Datelike::year(&published))
                .or_default() += 1;
        }
    }

    let top_journals = journals
        .top(top_n)
        .into_iter()
        .map(|(name, count)| JournalTrend {
            publisher: publishers
                .get(&name)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            per_year: per_year.get(&name).cloned().unwrap_or_default(),
            name,
            count,
        })
        .collect();

    JournalIntelligence { top_journals }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(journal: &str, publisher: &str, year: Option<i32>) -> Record {
        let mut body = serde_json::json!({
            "container-title": [journal],
            "publisher": publisher,
        });
        if let Some(y) = year {
            body["issued"] = serde_json::json!({"date-parts": [[y]]});
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn ranks_by_total_volume_including_undated() {
        let records = vec![
            record("A", "P1", Some(2021)),
            record("A", "P1", None),
            record("B", "P2", Some(2022)),
        ];
        let intel = journal_intelligence(&records, 15);
        assert_eq!(intel.top_journals[0].name, "A");
        assert_eq!(intel.top_journals[0].count, 2);
        // Undated record is absent from the per-year series.
        assert_eq!(intel.top_journals[0].per_year.values().sum::<u64>(), 1);
    }

    #[test]
    fn publisher_label_is_most_recently_observed() {
        let records = vec![
            record("A", "Old Imprint", Some(2020)),
            record("A", "New Imprint", Some(2022)),
        ];
        let intel = journal_intelligence(&records, 15);
        assert_eq!(intel.top_journals[0].publisher, "New Imprint");
    }

    #[test]
    fn respects_top_n() {
        let records: Vec<Record> = (0..5)
            .map(|i| record(&format!("J{i}"), "P", Some(2021)))
            .collect();
        let intel = journal_intelligence(&records, 3);
        assert_eq!(intel.top_journals.len(), 3);
    }
}
