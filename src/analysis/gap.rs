//! Market-gap scoring: topics where volume and growth are high but the
//! target publisher's share is low.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::AppSettings;
use crate::models::{Record, TopicDefinition};

use super::overview::topic_overview;

#[derive(Debug, Clone, Serialize)]
pub struct GapOpportunity {
    pub topic_key: String,
    pub topic_name: String,
    pub overall_growth: f64,
    pub target_share: f64,
    pub topic_volume: usize,
    pub opportunity_score: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapReport {
    pub target_publisher: String,
    pub opportunities: Vec<GapOpportunity>,
}

/// Scores each topic as a market gap for `target_publisher`.
///
/// A topic is skipped when its dated volume is below
/// `gap_min_topic_volume`, its overall CAGR is absent or below
/// `gap_min_topic_cagr`, or the target's share exceeds
/// `gap_max_target_share`. Survivors score
/// `growth * (1 - target_share) * ln(volume + 1)`, rewarding high-growth,
/// low-incumbent-share, sufficiently large topics.
#[must_use]
pub fn gap_analysis(
    records_by_topic: &BTreeMap<String, Vec<Record>>,
    target_publisher: &str,
    settings: &AppSettings,
) -> GapReport {
    let target_lower = target_publisher.to_lowercase();
    let mut opportunities: Vec<GapOpportunity> = Vec::new();

    for (key, records) in records_by_topic {
        let overview = topic_overview(records);
        let dated_volume: u64 = overview.per_year.values().sum();
        if dated_volume < settings.gap_min_topic_volume {
            continue;
        }
        let Some(overall_growth) = overview.cagr else {
            continue;
        };
        if overall_growth < settings.gap_min_topic_cagr {
            continue;
        }

        let total = records.len();
        // Raw publisher string, not the "Unknown" display label: a record
        // without a publisher never counts toward the target's share.
        let target_count = records
            .iter()
            .filter(|r| {
                r.publisher
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .contains(&target_lower)
            })
            .count();
        #[allow(clippy::cast_precision_loss)]
        let target_share = if total == 0 {
            0.0
        } else {
            target_count as f64 / total as f64
        };
        if target_share > settings.gap_max_target_share {
            continue;
        }

        #[allow(clippy::cast_precision_loss)]
        let opportunity_score = overall_growth * (1.0 - target_share) * ((total + 1) as f64).ln();
        opportunities.push(GapOpportunity {
            topic_key: key.clone(),
            topic_name: topic_name(&settings.topics, key),
            overall_growth,
            target_share,
            topic_volume: total,
            opportunity_score,
            explanation: format!(
                "High growth ({:.1}%) with low {} share ({:.1}%).",
                overall_growth * 100.0,
                target_publisher,
                target_share * 100.0
            ),
        });
    }

    opportunities.sort_by(|a, b| {
        b.opportunity_score
            .partial_cmp(&a.opportunity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    GapReport {
        target_publisher: target_publisher.to_string(),
        opportunities,
    }
}

fn topic_name(topics: &[TopicDefinition], key: &str) -> String {
    topics
        .iter()
        .find(|t| t.key == key)
        .map_or_else(|| key.to_string(), |t| t.name.clone())
}
