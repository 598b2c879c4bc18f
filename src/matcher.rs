//! Topic and ad-hoc relevance matching.
//!
//! Relevance is a deliberate substring heuristic, not NLP: a topic's positive
//! terms (keywords plus synonyms) and negative terms are counted as distinct
//! case-folded substring hits over the record text, and the asymmetric
//! weighting lets a single negative hit veto a weak positive match.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{Record, TopicDefinition};

#[allow(clippy::expect_used)]
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]+>").expect("tag regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\w+").expect("word regex is valid") // Static pattern, safe to panic
});

/// Weight of one distinct positive-term hit.
const POSITIVE_WEIGHT: f64 = 2.0;

/// Weight of one distinct negative-term hit. Heavier than the positive
/// weight so one negative hit outweighs one positive hit.
const NEGATIVE_WEIGHT: f64 = 2.5;

/// Outcome of scoring one text. `matched` gates inclusion; `score` is
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    pub score: f64,
    pub positive_hits: usize,
    pub negative_hits: usize,
}

/// A compiled topic vocabulary ready for repeated scoring.
#[derive(Debug, Clone)]
pub struct TopicMatcher {
    positives: Vec<String>,
    negatives: Vec<String>,
}

impl TopicMatcher {
    /// Compiles the topic's keyword, synonym, and negative-keyword lists
    /// into case-folded term sets.
    #[must_use]
    pub fn new(topic: &TopicDefinition) -> Self {
        let positives = topic
            .keywords
            .iter()
            .chain(topic.synonyms.iter())
            .map(|term| term.to_lowercase())
            .collect();
        let negatives = topic
            .negative_keywords
            .iter()
            .map(|term| term.to_lowercase())
            .collect();
        Self {
            positives,
            negatives,
        }
    }

    /// Scores free text against the compiled vocabulary.
    ///
    /// `score = 2.0 * positive_hits - 2.5 * negative_hits`; a text matches
    /// only when it has at least one positive hit AND a positive score, so
    /// heavy negative signal rejects a text despite positive hits.
    #[must_use]
    pub fn score_text(&self, text: &str) -> MatchResult {
        let text = text.to_lowercase();
        let positive_hits = self
            .positives
            .iter()
            .filter(|term| text.contains(term.as_str()))
            .count();
        let negative_hits = self
            .negatives
            .iter()
            .filter(|term| text.contains(term.as_str()))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let score =
            POSITIVE_WEIGHT * positive_hits as f64 - NEGATIVE_WEIGHT * negative_hits as f64;
        MatchResult {
            matched: positive_hits > 0 && score > 0.0,
            score,
            positive_hits,
            negative_hits,
        }
    }
}

/// Tokenizes an ad-hoc query into distinct lower-cased word tokens longer
/// than two characters, sorted for determinism.
#[must_use]
pub fn ad_hoc_terms(query: &str) -> Vec<String> {
    let terms: BTreeSet<String> = WORD_RE
        .find_iter(query)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.len() > 2)
        .collect();
    terms.into_iter().collect()
}

/// Scores text against a free-text query. Ad-hoc queries carry no negative
/// vocabulary, so a single token hit is enough to match.
#[must_use]
pub fn ad_hoc_match_score(text: &str, query: &str) -> MatchResult {
    let text = text.to_lowercase();
    let positive_hits = ad_hoc_terms(query)
        .iter()
        .filter(|t| text.contains(t.as_str()))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let score = positive_hits as f64;
    MatchResult {
        matched: positive_hits > 0,
        score,
        positive_hits,
        negative_hits: 0,
    }
}

/// Derives the matchable text for a record: space-joined title, the
/// tag-stripped and entity-unescaped abstract, and the container titles.
#[must_use]
pub fn record_text(record: &Record) -> String {
    let title = record.title.join(" ");
    let abstract_text = record
        .abstract_text
        .as_deref()
        .map(strip_markup)
        .unwrap_or_default();
    let container = record.container_title.join(" ");
    format!("{title} {abstract_text} {container}")
        .trim()
        .to_string()
}

/// Unescapes HTML entities, then replaces tags with spaces. Catalog
/// abstracts arrive as JATS markup (`<jats:p>`, `&amp;`, ...).
fn strip_markup(value: &str) -> String {
    TAG_RE.replace_all(&unescape_entities(value), " ").into_owned()
}

/// Minimal HTML entity unescaping covering the named entities and numeric
/// references seen in catalog abstracts.
fn unescape_entities(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            break;
        };
        let entity = &tail[1..end];
        match decode_entity(entity) {
            Some(decoded) => out.push_str(&decoded),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => Some("&".to_string()),
        "lt" => Some("<".to_string()),
        "gt" => Some(">".to_string()),
        "quot" => Some("\"".to_string()),
        "apos" => Some("'".to_string()),
        "nbsp" => Some(" ".to_string()),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = if let Some(hex) = code.strip_prefix(['x', 'X']) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                code.parse::<u32>().ok()?
            };
            char::from_u32(value).map(String::from)
        }
    }
}

// ==================== Record-Set Gating ====================

/// Summary of one topic/ad-hoc filter pass over a record set.
#[derive(Debug, Clone, Serialize)]
pub struct FilterSummary {
    /// `"topic"`, `"ad_hoc"`, or `"none"`.
    pub mode: &'static str,
    pub matched: usize,
    pub avg_score: f64,
}

/// Gates a record set by topic relevance (or an ad-hoc query when no topic
/// is given). With neither, every record passes unchanged.
#[must_use]
pub fn apply_topic_filter(
    records: Vec<Record>,
    topic: Option<&TopicDefinition>,
    ad_hoc_query: Option<&str>,
) -> (Vec<Record>, FilterSummary) {
    if topic.is_none() && ad_hoc_query.is_none() {
        let matched = records.len();
        return (
            records,
            FilterSummary {
                mode: "none",
                matched,
                avg_score: 0.0,
            },
        );
    }

    let matcher = topic.map(TopicMatcher::new);
    let mode = if matcher.is_some() { "topic" } else { "ad_hoc" };

    let mut kept = Vec::new();
    let mut scores = Vec::new();
    for record in records {
        let text = record_text(&record);
        let result = match &matcher {
            Some(m) => m.score_text(&text),
            None => ad_hoc_match_score(&text, ad_hoc_query.unwrap_or_default()),
        };
        if result.matched {
            scores.push(result.score);
            kept.push(record);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let avg_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let summary = FilterSummary {
        mode,
        matched: kept.len(),
        avg_score,
    };
    (kept, summary)
}
