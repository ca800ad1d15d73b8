//! Relevance and popularity scoring for secondary sources.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{ContentItem, Query, SourceResult};

/// Coarse gate on whether a source's content is shown at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        };
        f.write_str(name)
    }
}

/// Tier cutoffs. The high pair is the stricter one; a tier requires both
/// scores to reach its pair, and a score equal to a cutoff counts as
/// reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionThresholds {
    pub high_relevance: f64,
    pub high_popularity: f64,
    pub medium_relevance: f64,
    pub medium_popularity: f64,
    /// Minimum relevance for any source that returned items
    pub relevance_floor: f64,
    /// Engagement total that maps to a popularity of 1.0
    pub popularity_reference: f64,
}

impl Default for FusionThresholds {
    fn default() -> Self {
        Self {
            high_relevance: 0.5,
            high_popularity: 0.6,
            medium_relevance: 0.25,
            medium_popularity: 0.3,
            relevance_floor: 0.1,
            popularity_reference: 1_000_000.0,
        }
    }
}

impl FusionThresholds {
    pub fn tier(&self, relevance: f64, popularity: f64) -> QualityTier {
        if relevance >= self.high_relevance && popularity >= self.high_popularity {
            QualityTier::High
        } else if relevance >= self.medium_relevance && popularity >= self.medium_popularity {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceAssessment {
    pub relevance: f64,
    pub popularity: f64,
    pub tier: QualityTier,
    pub item_count: usize,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it", "of",
    "on", "or", "the", "to", "what", "when", "where", "which", "who", "why", "with",
];

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Lowercased content words of the query. Falls back to every word when
/// the query is made only of stopwords.
pub fn query_terms(query: &Query) -> Vec<String> {
    let words: Vec<String> = words(&query.normalized()).collect();

    let mut content: Vec<String> = words
        .iter()
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .cloned()
        .collect();
    if content.is_empty() {
        content = words;
    }
    let mut unique: Vec<String> = Vec::with_capacity(content.len());
    for term in content {
        if !unique.contains(&term) {
            unique.push(term);
        }
    }
    unique
}

/// Average over items of the fraction of query terms found as whole words
/// in the item's title or description, never below `floor` when items exist.
pub fn relevance(terms: &[String], items: &[ContentItem], floor: f64) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    if terms.is_empty() {
        return floor;
    }

    let total: f64 = items
        .iter()
        .map(|item| {
            let item_words: HashSet<String> =
                words(&item.title).chain(words(&item.description)).collect();
            let hits = terms.iter().filter(|t| item_words.contains(t.as_str())).count();
            hits as f64 / terms.len() as f64
        })
        .sum();

    (total / items.len() as f64).max(floor)
}

/// Average log-scaled engagement, normalized against `reference`.
pub fn popularity(items: &[ContentItem], reference: f64) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let scale = (1.0 + reference.max(1.0)).ln();

    let total: f64 = items
        .iter()
        .map(|item| ((1.0 + item.engagement.weighted_total()).ln() / scale).min(1.0))
        .sum();

    total / items.len() as f64
}

pub fn assess(query: &Query, result: &SourceResult, thresholds: &FusionThresholds) -> SourceAssessment {
    let terms = query_terms(query);
    let relevance = relevance(&terms, &result.items, thresholds.relevance_floor);
    let popularity = popularity(&result.items, thresholds.popularity_reference);

    SourceAssessment {
        relevance,
        popularity,
        tier: thresholds.tier(relevance, popularity),
        item_count: result.items.len(),
    }
}
