//! Content Fusion
//!
//! Combines the synthesized narrative with per-source results:
//!
//! 1. split headline and body on the `^^` sentinel
//! 2. score every secondary source into a [`QualityTier`]
//! 3. resolve `[[source]]` embed markers in the body into content blocks,
//!    deleting markers for low-tier or absent sources
//! 4. append a transition sentence and block for any qualifying source the
//!    narrative never mentioned
//! 5. cap the citation list
//!
//! Fusion is a pure function of its inputs; the same narrative and sources
//! always produce the same [`FusionResult`].

pub mod citations;
pub mod headline;
pub mod scoring;

pub use headline::Split;
pub use scoring::{FusionThresholds, QualityTier, SourceAssessment};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::synthesis::Narrative;
use crate::types::{Citation, Query, SourceId, SourceMap};

/// `[[name]]`, case-insensitive, inner whitespace allowed.
static EMBED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[\s*([A-Za-z]+)\s*\]\]").expect("valid embed marker regex"));

// ============= Result Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Resolved from a marker the narrative placed
    Inline,
    /// Added after the body by the fallback-append rule
    Appended,
}

/// Association between a position in the body and a source's content.
/// The renderer resolves the actual block from `item_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub source_id: SourceId,
    pub tier: QualityTier,
    /// Byte offset into `FusionResult::body` where the block belongs
    pub offset: usize,
    pub placement: Placement,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub headline: String,
    pub body: String,
    pub included_sources: BTreeSet<SourceId>,
    pub citations: Vec<Citation>,
    /// Citations left out by the cap
    pub more_citations: usize,
    pub placements: Vec<ContentBlock>,
    pub assessments: BTreeMap<SourceId, SourceAssessment>,
}

// ============= Engine =============

#[derive(Debug, Clone)]
pub struct FusionSettings {
    pub thresholds: FusionThresholds,
    pub headline_max_words: usize,
    pub max_citations: usize,
    pub high_tier_items: usize,
    pub medium_tier_items: usize,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            thresholds: FusionThresholds::default(),
            headline_max_words: 20,
            max_citations: 5,
            high_tier_items: 6,
            medium_tier_items: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentFusionEngine {
    settings: FusionSettings,
}

impl ContentFusionEngine {
    pub fn new(settings: FusionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FusionSettings {
        &self.settings
    }

    pub fn fuse(&self, query: &Query, narrative: &Narrative, sources: &SourceMap) -> FusionResult {
        self.fuse_text(query, &narrative.text, &narrative.citations, sources)
    }

    pub fn fuse_text(
        &self,
        query: &Query,
        narrative_text: &str,
        narrative_citations: &[Citation],
        sources: &SourceMap,
    ) -> FusionResult {
        let split = headline::split(narrative_text, self.settings.headline_max_words);

        let assessments: BTreeMap<SourceId, SourceAssessment> = SourceId::secondary()
            .filter_map(|id| {
                sources
                    .get(&id)
                    .map(|result| (id, scoring::assess(query, result, &self.settings.thresholds)))
            })
            .collect();

        let (mut body, mut placements, mentioned) =
            self.resolve_markers(&split.body, &assessments, sources);

        for id in SourceId::secondary() {
            let Some(assessment) = assessments.get(&id) else {
                continue;
            };
            if assessment.tier < QualityTier::Medium
                || assessment.item_count == 0
                || mentioned.contains(&id)
            {
                continue;
            }

            if !body.is_empty() {
                body.push_str("\n\n");
            }
            body.push_str(&transition_sentence(id, query));
            placements.push(self.block(id, assessment.tier, body.len(), Placement::Appended, sources));
        }

        let included_sources = placements.iter().map(|b| b.source_id).collect();
        let (citations, more_citations) =
            citations::select(query, narrative_citations, self.settings.max_citations);

        FusionResult {
            headline: split.headline,
            body,
            included_sources,
            citations,
            more_citations,
            placements,
            assessments,
        }
    }

    /// Strip every embed marker from `body`. The first marker of each
    /// qualifying source becomes an inline block at the marker's position.
    /// Returns the cleaned body, the blocks, and every source that had a
    /// marker at all.
    fn resolve_markers(
        &self,
        body: &str,
        assessments: &BTreeMap<SourceId, SourceAssessment>,
        sources: &SourceMap,
    ) -> (String, Vec<ContentBlock>, BTreeSet<SourceId>) {
        let mut out = String::with_capacity(body.len());
        let mut blocks = Vec::new();
        let mut mentioned = BTreeSet::new();
        let mut last = 0;
        let mut after_marker = false;

        for caps in EMBED_MARKER.captures_iter(body) {
            let Some(whole) = caps.get(0) else { continue };
            push_segment(&mut out, &body[last..whole.start()], after_marker);
            last = whole.end();
            after_marker = true;

            let trimmed = out.trim_end_matches([' ', '\t']).len();
            out.truncate(trimmed);

            let source = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<SourceId>().ok())
                .filter(|id| !id.is_primary());
            let Some(id) = source else { continue };

            let first_mention = mentioned.insert(id);
            let tier = assessments.get(&id).map(|a| a.tier);
            let has_items = sources.get(&id).is_some_and(|r| !r.items.is_empty());

            if let Some(tier) = tier
                && first_mention
                && tier >= QualityTier::Medium
                && has_items
            {
                blocks.push(self.block(id, tier, out.len(), Placement::Inline, sources));
            }
        }
        push_segment(&mut out, &body[last..], after_marker);

        let end = out.trim_end().len();
        out.truncate(end);
        for block in &mut blocks {
            block.offset = block.offset.min(end);
        }

        (out, blocks, mentioned)
    }

    fn block(
        &self,
        id: SourceId,
        tier: QualityTier,
        offset: usize,
        placement: Placement,
        sources: &SourceMap,
    ) -> ContentBlock {
        let size = match tier {
            QualityTier::High => self.settings.high_tier_items,
            QualityTier::Medium => self.settings.medium_tier_items,
            QualityTier::Low => 0,
        };
        let item_ids = sources
            .get(&id)
            .map(|r| r.items.iter().take(size).map(|i| i.id.clone()).collect())
            .unwrap_or_default();

        ContentBlock {
            source_id: id,
            tier,
            offset,
            placement,
            item_ids,
        }
    }
}

/// Append text that followed a removed marker, joining words with a single
/// space and dropping the gap before punctuation.
fn push_segment(out: &mut String, segment: &str, after_marker: bool) {
    if !after_marker {
        out.push_str(segment);
        return;
    }

    let segment = segment.trim_start_matches([' ', '\t']);
    let needs_space = !out.is_empty()
        && !out.ends_with(char::is_whitespace)
        && segment.starts_with(|c: char| c.is_alphanumeric());
    if needs_space {
        out.push(' ');
    }
    if out.is_empty() || out.ends_with('\n') {
        out.push_str(segment.trim_start_matches(['\n', '\r']));
    } else {
        out.push_str(segment);
    }
}

/// The query text is inserted after marker resolution, so any embed token
/// it carries is stripped first.
fn transition_sentence(id: SourceId, query: &Query) -> String {
    let topic = headline::strip_embed_tokens(query.text());
    let topic = if topic.is_empty() { "this topic" } else { topic.as_str() };
    match id {
        SourceId::Video => format!("Watch related videos about {}.", topic),
        SourceId::Discussion => format!("See what people are saying about {}.", topic),
        SourceId::Image => format!("Browse images related to {}.", topic),
        SourceId::Web => format!("Read more about {}.", topic),
    }
}
