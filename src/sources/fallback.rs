//! Deterministic local item sets used when a provider is unreachable.
//!
//! The same `(source, query)` pair always yields the same items, so the
//! rest of the pipeline renders stable content even with every live
//! provider down.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{ContentItem, Engagement, Query, SourceId};
use crate::utils::stable_seed;

const DEFAULT_TOPIC: &str = "trending topics";

#[derive(Debug, Clone, Copy)]
pub struct FallbackGenerator {
    count: usize,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl FallbackGenerator {
    /// A generator producing `count` items (at least one).
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn generate(&self, source: SourceId, query: &Query) -> Vec<ContentItem> {
        let normalized = query.normalized();
        let topic = if normalized.is_empty() {
            DEFAULT_TOPIC.to_string()
        } else {
            query.text().to_string()
        };

        let mut rng = StdRng::seed_from_u64(stable_seed(&[source.as_str(), &normalized]));
        let templates = title_templates(source);
        let tag = format!("{:08x}", stable_seed(&[&normalized]) as u32);

        (0..self.count)
            .map(|i| {
                let title = templates[i % templates.len()].replace("{}", &topic);
                let views = rng.random_range(1_000..250_000u64);
                ContentItem {
                    id: format!("fallback-{}-{}-{}", source, tag, i),
                    description: format!("Curated {} results about {}.", source, topic),
                    media_url: media_placeholder(source, &tag, i),
                    url: search_url(source, &topic),
                    engagement: Engagement {
                        views,
                        likes: views / rng.random_range(20..60u64),
                        comments: views / rng.random_range(150..400u64),
                    },
                    created_at: None,
                    synthetic: true,
                    title,
                }
            })
            .collect()
    }
}

fn title_templates(source: SourceId) -> &'static [&'static str] {
    match source {
        SourceId::Web => &[
            "{}: an overview",
            "Everything to know about {}",
            "{} explained",
            "Latest coverage of {}",
        ],
        SourceId::Video => &[
            "{} in 10 minutes",
            "A beginner's guide to {}",
            "Top moments: {}",
            "{} explained visually",
        ],
        SourceId::Discussion => &[
            "What do people think about {}?",
            "Experiences with {}",
            "{}: tips and recommendations",
            "Ask anything about {}",
        ],
        SourceId::Image => &[
            "{} photo collection",
            "Inspiring {} ideas",
            "{} in pictures",
            "Best shots of {}",
        ],
    }
}

fn search_url(source: SourceId, topic: &str) -> String {
    let (base, param) = match source {
        SourceId::Web => ("https://duckduckgo.com/", "q"),
        SourceId::Video => ("https://www.youtube.com/results", "search_query"),
        SourceId::Discussion => ("https://www.reddit.com/search/", "q"),
        SourceId::Image => ("https://www.pinterest.com/search/pins/", "q"),
    };
    reqwest::Url::parse_with_params(base, &[(param, topic)])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| base.to_string())
}

fn media_placeholder(source: SourceId, tag: &str, index: usize) -> Option<String> {
    match source {
        SourceId::Web | SourceId::Discussion => None,
        SourceId::Video | SourceId::Image => Some(format!(
            "https://picsum.photos/seed/{}-{}-{}/640/360",
            source, tag, index
        )),
    }
}
