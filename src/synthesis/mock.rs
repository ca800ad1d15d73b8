//! Offline narrative used when every remote attempt failed.
//!
//! Output is seeded from the normalized query text, so a given query always
//! renders the same mock answer.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::prompt::HEADLINE_SENTINEL;
use crate::fusion::headline::strip_embed_tokens;
use crate::types::{Citation, Query};
use crate::utils::stable_seed;

const DEFAULT_TOPIC: &str = "trending topics";

const HEADLINES: &[&str] = &[
    "Here is an overview of {}",
    "What to know about {}",
    "A quick look at {}",
];

const DETAILS: &[&str] = &[
    "Live answers are unavailable right now, so this summary is assembled from general sources about {}.",
    "Results from videos, discussions and image collections related to {} are shown alongside this answer.",
    "Community threads often add first-hand experience with {} that reference material leaves out.",
    "For the most current information on {}, follow the linked sources below.",
    "Coverage of {} changes quickly, so check the dates on any article you rely on.",
];

/// Query text without embed tokens, which would otherwise be resolved as
/// real markers once the mock narrative reaches fusion.
fn topic_of(query: &Query) -> String {
    let topic = strip_embed_tokens(query.text());
    if topic.is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        topic
    }
}

/// Templated narrative in the same shape a remote model is asked to produce.
pub fn mock_narrative(query: &Query) -> String {
    let topic = topic_of(query);
    let mut rng = StdRng::seed_from_u64(stable_seed(&["mock", &query.normalized()]));

    let headline = HEADLINES[rng.random_range(0..HEADLINES.len())].replace("{}", &topic);

    let mut details: Vec<&str> = DETAILS.to_vec();
    details.shuffle(&mut rng);
    let details: Vec<String> = details
        .iter()
        .take(3)
        .map(|d| d.replace("{}", &topic))
        .collect();

    format!(
        "{s}{headline}{s}\n\n{first} {second}\n\n[[video]]\n\n{third}",
        s = HEADLINE_SENTINEL,
        headline = headline,
        first = details[0],
        second = details[1],
        third = details[2],
    )
}

/// Per-query citation set used when a narrative has no citation metadata.
pub fn generic_citations(query: &Query) -> Vec<Citation> {
    let topic = topic_of(query);
    let search = |base: &str, param: &str| {
        reqwest::Url::parse_with_params(base, &[(param, topic.as_str())])
            .map(|u| u.to_string())
            .unwrap_or_else(|_| base.to_string())
    };

    vec![
        Citation::new(
            format!("{} - Wikipedia", topic),
            search("https://en.wikipedia.org/w/index.php", "search"),
        ),
        Citation::new(
            format!("{} - Britannica", topic),
            search("https://www.britannica.com/search", "query"),
        ),
        Citation::new(
            format!("{} news", topic),
            search("https://news.google.com/search", "q"),
        ),
        Citation::new(
            format!("{} on DuckDuckGo", topic),
            search("https://duckduckgo.com/", "q"),
        ),
        Citation::new(
            format!("{} discussions", topic),
            search("https://www.reddit.com/search/", "q"),
        ),
        Citation::new(
            format!("{} videos", topic),
            search("https://www.youtube.com/results", "search_query"),
        ),
    ]
}
