//! Headline/body split on the `^^` sentinel.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::synthesis::draft::ELLIPSIS;
use crate::synthesis::prompt::HEADLINE_SENTINEL;

/// Bracketed citation numerals such as `[1]` or `[2, 3]`.
static CITATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\d+(?:\s*,\s*\d+)*\s*\]").expect("valid citation regex"));

/// Inline embed tokens such as `[[video]]`.
static EMBED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[[^\[\]]*\]\]").expect("valid embed regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub headline: String,
    pub body: String,
}

/// Split narrative text into headline and body.
///
/// - `^^headline^^ body`: the enclosed segment is the headline, the rest
///   is the body.
/// - `^^text` with no closing sentinel: the remainder is both headline and
///   body.
/// - no sentinel: the whole text is both headline and body.
///
/// The headline is capped at `max_words` and has citation markers and embed
/// tokens removed. The body keeps them for marker resolution.
pub fn split(text: &str, max_words: usize) -> Split {
    let trimmed = text.trim();

    let (headline, body) = match trimmed.strip_prefix(HEADLINE_SENTINEL) {
        Some(rest) => match rest.find(HEADLINE_SENTINEL) {
            Some(end) => (
                rest[..end].to_string(),
                rest[end + HEADLINE_SENTINEL.len()..].to_string(),
            ),
            None => (rest.to_string(), rest.to_string()),
        },
        None => (trimmed.to_string(), trimmed.to_string()),
    };

    Split {
        headline: clean_headline(&headline, max_words),
        body: body.replace(HEADLINE_SENTINEL, "").trim().to_string(),
    }
}

fn clean_headline(raw: &str, max_words: usize) -> String {
    let without_sentinels = raw.replace(HEADLINE_SENTINEL, " ");
    let without_citations = CITATION_MARKER.replace_all(&without_sentinels, " ");
    let without_embeds = EMBED_TOKEN.replace_all(&without_citations, " ");

    let words: Vec<&str> = without_embeds.split_whitespace().collect();
    if words.len() <= max_words.max(1) {
        return tidy_punctuation(&words.join(" "));
    }

    let mut capped = words[..max_words.max(1)].join(" ");
    if !capped.ends_with(ELLIPSIS) {
        capped.push(ELLIPSIS);
    }
    tidy_punctuation(&capped)
}

/// Remove inline embed tokens from free text such as a query, collapsing
/// the whitespace they leave behind.
pub fn strip_embed_tokens(text: &str) -> String {
    EMBED_TOKEN
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove the space a stripped marker leaves before trailing punctuation.
fn tidy_punctuation(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '.' | ',' | ';' | ':' | '!' | '?') && out.ends_with(' ') {
            out.pop();
        }
        out.push(c);
    }
    out
}
