//! Byline/citation list assembly.

use crate::synthesis::generic_citations;
use crate::types::{Citation, Query};

/// Citations to show for a narrative: its own metadata when present, else
/// the generic per-query set. Duplicate URLs are dropped, then the list is
/// capped at `max`. Returns the kept list and how many were left out.
pub fn select(query: &Query, narrative_citations: &[Citation], max: usize) -> (Vec<Citation>, usize) {
    let candidates = if narrative_citations.is_empty() {
        generic_citations(query)
    } else {
        narrative_citations.to_vec()
    };

    let mut unique: Vec<Citation> = Vec::with_capacity(candidates.len());
    for citation in candidates {
        if citation.url.is_empty() || unique.iter().any(|c| c.url == citation.url) {
            continue;
        }
        unique.push(citation);
    }

    let more = unique.len().saturating_sub(max);
    unique.truncate(max);
    (unique, more)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_reports_remainder() {
        let citations: Vec<Citation> = (0..8)
            .map(|i| Citation::new(format!("t{}", i), format!("https://site{}.com/", i)))
            .collect();
        let (kept, more) = select(&Query::new("q"), &citations, 5);
        assert_eq!(kept.len(), 5);
        assert_eq!(more, 3);
        assert_eq!(kept[0].title, "t0");
    }

    #[test]
    fn test_duplicates_do_not_count_toward_remainder() {
        let citations = vec![
            Citation::new("a", "https://a.com/"),
            Citation::new("a again", "https://a.com/"),
            Citation::new("b", "https://b.com/"),
        ];
        let (kept, more) = select(&Query::new("q"), &citations, 5);
        assert_eq!(kept.len(), 2);
        assert_eq!(more, 0);
    }

    #[test]
    fn test_generic_set_when_narrative_has_none() {
        let (kept, more) = select(&Query::new("sourdough"), &[], 5);
        assert_eq!(kept.len(), 5);
        assert_eq!(more, 1);
        assert!(kept.iter().all(|c| c.url.contains("sourdough")));
    }
}
