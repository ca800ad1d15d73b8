//! Per-provider payload adapters.
//!
//! Each provider returns its own loosely-typed JSON shape. Every adapter
//! decodes into private structs with explicit defaults per field and maps
//! them onto a strict [`ContentItem`], so an unexpected shape can only ever
//! fail inside one adapter.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::SourceError;
use crate::types::{ContentItem, Engagement, SourceId};

/// Parser signature shared by all providers.
pub type PayloadParser = fn(&str) -> Result<Vec<ContentItem>, SourceError>;

/// Parser registered for a source.
pub fn parser_for(source: SourceId) -> PayloadParser {
    match source {
        SourceId::Web => parse_web,
        SourceId::Video => parse_video,
        SourceId::Discussion => parse_discussion,
        SourceId::Image => parse_image,
    }
}

/// Counters arrive as numbers from some providers and as strings from others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Count {
    Number(u64),
    Float(f64),
    Text(String),
}

impl Count {
    fn value(&self) -> u64 {
        match self {
            Count::Number(n) => *n,
            Count::Float(f) if *f > 0.0 => *f as u64,
            Count::Float(_) => 0,
            Count::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

fn count(c: &Option<Count>) -> u64 {
    c.as_ref().map(Count::value).unwrap_or(0)
}

fn parse_rfc3339(ts: Option<&str>) -> Option<DateTime<Utc>> {
    ts.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, SourceError> {
    if body.trim().is_empty() {
        return Err(SourceError::Malformed("empty payload".to_string()));
    }
    Ok(serde_json::from_str(body)?)
}

// ============= Web =============

#[derive(Debug, Deserialize)]
struct WebPayload {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    title: Option<String>,
    url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

pub fn parse_web(body: &str) -> Result<Vec<ContentItem>, SourceError> {
    let payload: WebPayload = decode(body)?;
    Ok(payload
        .results
        .into_iter()
        .filter_map(|r| {
            let url = non_empty(r.url)?;
            let title = non_empty(r.title).unwrap_or_else(|| url.clone());
            Some(ContentItem {
                id: url.clone(),
                title,
                description: r.snippet.unwrap_or_default(),
                media_url: non_empty(r.thumbnail),
                engagement: Engagement::default(),
                created_at: parse_rfc3339(r.published.as_deref()),
                synthetic: false,
                url,
            })
        })
        .collect())
}

// ============= Video =============

#[derive(Debug, Deserialize)]
struct VideoPayload {
    #[serde(default)]
    items: Vec<VideoEntry>,
}

#[derive(Debug, Deserialize)]
struct VideoEntry {
    id: VideoId,
    #[serde(default)]
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: VideoStatistics,
}

/// Video ids are either a bare string or an object naming the resource kind.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VideoId {
    Plain(String),
    Resource {
        #[serde(rename = "videoId")]
        video_id: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: VideoThumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct VideoThumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<Count>,
    like_count: Option<Count>,
    comment_count: Option<Count>,
}

pub fn parse_video(body: &str) -> Result<Vec<ContentItem>, SourceError> {
    let payload: VideoPayload = decode(body)?;
    Ok(payload
        .items
        .into_iter()
        .filter_map(|entry| {
            let id = match entry.id {
                VideoId::Plain(id) => Some(id),
                VideoId::Resource { video_id } => video_id,
            }
            .filter(|id| !id.is_empty())?;
            let snippet = entry.snippet;
            let thumbs = snippet.thumbnails;
            Some(ContentItem {
                url: format!("https://www.youtube.com/watch?v={}", id),
                title: non_empty(snippet.title).unwrap_or_else(|| "Untitled video".to_string()),
                description: snippet.description.unwrap_or_default(),
                media_url: thumbs.high.or(thumbs.medium).or(thumbs.default).map(|t| t.url),
                engagement: Engagement {
                    views: count(&entry.statistics.view_count),
                    likes: count(&entry.statistics.like_count),
                    comments: count(&entry.statistics.comment_count),
                },
                created_at: parse_rfc3339(snippet.published_at.as_deref()),
                synthetic: false,
                id,
            })
        })
        .collect())
}

// ============= Discussion =============

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

/// Listing children are tagged by `kind`; `t3` marks a post.
#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

const POST_KIND: &str = "t3";

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    score: Option<Count>,
    #[serde(default)]
    num_comments: Option<Count>,
    #[serde(default)]
    created_utc: Option<f64>,
}

pub fn parse_discussion(body: &str) -> Result<Vec<ContentItem>, SourceError> {
    let listing: Listing = decode(body)?;
    Ok(listing
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == POST_KIND)
        .filter_map(|thing| serde_json::from_value::<PostData>(thing.data).ok())
        .map(|post| {
            let url = match non_empty(post.permalink) {
                Some(p) if p.starts_with('/') => format!("https://www.reddit.com{}", p),
                Some(p) => p,
                None => post.url.unwrap_or_default(),
            };
            // "self"/"default" are placeholders, not images
            let media_url = non_empty(post.thumbnail).filter(|t| t.starts_with("http"));
            ContentItem {
                title: non_empty(post.title).unwrap_or_else(|| "Untitled thread".to_string()),
                description: post.selftext.unwrap_or_default(),
                media_url,
                url,
                engagement: Engagement {
                    views: 0,
                    likes: count(&post.score),
                    comments: count(&post.num_comments),
                },
                created_at: post
                    .created_utc
                    .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single()),
                synthetic: false,
                id: post.id,
            }
        })
        .collect())
}

// ============= Image =============

#[derive(Debug, Deserialize)]
struct ImagePayload {
    #[serde(default)]
    items: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<Thumbnail>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    save_count: Option<Count>,
    #[serde(default)]
    comment_count: Option<Count>,
    #[serde(default)]
    created_at: Option<String>,
}

pub fn parse_image(body: &str) -> Result<Vec<ContentItem>, SourceError> {
    let payload: ImagePayload = decode(body)?;
    Ok(payload
        .items
        .into_iter()
        .map(|entry| {
            let description = entry.description.unwrap_or_default();
            let title = non_empty(entry.title)
                .or_else(|| non_empty(Some(description.clone())))
                .unwrap_or_else(|| "Untitled image".to_string());
            ContentItem {
                url: non_empty(entry.link)
                    .unwrap_or_else(|| format!("https://www.pinterest.com/pin/{}/", entry.id)),
                title,
                description,
                media_url: entry.image.map(|i| i.url),
                engagement: Engagement {
                    views: 0,
                    likes: count(&entry.save_count),
                    comments: count(&entry.comment_count),
                },
                created_at: parse_rfc3339(entry.created_at.as_deref()),
                synthetic: false,
                id: entry.id,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FailureKind;

    #[test]
    fn test_web_skips_results_without_url() {
        let body = r#"{"results":[
            {"title":"Rust","url":"https://rust-lang.org","snippet":"A language"},
            {"title":"No link"}
        ]}"#;
        let items = parse_web(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Rust");
        assert_eq!(items[0].description, "A language");
    }

    #[test]
    fn test_video_accepts_string_counts_and_resource_ids() {
        let body = r#"{"items":[
            {"id":{"kind":"youtube#video","videoId":"abc"},
             "snippet":{"title":"Intro","publishedAt":"2024-03-01T10:00:00Z",
                        "thumbnails":{"medium":{"url":"https://img/abc.jpg"}}},
             "statistics":{"viewCount":"1200","likeCount":30,"commentCount":"4"}},
            {"id":"plain-id","snippet":{"title":"Second"}},
            {"id":{"kind":"youtube#channel"}}
        ]}"#;
        let items = parse_video(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "abc");
        assert_eq!(items[0].engagement.views, 1200);
        assert_eq!(items[0].engagement.likes, 30);
        assert_eq!(items[0].engagement.comments, 4);
        assert_eq!(items[0].media_url.as_deref(), Some("https://img/abc.jpg"));
        assert!(items[0].created_at.is_some());
        assert_eq!(items[1].engagement, Engagement::default());
    }

    #[test]
    fn test_discussion_keeps_only_posts() {
        let body = r#"{"data":{"children":[
            {"kind":"t3","data":{"id":"p1","title":"Thread","permalink":"/r/x/comments/p1/",
                                 "score":42,"num_comments":7,"created_utc":1700000000.0,
                                 "thumbnail":"self"}},
            {"kind":"t5","data":{"id":"sub"}},
            {"kind":"more","data":{"count":3}}
        ]}}"#;
        let items = parse_discussion(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://www.reddit.com/r/x/comments/p1/");
        assert_eq!(items[0].engagement.likes, 42);
        assert_eq!(items[0].engagement.comments, 7);
        assert!(items[0].media_url.is_none());
    }

    #[test]
    fn test_image_title_falls_back_to_description() {
        let body = r#"{"items":[{"id":"9","description":"Sunset over dunes",
                                 "image":{"url":"https://i/9.jpg"},"save_count":"88"}]}"#;
        let items = parse_image(body).unwrap();
        assert_eq!(items[0].title, "Sunset over dunes");
        assert_eq!(items[0].url, "https://www.pinterest.com/pin/9/");
        assert_eq!(items[0].engagement.likes, 88);
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        assert!(parse_web(r#"{"results":[]}"#).unwrap().is_empty());
        assert!(parse_video(r#"{}"#).unwrap().is_empty());
        assert!(parse_discussion(r#"{"data":{}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_empty_or_invalid_body_is_malformed() {
        for parser in [parse_web, parse_video, parse_discussion, parse_image] {
            assert_eq!(parser("").unwrap_err().kind(), FailureKind::Malformed);
            assert_eq!(parser("<html>").unwrap_err().kind(), FailureKind::Malformed);
        }
    }
}
