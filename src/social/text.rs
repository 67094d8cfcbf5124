//! Post text processing: URL / hashtag / mention extraction and the
//! weighted length rule (each URL costs a flat 23, tags and mentions are free).

use regex::Regex;
use std::sync::OnceLock;

use crate::error::AppError;

pub const MAX_POST_LENGTH: usize = 280;
pub const URL_WEIGHT: usize = 23;
pub const MAX_IMAGES: usize = 4;

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"https?://\S+").expect("Regex should compile"))
}

fn hashtag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"#(\w+)").expect("Regex should compile"))
}

fn mention_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"@([a-z0-9_]{3,15})").expect("Regex should compile"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub urls: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostLength {
    pub base_count: usize,
    pub url_count: usize,
    pub total: usize,
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !out.iter().any(|v| v == value) {
        out.push(value.to_string());
    }
}

/// Distinct URLs, hashtags (without `#`) and mentions (without `@`) in
/// first-seen order. Tags and mentions are only looked for outside URLs.
pub fn extract(text: &str) -> ExtractedContent {
    let mut content = ExtractedContent::default();

    for m in url_regex().find_iter(text) {
        push_unique(&mut content.urls, m.as_str());
    }

    let without_urls = url_regex().replace_all(text, "");
    for cap in hashtag_regex().captures_iter(&without_urls) {
        push_unique(&mut content.hashtags, &cap[1]);
    }
    for cap in mention_regex().captures_iter(&without_urls) {
        push_unique(&mut content.mentions, &cap[1]);
    }

    content
}

pub fn post_length(text: &str) -> PostLength {
    let url_count = extract(text).urls.len();

    let stripped = url_regex().replace_all(text, "");
    let stripped = hashtag_regex().replace_all(&stripped, "");
    let stripped = mention_regex().replace_all(&stripped, "");
    let base_count = stripped.trim().chars().count();

    PostLength {
        base_count,
        url_count,
        total: base_count + url_count * URL_WEIGHT,
    }
}

pub fn is_valid_post_length(text: &str) -> bool {
    post_length(text).total <= MAX_POST_LENGTH
}

pub fn is_youtube_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| {
            matches!(
                host.as_str(),
                "youtube.com" | "www.youtube.com" | "m.youtube.com" | "youtu.be"
            )
        })
        .unwrap_or(false)
}

pub fn youtube_video_id(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    if host == "youtu.be" {
        let id = parsed.path().trim_start_matches('/');
        return (!id.is_empty()).then(|| id.to_string());
    }
    if host.contains("youtube.com") {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned());
    }
    None
}

pub fn youtube_embed_url(raw: &str) -> Option<String> {
    youtube_video_id(raw).map(|id| format!("https://www.youtube.com/embed/{}", id))
}

/// Splits extracted URLs into (plain links, YouTube videos).
pub fn partition_urls(urls: Vec<String>) -> (Vec<String>, Vec<String>) {
    let (videos, plain): (Vec<_>, Vec<_>) = urls.into_iter().partition(|u| is_youtube_url(u));
    (plain, videos)
}

/// Body rules shared by posts and replies: non-blank text or at least one
/// image, weighted length, image count and image URL shape.
pub fn validate_post_body(text: &str, images: &[String]) -> Result<(), AppError> {
    if text.trim().is_empty() && images.is_empty() {
        return Err(AppError::Validation(
            "Post must have text or images".into(),
        ));
    }
    if !is_valid_post_length(text) {
        return Err(AppError::Validation(format!(
            "Post exceeds {} character limit",
            MAX_POST_LENGTH
        )));
    }
    if images.len() > MAX_IMAGES {
        return Err(AppError::Validation(format!(
            "A post can have at most {} images",
            MAX_IMAGES
        )));
    }
    if images
        .iter()
        .any(|img| !crate::social::domain::is_valid_image_ref(img))
    {
        return Err(AppError::Validation("Invalid image URL".into()));
    }
    Ok(())
}
