use std::collections::HashMap;

use tracing::{info, warn};

use crate::media::ResolvedMedia;

/// Fallback when the preferred quality is missing.
pub const FALLBACK_QUALITY: &str = "720";

/// Quality label to stream URL. Iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityMap {
    entries: HashMap<String, String>,
}

impl QualityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `src` under `quality`, rewriting protocol-relative URLs to https.
    /// A later entry with the same label replaces the earlier one.
    pub fn insert(&mut self, quality: impl Into<String>, src: &str) {
        self.entries.insert(quality.into(), normalize_url(src));
    }

    pub fn get(&self, quality: &str) -> Option<&str> {
        self.entries.get(quality).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn qualities(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl<Q: Into<String>, S: AsRef<str>> FromIterator<(Q, S)> for QualityMap {
    fn from_iter<I: IntoIterator<Item = (Q, S)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (quality, src) in iter {
            map.insert(quality, src.as_ref());
        }
        map
    }
}

/// `//host/path` becomes `https://host/path`; anything else is kept as is.
pub fn normalize_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    }
}

/// Picks one entry: the preferred quality, else 720, else the first key in
/// the map's iteration order. That last choice is arbitrary but stable for
/// a given map value; it is not ranked.
pub fn select(map: &QualityMap, preferred: &str) -> Option<ResolvedMedia> {
    if map.is_empty() {
        warn!("no labelled sources to choose from");
        return None;
    }

    if let Some(url) = map.get(preferred) {
        info!(quality = preferred, "using preferred quality");
        return Some(ResolvedMedia::progressive(url, preferred));
    }

    if let Some(url) = map.get(FALLBACK_QUALITY) {
        info!(preferred, "preferred quality not available, using 720");
        return Some(ResolvedMedia::progressive(url, FALLBACK_QUALITY));
    }

    let (quality, url) = map.entries.iter().next()?;
    info!(%quality, preferred, "using fallback quality");
    Some(ResolvedMedia::progressive(url.as_str(), quality.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::StreamType;

    #[test]
    fn empty_map_selects_nothing() {
        assert_eq!(select(&QualityMap::new(), "720"), None);
        assert_eq!(select(&QualityMap::new(), "1080"), None);
    }

    #[test]
    fn preferred_quality_wins() {
        let map: QualityMap = [("480", "https://a/480.mp4"), ("720", "https://a/720.mp4"), ("1080", "https://a/1080.mp4")]
            .into_iter()
            .collect();

        let media = select(&map, "1080").unwrap();
        assert_eq!(media.url, "https://a/1080.mp4");
        assert_eq!(media.quality, "1080");
        assert_eq!(media.stream_type, StreamType::Progressive);
    }

    #[test]
    fn falls_back_to_720() {
        let map: QualityMap = [("480", "https://a/480.mp4"), ("720", "https://a/720.mp4")]
            .into_iter()
            .collect();

        let media = select(&map, "1080").unwrap();
        assert_eq!(media.quality, "720");
        assert_eq!(media.url, "https://a/720.mp4");
    }

    #[test]
    fn otherwise_returns_some_entry_of_the_map() {
        let map: QualityMap = [("360", "https://a/360.mp4"), ("480", "https://a/480.mp4")]
            .into_iter()
            .collect();

        let media = select(&map, "1080").unwrap();
        assert_eq!(map.get(&media.quality), Some(media.url.as_str()));
    }

    #[test]
    fn protocol_relative_sources_get_https() {
        let mut map = QualityMap::new();
        map.insert("720", "//cdn.example/v.mp4");
        map.insert("480", "http://cdn.example/v480.mp4");

        assert_eq!(map.get("720"), Some("https://cdn.example/v.mp4"));
        assert_eq!(map.get("480"), Some("http://cdn.example/v480.mp4"));
    }
}
