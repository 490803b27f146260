//! Lenient HTML extraction.
//!
//! Nothing in here fails on malformed markup: a missing element is `None`
//! (or an empty list). Callers pull out the owned values they need and drop
//! the [`PageDocument`] right away; it is never held across an `.await`.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::quality::QualityMap;

const UNKNOWN_QUALITY: &str = "unknown";

macro_rules! selector {
    ($name:ident, $css:literal) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect(concat!("valid selector: ", $css)));
    };
}

selector!(VIDEO, "video");
selector!(SOURCE, "source");
selector!(IFRAME, "iframe");
selector!(SCRIPT_SRC, "script[src]");
selector!(CARD, "article.bs");
selector!(CARD_LINK, "a.tip");
selector!(CARD_TITLE, "h2[itemprop=\"headline\"]");
selector!(CARD_IMAGE, "img.ts-post-image");
selector!(CARD_STATUS, "span.epx");
selector!(CARD_TYPE, "div.typez");

pub struct PageDocument {
    html: Html,
}

/// The `<source>` entries of a `<video>` element, as `(quality, src)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTag {
    sources: Vec<(String, String)>,
}

/// An iframe source, classified on demand by substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedReference {
    pub source_url: String,
}

/// One entry on a listing or search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogCard {
    pub title: String,
    pub url: String,
    pub thumbnail: String,
    pub status: String,
    pub kind: String,
}

impl PageDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// First `<video>` on the page, if any.
    pub fn find_video_tag(&self) -> Option<VideoTag> {
        let video = self.html.select(&VIDEO).next()?;
        let sources = video
            .select(&SOURCE)
            .filter_map(|source| {
                let src = source.value().attr("src").map(str::trim).filter(|s| !s.is_empty())?;
                let quality = source.value().attr("size").unwrap_or(UNKNOWN_QUALITY).trim();
                if quality.is_empty() || quality == UNKNOWN_QUALITY {
                    return None;
                }
                Some((quality.to_string(), src.to_string()))
            })
            .collect();

        Some(VideoTag { sources })
    }

    /// First `<iframe>` on the page; an empty `src` counts as no iframe.
    pub fn find_iframe(&self) -> Option<EmbedReference> {
        let iframe = self.html.select(&IFRAME).next()?;
        let src = iframe.value().attr("src")?.trim();
        if src.is_empty() {
            return None;
        }
        Some(EmbedReference {
            source_url: src.to_string(),
        })
    }

    /// `src` of every `<script src=...>`, in document order, unresolved.
    pub fn script_sources(&self) -> Vec<String> {
        self.html
            .select(&SCRIPT_SRC)
            .filter_map(|script| script.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Listing cards. Cards without a link are skipped; `default_kind` fills
    /// in a missing type badge.
    pub fn find_catalog_cards(&self, default_kind: &str) -> Vec<CatalogCard> {
        self.html
            .select(&CARD)
            .filter_map(|card| {
                let url = card
                    .select(&CARD_LINK)
                    .next()?
                    .value()
                    .attr("href")
                    .map(str::trim)
                    .filter(|href| !href.is_empty())?
                    .to_string();

                Some(CatalogCard {
                    title: text_of(card, &CARD_TITLE).unwrap_or_else(|| "Unknown".to_string()),
                    url,
                    thumbnail: card
                        .select(&CARD_IMAGE)
                        .next()
                        .and_then(|img| img.value().attr("src"))
                        .unwrap_or("")
                        .to_string(),
                    status: text_of(card, &CARD_STATUS).unwrap_or_else(|| "N/A".to_string()),
                    kind: text_of(card, &CARD_TYPE).unwrap_or_else(|| default_kind.to_string()),
                })
            })
            .collect()
    }
}

impl VideoTag {
    pub fn sources(&self) -> &[(String, String)] {
        &self.sources
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn quality_map(&self) -> QualityMap {
        self.sources
            .iter()
            .map(|(quality, src)| (quality.clone(), src.as_str()))
            .collect()
    }
}

impl EmbedReference {
    /// Case-insensitive substring test against the source URL.
    pub fn matches(&self, token: &str) -> bool {
        self.source_url
            .to_ascii_lowercase()
            .contains(&token.to_ascii_lowercase())
    }
}

fn text_of(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_sources_skip_unlabelled_entries() {
        let doc = PageDocument::parse(
            r#"<video>
                 <source src="//cdn.example/720.mp4" size="720">
                 <source src="https://cdn.example/x.mp4">
                 <source src="https://cdn.example/u.mp4" size="unknown">
                 <source size="1080">
                 <source src="https://cdn.example/480.mp4" size="480">
               </video>"#,
        );

        let video = doc.find_video_tag().unwrap();
        assert_eq!(
            video.sources(),
            &[
                ("720".to_string(), "//cdn.example/720.mp4".to_string()),
                ("480".to_string(), "https://cdn.example/480.mp4".to_string()),
            ]
        );

        let map = video.quality_map();
        assert_eq!(map.get("720"), Some("https://cdn.example/720.mp4"));
    }

    #[test]
    fn video_without_labelled_sources_is_found_but_unusable() {
        let doc = PageDocument::parse(r#"<video src="x.mp4"></video>"#);
        let video = doc.find_video_tag().unwrap();
        assert!(!video.has_sources());
    }

    #[test]
    fn missing_elements_are_none_not_errors() {
        let doc = PageDocument::parse("<html><body><p>unterminated <div>");
        assert!(doc.find_video_tag().is_none());
        assert!(doc.find_iframe().is_none());
        assert!(doc.script_sources().is_empty());
        assert!(doc.find_catalog_cards("Movie").is_empty());
    }

    #[test]
    fn empty_iframe_src_is_absent() {
        let doc = PageDocument::parse(r#"<iframe src="  "></iframe>"#);
        assert!(doc.find_iframe().is_none());

        let doc = PageDocument::parse(r#"<iframe src="https://x.blogspot.com/v"></iframe><iframe src="b"></iframe>"#);
        assert_eq!(doc.find_iframe().unwrap().source_url, "https://x.blogspot.com/v");
    }

    #[test]
    fn embed_matching_ignores_case() {
        let embed = EmbedReference {
            source_url: "https://FileMoon.SX/e/abc".to_string(),
        };
        assert!(embed.matches("filemoon"));
        assert!(!embed.matches("blogspot"));
    }

    #[test]
    fn script_sources_in_document_order() {
        let doc = PageDocument::parse(
            r#"<script src="/js/a.js"></script><script>inline()</script><script src='https://cdn.example/b.js'></script>"#,
        );
        assert_eq!(doc.script_sources(), vec!["/js/a.js", "https://cdn.example/b.js"]);
    }

    #[test]
    fn catalog_cards_with_defaults() {
        let doc = PageDocument::parse(
            r#"
            <article class="bs">
              <a class="tip" href="https://site.example/anime/movie-1/">
                <img class="ts-post-image" src="https://site.example/t1.jpg">
                <span class="epx"> Completed </span>
                <div class="typez">Movie</div>
                <h2 itemprop="headline"> Movie One </h2>
              </a>
            </article>
            <article class="bs"><a class="tip" href="https://site.example/ep-2/"></a></article>
            <article class="bs"><h2 itemprop="headline">No link</h2></article>
            "#,
        );

        let cards = doc.find_catalog_cards("N/A");
        assert_eq!(cards.len(), 2);
        assert_eq!(
            cards[0],
            CatalogCard {
                title: "Movie One".to_string(),
                url: "https://site.example/anime/movie-1/".to_string(),
                thumbnail: "https://site.example/t1.jpg".to_string(),
                status: "Completed".to_string(),
                kind: "Movie".to_string(),
            }
        );
        assert_eq!(cards[1].title, "Unknown");
        assert_eq!(cards[1].status, "N/A");
        assert_eq!(cards[1].kind, "N/A");
        assert_eq!(cards[1].thumbnail, "");
    }
}
