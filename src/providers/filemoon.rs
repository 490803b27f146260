//! Filemoon hides its HLS master playlist behind rotating delivery: sometimes
//! inline in the embed page, sometimes only inside a linked script, always
//! with a short-lived token. Candidates are found by pattern and only
//! returned once a live probe proves the playlist is there.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use super::{EmbedRequest, Provider};
use crate::error::ResolveError;
use crate::http::{FetchError, HttpClient, request_headers};
use crate::media::ResolvedMedia;
use crate::parser::PageDocument;
use crate::quality::normalize_url;

const PLAYLIST_HEADER: &str = "#EXTM3U";
const STREAM_VARIANT: &str = "#EXT-X-STREAM-INF";
const PREVIEW_CHARS: usize = 1000;

// https://<host>/hls<digit?>/<path>/master.m3u8<query?>
static MASTER_MANIFEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[a-z0-9.\-]+(?::\d+)?/hls[0-9]?/[^"'\s<>]+/master\.m3u8[^"'\s<>]*"#)
        .expect("valid master manifest pattern")
});

static ANY_MANIFEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'<>]+\.m3u8[^\s"'<>]*"#).expect("valid manifest pattern")
});

/// What a probed body must contain to count as a live playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Playlist header and at least one variant stream.
    MasterPlaylist,
    /// Playlist header only.
    AnyPlaylist,
}

impl Validation {
    fn required_markers(self) -> &'static [&'static str] {
        match self {
            Self::MasterPlaylist => &[PLAYLIST_HEADER, STREAM_VARIANT],
            Self::AnyPlaylist => &[PLAYLIST_HEADER],
        }
    }

    pub fn check(self, status: reqwest::StatusCode, body: &str) -> ProbeOutcome {
        if status != reqwest::StatusCode::OK {
            return ProbeOutcome::Invalid(format!("status {status}"));
        }
        match self.required_markers().iter().find(|marker| !body.contains(*marker)) {
            Some(missing) => ProbeOutcome::Invalid(format!("missing {missing}")),
            None => ProbeOutcome::Valid,
        }
    }
}

/// Result of probing a single candidate.
#[derive(Debug)]
pub enum ProbeOutcome {
    Valid,
    Invalid(String),
    Failed(FetchError),
}

/// Independent discovery strategies, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discovery {
    MasterPattern,
    TokenizedManifest,
    LinkedScripts,
}

const DISCOVERY_ORDER: [Discovery; 3] = [
    Discovery::MasterPattern,
    Discovery::TokenizedManifest,
    Discovery::LinkedScripts,
];

/// Fetched embed page plus what every probe needs to look like it came from it.
struct EmbedPage {
    url: String,
    origin: Option<String>,
    referer: String,
    html: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Filemoon;

#[async_trait]
impl Provider for Filemoon {
    fn name(&self) -> &'static str {
        "filemoon"
    }

    fn token(&self) -> &'static str {
        "filemoon"
    }

    async fn extract(
        &self,
        client: &HttpClient,
        request: EmbedRequest<'_>,
    ) -> Result<Option<ResolvedMedia>, ResolveError> {
        let url = normalize_url(request.embed_url);
        info!(embed = %url, "fetching filemoon embed");

        let page = client.fetch(&url, request_headers(request.referer, None)).await?;
        debug!(chars = page.body.len(), "filemoon embed read");

        let embed = EmbedPage {
            origin: origin_of(&url),
            url,
            referer: request.referer.to_string(),
            html: page.body,
        };

        for method in DISCOVERY_ORDER {
            debug!(?method, "trying discovery method");
            if let Some(manifest) = discover(client, &embed, method).await {
                info!(?method, manifest = %manifest, "validated filemoon manifest");
                return Ok(Some(ResolvedMedia::hls(manifest)));
            }
        }

        warn!("no validated manifest in filemoon embed");
        debug!(
            preview = %embed.html.chars().take(PREVIEW_CHARS).collect::<String>(),
            "filemoon embed preview"
        );
        Ok(None)
    }
}

async fn discover(client: &HttpClient, embed: &EmbedPage, method: Discovery) -> Option<String> {
    match method {
        Discovery::MasterPattern => {
            first_valid(client, embed, master_candidates(&embed.html), Validation::MasterPlaylist)
                .await
        }
        Discovery::TokenizedManifest => {
            first_valid(client, embed, tokenized_candidates(&embed.html), Validation::AnyPlaylist)
                .await
        }
        Discovery::LinkedScripts => {
            for script_url in script_urls(embed) {
                debug!(script = %script_url, "fetching linked script");
                let script = match client
                    .fetch(&script_url, request_headers(&embed.referer, None))
                    .await
                {
                    Ok(script) => script,
                    Err(e) => {
                        debug!(script = %script_url, error = %e, "script fetch failed");
                        continue;
                    }
                };

                let candidates = script_candidates(&script.body);
                if let Some(hit) =
                    first_valid(client, embed, candidates, Validation::AnyPlaylist).await
                {
                    return Some(hit);
                }
            }
            None
        }
    }
}

/// Probes candidates in order; the first valid one wins. Failures of any
/// kind only disqualify that candidate.
async fn first_valid(
    client: &HttpClient,
    embed: &EmbedPage,
    candidates: Vec<String>,
    validation: Validation,
) -> Option<String> {
    for candidate in candidates {
        match probe(client, embed, &candidate, validation).await {
            ProbeOutcome::Valid => return Some(candidate),
            ProbeOutcome::Invalid(reason) => debug!(%candidate, %reason, "candidate rejected"),
            ProbeOutcome::Failed(e) => debug!(%candidate, error = %e, "candidate probe failed"),
        }
    }
    None
}

async fn probe(
    client: &HttpClient,
    embed: &EmbedPage,
    candidate: &str,
    validation: Validation,
) -> ProbeOutcome {
    let headers = request_headers(&embed.url, embed.origin.as_deref());
    match client.probe(candidate, headers).await {
        Ok(response) => validation.check(response.status, &response.body),
        Err(e) => ProbeOutcome::Failed(e),
    }
}

fn master_candidates(text: &str) -> Vec<String> {
    collect_matches(&MASTER_MANIFEST, text, |_| true)
}

// A query string usually carries the auth token; bare manifests are stale mirrors.
fn tokenized_candidates(text: &str) -> Vec<String> {
    collect_matches(&ANY_MANIFEST, text, |url| url.contains('?'))
}

fn script_candidates(text: &str) -> Vec<String> {
    collect_matches(&MASTER_MANIFEST, text, |url| {
        url.contains('?') && url.contains("master.m3u8")
    })
}

fn collect_matches(pattern: &Regex, text: &str, keep: impl Fn(&str) -> bool) -> Vec<String> {
    let mut seen = Vec::new();
    for m in pattern.find_iter(text) {
        let url = clean_candidate(m.as_str());
        if keep(url) && !seen.iter().any(|s: &String| s == url) {
            seen.push(url.to_string());
        }
    }
    seen
}

// Escaped JSON leaves a trailing `\` sequence on the match.
fn clean_candidate(raw: &str) -> &str {
    raw.split('\\').next().unwrap_or(raw)
}

fn script_urls(embed: &EmbedPage) -> Vec<String> {
    let sources = PageDocument::parse(&embed.html).script_sources();
    let Ok(base) = Url::parse(&embed.url) else {
        return Vec::new();
    };

    sources
        .iter()
        .filter_map(|src| base.join(src).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
        .collect()
}

fn origin_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .filter(|origin| origin != "null")
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn master_pattern_requires_hls_path_and_master_file() {
        let html = r#"
            var a = "https://cdn.example.com/hls1/abc123/master.m3u8?token=t1";
            var b = 'https://cdn.example.com/other/abc/master.m3u8?token=t2';
            var c = "https://cdn.example.com/hls/xyz/index.m3u8?t=3";
            <source src="http://127.0.0.1:8080/hls2/q/w/master.m3u8">
        "#;
        assert_eq!(
            master_candidates(html),
            vec![
                "https://cdn.example.com/hls1/abc123/master.m3u8?token=t1",
                "http://127.0.0.1:8080/hls2/q/w/master.m3u8",
            ]
        );
    }

    #[test]
    fn tokenized_pattern_keeps_only_urls_with_query() {
        let html = r#"a="https://x.example/p/index.m3u8" b="https://y.example/p/index.m3u8?e=1&s=2""#;
        assert_eq!(tokenized_candidates(html), vec!["https://y.example/p/index.m3u8?e=1&s=2"]);
    }

    #[test]
    fn escaped_sequences_are_cut_and_duplicates_dropped() {
        let js = r#"{"file":"https://cdn.example.com/hls2/k/master.m3u8?t=9\u0026x=1"} "https://cdn.example.com/hls2/k/master.m3u8?t=9""#;
        assert_eq!(
            script_candidates(js),
            vec!["https://cdn.example.com/hls2/k/master.m3u8?t=9"]
        );
    }

    #[test]
    fn script_candidates_need_token() {
        let js = r#"src:"https://cdn.example.com/hls2/k/master.m3u8""#;
        assert!(script_candidates(js).is_empty());
    }

    #[test]
    fn master_validation_needs_both_markers() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nindex.m3u8\n";
        let media = "#EXTM3U\n#EXTINF:4.0,\nseg0.ts\n";

        assert!(matches!(Validation::MasterPlaylist.check(StatusCode::OK, master), ProbeOutcome::Valid));
        assert!(matches!(Validation::MasterPlaylist.check(StatusCode::OK, media), ProbeOutcome::Invalid(_)));
        assert!(matches!(Validation::AnyPlaylist.check(StatusCode::OK, media), ProbeOutcome::Valid));
        assert!(matches!(Validation::AnyPlaylist.check(StatusCode::FORBIDDEN, master), ProbeOutcome::Invalid(_)));
    }

    #[test]
    fn script_urls_resolve_against_embed() {
        let embed = EmbedPage {
            url: "https://filemoon.example/e/abc".to_string(),
            origin: origin_of("https://filemoon.example/e/abc"),
            referer: "https://site.example/ep-1".to_string(),
            html: r#"<script src="/js/player.js"></script><script src="//cdn.example/p.js"></script><script src="data:text/javascript,1"></script>"#.to_string(),
        };

        assert_eq!(embed.origin.as_deref(), Some("https://filemoon.example"));
        assert_eq!(
            script_urls(&embed),
            vec!["https://filemoon.example/js/player.js", "https://cdn.example/p.js"]
        );
    }
}
