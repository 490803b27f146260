//! Embed providers and the table used to pick one.
//!
//! Dispatch is data: [`default_providers`] returns the providers in priority
//! order and [`classify`] returns the first whose token occurs in the iframe
//! source. Adding a provider means adding an entry, not a branch.

mod blogspot;
mod filemoon;

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::http::HttpClient;
use crate::media::ResolvedMedia;
use crate::parser::EmbedReference;

pub use blogspot::Blogspot;
pub use filemoon::{Filemoon, ProbeOutcome, Validation};

/// What an extractor needs to know about the embed it was routed.
#[derive(Debug, Clone, Copy)]
pub struct EmbedRequest<'a> {
    pub embed_url: &'a str,
    /// Page that embedded the iframe; sent as Referer on the embed fetch.
    pub referer: &'a str,
    pub preferred_quality: &'a str,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Human readable name for logs and errors.
    fn name(&self) -> &'static str;

    /// Substring identifying this provider's iframe sources.
    fn token(&self) -> &'static str;

    /// `Ok(None)` means the embed was fetched but held nothing playable.
    async fn extract(
        &self,
        client: &HttpClient,
        request: EmbedRequest<'_>,
    ) -> Result<Option<ResolvedMedia>, ResolveError>;
}

/// Providers in dispatch priority: blogspot before filemoon.
pub fn default_providers() -> Vec<Box<dyn Provider>> {
    vec![Box::new(Blogspot), Box::new(Filemoon)]
}

pub fn classify<'a>(
    providers: &'a [Box<dyn Provider>],
    embed: &EmbedReference,
) -> Option<&'a dyn Provider> {
    providers
        .iter()
        .find(|provider| embed.matches(provider.token()))
        .map(|provider| provider.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embed(url: &str) -> EmbedReference {
        EmbedReference {
            source_url: url.to_string(),
        }
    }

    #[test]
    fn classifies_known_tokens() {
        let providers = default_providers();
        let hit = classify(&providers, &embed("https://x.blogspot.com/video.g?token=1")).unwrap();
        assert_eq!(hit.name(), "blogspot");

        let hit = classify(&providers, &embed("https://FILEMOON.sx/e/abc")).unwrap();
        assert_eq!(hit.name(), "filemoon");
    }

    #[test]
    fn blogspot_outranks_filemoon() {
        let providers = default_providers();
        let both = embed("https://filemoon.example/e/x?mirror=blogspot");
        assert_eq!(classify(&providers, &both).unwrap().name(), "blogspot");
    }

    #[test]
    fn unknown_host_is_unclassified() {
        let providers = default_providers();
        assert!(classify(&providers, &embed("https://unknown-provider.example/x")).is_none());
    }
}
