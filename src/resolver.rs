//! Content page → playable URL.
//!
//! Fetch the page (following an info page to its player page), prefer a
//! direct `<video>` when it has labelled sources, otherwise route the first
//! iframe to the provider whose token it contains. Every way this can go
//! wrong ends in a [`ResolveError`]; nothing else escapes [`Resolver::resolve`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use reqwest::header::HeaderMap;
use tokio::time::timeout;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::ResolveError;
use crate::http::{HttpClient, request_headers};
use crate::media::ResolvedMedia;
use crate::parser::{EmbedReference, PageDocument};
use crate::providers::{self, EmbedRequest, Provider};
use crate::quality::{self, QualityMap};

/// Path segment that marks a synopsis page rather than a player page.
pub const INFO_PAGE_MARKER: &str = "/anime/";

pub struct Resolver {
    client: HttpClient,
    providers: Vec<Box<dyn Provider>>,
    budget: Option<Duration>,
}

/// Where the player page sends us next.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Direct(QualityMap),
    Embed(EmbedReference),
    Nothing,
}

impl Resolver {
    pub fn new(client: HttpClient, settings: &Settings) -> Self {
        Self {
            client,
            providers: providers::default_providers(),
            budget: settings.resolve_budget,
        }
    }

    /// Replaces the dispatch table. Order is priority.
    pub fn with_providers(mut self, providers: Vec<Box<dyn Provider>>) -> Self {
        self.providers = providers;
        self
    }

    pub async fn resolve(
        &self,
        content_url: &str,
        preferred_quality: &str,
    ) -> Result<ResolvedMedia, ResolveError> {
        let pipeline = AssertUnwindSafe(self.run(content_url, preferred_quality)).catch_unwind();

        let outcome = match self.budget {
            Some(budget) => match timeout(budget, pipeline).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(ResolveError::DeadlineExceeded(budget))),
            },
            None => pipeline.await,
        };

        let result = outcome.unwrap_or_else(|panic| {
            Err(ResolveError::Unexpected(panic_message(panic.as_ref())))
        });

        match &result {
            Ok(media) => info!(
                url = %media.url,
                quality = %media.quality,
                stream_type = %media.stream_type,
                "resolved"
            ),
            Err(e) => error!(content_url, kind = ?e.kind(), error = %e, "resolution failed"),
        }
        result
    }

    async fn run(
        &self,
        content_url: &str,
        preferred_quality: &str,
    ) -> Result<ResolvedMedia, ResolveError> {
        info!(content_url, preferred_quality, "fetching content page");
        let page = self.client.fetch(content_url, HeaderMap::new()).await?;

        let (player_url, body) = match player_url_for(content_url) {
            Some(player_url) => {
                info!(%player_url, "info page, following to player page");
                let player = self
                    .client
                    .fetch(&player_url, request_headers(content_url, None))
                    .await?;
                (player_url, player.body)
            }
            None => {
                info!("player page");
                (content_url.to_string(), page.body)
            }
        };

        match route(&body) {
            Route::Direct(qualities) => {
                info!(qualities = ?qualities.qualities(), "direct video tag");
                quality::select(&qualities, preferred_quality).ok_or(ResolveError::NoPlayableSource)
            }
            Route::Embed(embed) => self.dispatch(&embed, &player_url, preferred_quality).await,
            Route::Nothing => {
                warn!(%player_url, "no video tag and no iframe");
                Err(ResolveError::NoPlayableSource)
            }
        }
    }

    async fn dispatch(
        &self,
        embed: &EmbedReference,
        player_url: &str,
        preferred_quality: &str,
    ) -> Result<ResolvedMedia, ResolveError> {
        let Some(provider) = providers::classify(&self.providers, embed) else {
            return Err(ResolveError::UnsupportedProvider(embed.source_url.clone()));
        };

        let embed_url = absolute_embed_url(&embed.source_url, player_url);
        info!(provider = provider.name(), embed = %embed_url, "routing to provider");
        let request = EmbedRequest {
            embed_url: &embed_url,
            referer: player_url,
            preferred_quality,
        };

        provider
            .extract(&self.client, request)
            .await?
            .ok_or(ResolveError::ProviderExhausted {
                provider: provider.name(),
            })
    }
}

/// The player page for an info page URL, or `None` if `content_url` already
/// is a player page.
pub fn player_url_for(content_url: &str) -> Option<String> {
    content_url
        .contains(INFO_PAGE_MARKER)
        .then(|| content_url.replace(INFO_PAGE_MARKER, "/"))
}

fn route(html: &str) -> Route {
    let document = PageDocument::parse(html);

    if let Some(video) = document.find_video_tag() {
        if video.has_sources() {
            return Route::Direct(video.quality_map());
        }
        info!("video tag without labelled sources, looking for iframe");
    }

    document.find_iframe().map_or(Route::Nothing, Route::Embed)
}

/// Fetchable form of an iframe `src`. Providers are classified on the raw
/// `src`, never on this.
fn absolute_embed_url(src: &str, page_url: &str) -> String {
    if src.starts_with("//") || Url::parse(src).is_ok() {
        return quality::normalize_url(src);
    }
    Url::parse(page_url)
        .and_then(|base| base.join(src))
        .map(String::from)
        .unwrap_or_else(|_| src.to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic during resolution".to_string())
}
