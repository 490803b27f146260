use async_trait::async_trait;
use tracing::{info, warn};

use super::{EmbedRequest, Provider};
use crate::error::ResolveError;
use crate::http::{HttpClient, request_headers};
use crate::media::ResolvedMedia;
use crate::parser::PageDocument;
use crate::quality;

/// Blogspot embeds serve a plain `<video>` with one `<source>` per quality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blogspot;

#[async_trait]
impl Provider for Blogspot {
    fn name(&self) -> &'static str {
        "blogspot"
    }

    fn token(&self) -> &'static str {
        "blogspot"
    }

    async fn extract(
        &self,
        client: &HttpClient,
        request: EmbedRequest<'_>,
    ) -> Result<Option<ResolvedMedia>, ResolveError> {
        info!(embed = request.embed_url, "fetching blogspot embed");
        let page = client
            .fetch(request.embed_url, request_headers(request.referer, None))
            .await?;

        let Some(video) = PageDocument::parse(&page.body).find_video_tag() else {
            warn!("no video tag in blogspot embed");
            return Ok(None);
        };

        let qualities = video.quality_map();
        if qualities.is_empty() {
            warn!("no labelled video sources in blogspot embed");
            return Ok(None);
        }

        info!(qualities = ?qualities.qualities(), "blogspot qualities found");
        Ok(quality::select(&qualities, request.preferred_quality))
    }
}
