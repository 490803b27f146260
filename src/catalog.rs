use std::fmt;

use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use tracing::info;
use url::Url;

use crate::http::HttpClient;
use crate::parser::{CatalogCard, PageDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    HindiDubbed,
    EnglishSubbed,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::HindiDubbed, Category::EnglishSubbed];

    pub fn slug(self) -> &'static str {
        match self {
            Self::HindiDubbed => "hindi-dubbed-movies",
            Self::EnglishSubbed => "english-subbed-movies",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HindiDubbed => write!(f, "Hindi Dubbed Movies"),
            Self::EnglishSubbed => write!(f, "English Subbed Movies"),
        }
    }
}

// Page 1 has no /page/1/ suffix.
pub fn category_url(base_url: &str, category: Category, page: u32) -> String {
    let base_url = base_url.trim_end_matches('/');
    if page > 1 {
        format!("{}/tag/{}/page/{}/", base_url, category.slug(), page)
    } else {
        format!("{}/tag/{}/", base_url, category.slug())
    }
}

pub fn search_url(base_url: &str, query: &str) -> String {
    format!(
        "{}/?s={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(query.trim())
    )
}

/// One page of a category listing.
pub async fn list_category(
    client: &HttpClient,
    base_url: &str,
    category: Category,
    page: u32,
) -> Result<Vec<CatalogCard>> {
    info!(%category, page, "listing category");
    let url = category_url(base_url, category, page);
    let entries = fetch_cards(client, &url, "Movie")
        .await
        .with_context(|| format!("Failed to load {category} page {page}"))?;

    info!(count = entries.len(), "catalog entries found");
    Ok(entries)
}

/// Title search.
pub async fn search(client: &HttpClient, base_url: &str, query: &str) -> Result<Vec<CatalogCard>> {
    info!(query, "searching");
    let url = search_url(base_url, query);
    let entries = fetch_cards(client, &url, "N/A")
        .await
        .with_context(|| format!("Search for \"{query}\" failed"))?;

    info!(count = entries.len(), "search results found");
    Ok(entries)
}

async fn fetch_cards(client: &HttpClient, url: &str, default_kind: &str) -> Result<Vec<CatalogCard>> {
    let page = client.fetch(url, HeaderMap::new()).await?;
    let mut cards = PageDocument::parse(&page.body).find_catalog_cards(default_kind);

    // Relative links are made absolute; the resolver needs full URLs.
    if let Ok(base) = Url::parse(&page.final_url) {
        for card in &mut cards {
            if let Ok(absolute) = base.join(&card.url) {
                card.url = absolute.into();
            }
        }
    }
    Ok(cards)
}
