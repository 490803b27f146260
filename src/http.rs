//! Pooled HTTP transport shared by every stage of a resolution.
//!
//! One [`HttpClient`] is built at startup and cloned into whoever needs it;
//! clones share the same connection pool, which is safe for concurrent use.
//! Every response body is read to completion before a call returns, so the
//! connection goes back to the (small) pool before the next request starts.

use std::time::Duration;

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER,
};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Settings;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANG: &str = "en-US,en;q=0.5";
const POOL_SIZE: usize = 5;

/// Timeout applied to candidate probes, independent of the configured one.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        let url = url.to_string();
        if source.is_timeout() {
            Self::Timeout { url }
        } else if source.is_connect() {
            Self::Connect { url, source }
        } else {
            Self::Transport { url, source }
        }
    }
}

/// Bounded retry for transient statuses only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, status: StatusCode, attempt: u32) -> bool {
        attempt < self.max_retries && TRANSIENT_STATUSES.contains(&status.as_u16())
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub body: String,
    pub final_url: String,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        Self::with_retry(settings, RetryPolicy::default())
    }

    pub fn with_retry(settings: &Settings, retry: RetryPolicy) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANG));
        if let Ok(referer) = HeaderValue::from_str(&settings.base_url) {
            headers.insert(REFERER, referer);
        }

        // Accept-Encoding (gzip, deflate) is added by reqwest itself.
        let inner = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .pool_max_idle_per_host(POOL_SIZE)
            .build()
            .map_err(|e| FetchError::from_reqwest(&settings.base_url, e))?;

        Ok(Self {
            inner,
            timeout: settings.timeout,
            retry,
        })
    }

    /// GET `url`; anything but a 2xx status is an error.
    pub async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<FetchedPage, FetchError> {
        let page = self.execute(url, headers, self.timeout).await?;
        if !page.status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page)
    }

    /// GET `url` with the short probe timeout, returning whatever status came back.
    pub async fn probe(&self, url: &str, headers: HeaderMap) -> Result<FetchedPage, FetchError> {
        self.execute(url, headers, PROBE_TIMEOUT).await
    }

    async fn execute(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            let response = self
                .inner
                .get(url)
                .headers(headers.clone())
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))?;

            let status = response.status();
            let final_url = response.url().to_string();
            let body = response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))?;

            if self.retry.should_retry(status, attempt) {
                let delay = self.retry.delay_for_attempt(attempt);
                warn!(%url, %status, attempt, ?delay, "transient status, retrying");
                sleep(delay).await;
                attempt += 1;
                continue;
            }

            debug!(%url, %status, bytes = body.len(), "response read");
            return Ok(FetchedPage {
                status,
                body,
                final_url,
            });
        }
    }
}

/// Builds per-request header overrides. Values that are not valid header
/// text are skipped.
pub fn request_headers(referer: &str, origin: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, REFERER, referer);
    if let Some(origin) = origin {
        insert_header(&mut headers, ORIGIN, origin);
    }
    headers
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => debug!(header = %name, %value, "skipping invalid header value"),
    }
}
