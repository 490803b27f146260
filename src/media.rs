use std::fmt;

use serde::Serialize;

/// Quality label used for adaptive streams, where the manifest carries the
/// renditions itself.
pub const AUTO_QUALITY: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Progressive,
    Hls,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progressive => write!(f, "progressive"),
            Self::Hls => write!(f, "hls"),
        }
    }
}

/// The playable result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMedia {
    pub url: String,
    pub quality: String,
    pub stream_type: StreamType,
}

impl ResolvedMedia {
    pub fn progressive(url: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
            stream_type: StreamType::Progressive,
        }
    }

    pub fn hls(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: AUTO_QUALITY.to_string(),
            stream_type: StreamType::Hls,
        }
    }
}
