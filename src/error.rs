use std::time::Duration;

use thiserror::Error;

use crate::http::FetchError;

/// Why a resolution ended without a playable URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("unsupported page, no playable source")]
    NoPlayableSource,

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("{provider} embed yielded no playable stream")]
    ProviderExhausted { provider: &'static str },

    #[error("resolution did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

/// Stable tag for a [`ResolveError`], for callers that branch on the kind
/// of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    NoPlayableSource,
    UnsupportedProvider,
    ProviderExhausted,
    DeadlineExceeded,
    Unexpected,
}

impl ResolveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::NoPlayableSource => FailureKind::NoPlayableSource,
            Self::UnsupportedProvider(_) => FailureKind::UnsupportedProvider,
            Self::ProviderExhausted { .. } => FailureKind::ProviderExhausted,
            Self::DeadlineExceeded(_) => FailureKind::DeadlineExceeded,
            Self::Unexpected(_) => FailureKind::Unexpected,
        }
    }
}
