//! Resolve a content page on the catalog site into a playable stream URL.
//!
//! ```no_run
//! use anistream::{HttpClient, Resolver, Settings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(None);
//! let client = HttpClient::new(&settings)?;
//! let resolver = Resolver::new(client, &settings);
//!
//! let media = resolver
//!     .resolve("https://dorabash.com/anime/episode-1/", &settings.preferred_quality)
//!     .await?;
//! println!("{} ({})", media.url, media.quality);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod parser;
pub mod player;
pub mod providers;
pub mod quality;
pub mod resolver;
pub mod ui;

pub use config::Settings;
pub use error::{FailureKind, ResolveError};
pub use http::{HttpClient, RetryPolicy};
pub use media::{ResolvedMedia, StreamType};
pub use resolver::Resolver;
