use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://dorabash.com";
pub const DEFAULT_QUALITY: &str = "720";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Runtime settings read by the resolver and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub preferred_quality: String,
    pub timeout: Duration,
    pub debug: bool,
    /// Optional wall-clock budget for a whole resolution. `None` leaves
    /// each request bounded only by its own timeout.
    pub resolve_budget: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            preferred_quality: DEFAULT_QUALITY.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            debug: false,
            resolve_budget: None,
        }
    }
}

// On-disk shape. Timeouts may be written as numbers or strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    base_url: Option<String>,
    preferred_quality: Option<String>,
    timeout: Option<toml::Value>,
    debug: Option<bool>,
    resolve_budget: Option<toml::Value>,
}

impl Settings {
    /// Loads settings from `path`, or from the default location when `None`.
    ///
    /// A missing file yields defaults. An unreadable or malformed file is
    /// logged and also yields defaults: configuration never blocks playback.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid settings file, using defaults");
                Self::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read settings file, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let raw: RawSettings = toml::from_str(contents)?;
        let defaults = Self::default();

        Ok(Self {
            base_url: raw
                .base_url
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            preferred_quality: raw
                .preferred_quality
                .map(|q| normalize_quality(&q))
                .filter(|q| !q.is_empty())
                .unwrap_or(defaults.preferred_quality),
            timeout: raw
                .timeout
                .as_ref()
                .and_then(positive_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            debug: raw.debug.unwrap_or(false),
            resolve_budget: raw
                .resolve_budget
                .as_ref()
                .and_then(positive_secs)
                .map(Duration::from_secs),
        })
    }

    /// Applies `--timeout` style overrides using the same validation as the file.
    pub fn with_timeout_secs(mut self, secs: Option<i64>) -> Self {
        if let Some(secs) = secs {
            self.timeout = u64::try_from(secs)
                .ok()
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        }
        self
    }

    pub fn with_quality(mut self, quality: Option<&str>) -> Self {
        if let Some(q) = quality.map(normalize_quality).filter(|q| !q.is_empty()) {
            self.preferred_quality = q;
        }
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug |= debug;
        self
    }

    /// Referer handed to the media player, always with a trailing slash.
    pub fn playback_referer(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "anistream").map(|dirs| dirs.config_dir().join("settings.toml"))
}

// "1080p" and "1080" name the same quality.
fn normalize_quality(quality: &str) -> String {
    quality.trim().trim_end_matches(['p', 'P']).to_string()
}

fn positive_secs(value: &toml::Value) -> Option<u64> {
    let secs = match value {
        toml::Value::Integer(n) => *n,
        toml::Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    u64::try_from(secs).ok().filter(|s| *s > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timeout, Duration::from_secs(15));
    }

    #[test]
    fn timeout_accepts_integer_and_numeric_string() {
        let s = Settings::from_toml_str("timeout = 30").unwrap();
        assert_eq!(s.timeout, Duration::from_secs(30));

        let s = Settings::from_toml_str("timeout = \"20\"").unwrap();
        assert_eq!(s.timeout, Duration::from_secs(20));
    }

    #[test]
    fn invalid_timeout_falls_back_to_fifteen() {
        for body in ["timeout = 0", "timeout = -4", "timeout = \"soon\"", "timeout = 1.5"] {
            let s = Settings::from_toml_str(body).unwrap();
            assert_eq!(s.timeout, Duration::from_secs(15), "for {body}");
        }
    }

    #[test]
    fn quality_suffix_is_stripped() {
        let s = Settings::from_toml_str("preferred_quality = \"1080p\"").unwrap();
        assert_eq!(s.preferred_quality, "1080");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let s = Settings::from_toml_str("base_url = \"https://site.example/\"").unwrap();
        assert_eq!(s.base_url, "https://site.example");
        assert_eq!(s.playback_referer(), "https://site.example/");
    }

    #[test]
    fn resolve_budget_is_opt_in() {
        assert_eq!(Settings::default().resolve_budget, None);
        let s = Settings::from_toml_str("resolve_budget = 40").unwrap();
        assert_eq!(s.resolve_budget, Some(Duration::from_secs(40)));
    }

    #[test]
    fn cli_overrides_apply() {
        let s = Settings::default()
            .with_quality(Some("480p"))
            .with_timeout_secs(Some(-1))
            .with_debug(true);
        assert_eq!(s.preferred_quality, "480");
        assert_eq!(s.timeout, Duration::from_secs(15));
        assert!(s.debug);
    }

    #[test]
    fn load_reads_file_and_tolerates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        fs::write(&path, "preferred_quality = \"480\"\ntimeout = 9\n").unwrap();
        let s = Settings::load(Some(&path));
        assert_eq!(s.preferred_quality, "480");
        assert_eq!(s.timeout, Duration::from_secs(9));

        fs::write(&path, "this is = = not toml").unwrap();
        assert_eq!(Settings::load(Some(&path)), Settings::default());

        let missing = dir.path().join("nope.toml");
        assert_eq!(Settings::load(Some(&missing)), Settings::default());
    }
}
