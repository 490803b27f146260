use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{info, warn};

use crate::http::USER_AGENT;
use crate::media::{ResolvedMedia, StreamType};

/// Headers the player must send along with the media URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackHeaders {
    pub user_agent: String,
    pub referer: String,
}

impl PlaybackHeaders {
    pub fn new(referer: impl Into<String>) -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            referer: referer.into(),
        }
    }
}

/// Appends `|User-Agent=..&Referer=..` unless the URL already carries a
/// pipe-delimited header section.
pub fn with_header_section(url: &str, headers: &PlaybackHeaders) -> String {
    if url.contains('|') {
        return url.to_string();
    }
    format!(
        "{}|User-Agent={}&Referer={}",
        url, headers.user_agent, headers.referer
    )
}

/// Inverse of [`with_header_section`]: the bare URL and its header pairs.
pub fn split_header_section(url: &str) -> (&str, Vec<(&str, &str)>) {
    let Some((bare, section)) = url.split_once('|') else {
        return (url, Vec::new());
    };

    let pairs = section
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(name, _)| !name.is_empty())
        .collect();
    (bare, pairs)
}

// Program plus fixed leading args (flatpak needs "run io.mpv.Mpv").
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlayerCommand {
    program: String,
    prefix: Vec<String>,
}

impl PlayerCommand {
    fn plain(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix: Vec::new(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.prefix);
        command
    }
}

/// mpv does not read the pipe convention, so headers become flags.
pub fn mpv_args(media: &ResolvedMedia, headers: &PlaybackHeaders) -> Vec<String> {
    let mut args = vec![
        "--force-window=yes".to_string(),
        "--keep-open=yes".to_string(),
        "--ytdl=no".to_string(),
        format!("--user-agent={}", headers.user_agent),
        format!("--referrer={}", headers.referer),
        format!("--force-media-title=anistream - {}", quality_label(media)),
    ];
    args.push(media.url.clone());
    args
}

pub fn vlc_args(media: &ResolvedMedia, headers: &PlaybackHeaders) -> Vec<String> {
    vec![
        "--no-video-title-show".to_string(),
        format!("--http-user-agent={}", headers.user_agent),
        format!("--http-referrer={}", headers.referer),
        media.url.clone(),
    ]
}

fn quality_label(media: &ResolvedMedia) -> String {
    match media.stream_type {
        StreamType::Hls => "auto".to_string(),
        StreamType::Progressive => format!("{}p", media.quality),
    }
}

/// Plays `media` with mpv, blocking until it exits.
pub fn play_with_mpv(media: &ResolvedMedia, headers: &PlaybackHeaders) -> Result<()> {
    let mpv = find_mpv()?;
    info!(player = %mpv.program, url = %media.url, "starting mpv");

    let status = mpv
        .command()
        .args(mpv_args(media, headers))
        .stdin(Stdio::null())
        .status()
        .context("Failed to start mpv")?;

    if !status.success() {
        return Err(anyhow!("mpv exited with {}", status));
    }
    Ok(())
}

/// Plays `media` with VLC, falling back to mpv when VLC is missing.
pub fn play_with_vlc(media: &ResolvedMedia, headers: &PlaybackHeaders) -> Result<()> {
    match find_program("vlc") {
        Some(vlc) => {
            info!(player = %vlc, url = %media.url, "starting vlc");
            let status = Command::new(&vlc)
                .args(vlc_args(media, headers))
                .status()
                .context("Failed to start VLC")?;

            if !status.success() {
                return Err(anyhow!("VLC exited with {}", status));
            }
            Ok(())
        }
        None => {
            warn!("VLC not found, falling back to mpv");
            play_with_mpv(media, headers)
        }
    }
}

fn find_mpv() -> Result<PlayerCommand> {
    if let Some(path) = find_program("mpv") {
        return Ok(PlayerCommand::plain(path));
    }

    // flatpak install
    let flatpak = Command::new("flatpak")
        .args(["info", "io.mpv.Mpv"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match flatpak {
        Ok(status) if status.success() => Ok(PlayerCommand {
            program: "flatpak".to_string(),
            prefix: vec!["run".to_string(), "io.mpv.Mpv".to_string()],
        }),
        _ => Err(anyhow!("mpv not found. Please install it.")),
    }
}

pub fn find_program(program: &str) -> Option<String> {
    let found = Command::new("which")
        .arg(program)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty());

    if found.is_some() {
        return found;
    }

    // common install locations
    ["/usr/bin", "/usr/local/bin", "/bin"]
        .iter()
        .map(|dir| format!("{dir}/{program}"))
        .find(|path| Path::new(path).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> PlaybackHeaders {
        PlaybackHeaders {
            user_agent: "UA/1.0".to_string(),
            referer: "https://site.example/".to_string(),
        }
    }

    #[test]
    fn header_section_is_appended_once() {
        let url = with_header_section("https://cdn.example/v.mp4", &headers());
        assert_eq!(
            url,
            "https://cdn.example/v.mp4|User-Agent=UA/1.0&Referer=https://site.example/"
        );
        assert_eq!(with_header_section(&url, &headers()), url);
    }

    #[test]
    fn header_section_splits_back() {
        let url = with_header_section("https://cdn.example/master.m3u8?token=t1", &headers());
        let (bare, pairs) = split_header_section(&url);
        assert_eq!(bare, "https://cdn.example/master.m3u8?token=t1");
        assert_eq!(
            pairs,
            vec![("User-Agent", "UA/1.0"), ("Referer", "https://site.example/")]
        );

        assert_eq!(split_header_section("https://x/v.mp4"), ("https://x/v.mp4", vec![]));
    }

    #[test]
    fn mpv_gets_headers_as_flags_and_url_last() {
        let media = ResolvedMedia::progressive("https://cdn.example/v.mp4", "720");
        let args = mpv_args(&media, &headers());
        assert!(args.contains(&"--user-agent=UA/1.0".to_string()));
        assert!(args.contains(&"--referrer=https://site.example/".to_string()));
        assert!(args.contains(&"--force-media-title=anistream - 720p".to_string()));
        assert_eq!(args.last().unwrap(), "https://cdn.example/v.mp4");
    }

    #[test]
    fn vlc_gets_http_flags() {
        let media = ResolvedMedia::hls("https://cdn.example/master.m3u8?t=1");
        let args = vlc_args(&media, &headers());
        assert_eq!(args[1], "--http-user-agent=UA/1.0");
        assert_eq!(args[2], "--http-referrer=https://site.example/");
    }
}
