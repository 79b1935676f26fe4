//! Music download adapter
//!
//! Spotify and Apple Music cannot be downloaded directly, so their links
//! are resolved to "title — artist" via the platform's public oEmbed
//! endpoint and re-found on YouTube with a `ytsearch1:` query — the same
//! resolve-then-search approach the rest of the pipeline expects.
//! SoundCloud and YouTube Music links go to yt-dlp directly.

use serde::Deserialize;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::{self, Platform};
use crate::download::{ytdlp, DownloadOutcome};

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
}

/// Resolve a Spotify/Apple Music link to a YouTube search query.
async fn resolve_search_query(url: &str) -> AppResult<String> {
    let oembed_url = match utils::extract_platform_from_url(url) {
        Platform::Spotify => format!("https://open.spotify.com/oembed?url={}", url),
        Platform::AppleMusic => format!("https://music.apple.com/oembed?url={}", url),
        _ => return Err(AppError::Download(format!("No oEmbed resolver for {}", url))),
    };

    let client = reqwest::Client::builder()
        .timeout(config::network::timeout())
        .build()?;
    let response: OembedResponse = client.get(&oembed_url).send().await?.json().await?;

    let title = response
        .title
        .ok_or_else(|| AppError::Download(format!("No title in oEmbed response for {}", url)))?;

    Ok(match response.author_name {
        Some(artist) if !artist.is_empty() => format!("{} {}", title, artist),
        _ => title,
    })
}

/// Download a single track as mp3 into the user's download directory.
pub async fn download_track(url: &str, user_id: i64) -> AppResult<DownloadOutcome> {
    let dest_dir = utils::create_user_download_dir(&config::DOWNLOAD_FOLDER, user_id)?;

    let fetch_target = match utils::extract_platform_from_url(url) {
        Platform::Spotify | Platform::AppleMusic => {
            let query = resolve_search_query(url).await?;
            log::info!("Resolved {} to search query '{}'", url, query);
            format!("ytsearch1:{}", query)
        }
        _ => url.to_string(),
    };

    let file_path = ytdlp::fetch_audio(&fetch_target, &dest_dir).await?;
    let byte_size = ytdlp::file_size(&file_path);
    let title = file_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string());

    Ok(DownloadOutcome {
        file_path,
        byte_size,
        title,
    })
}

/// Download up to `MAX_PLAYLIST_TRACKS` tracks of a playlist, one by one.
///
/// Individual track failures are logged and skipped — a half-broken
/// playlist still delivers the rest. The caller records each returned
/// outcome separately so every delivered track is accounted.
pub async fn download_playlist(url: &str, user_id: i64) -> AppResult<Vec<DownloadOutcome>> {
    let entries = ytdlp::list_playlist_entries(url, config::download::MAX_PLAYLIST_TRACKS).await?;
    if entries.is_empty() {
        return Err(AppError::Download(format!("Playlist has no entries: {}", url)));
    }

    log::info!("Playlist {}: downloading {} tracks", url, entries.len());

    let mut outcomes = Vec::with_capacity(entries.len());
    for entry_url in &entries {
        match download_track(entry_url, user_id).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => log::warn!("Skipping playlist entry {}: {}", entry_url, e),
        }
    }

    if outcomes.is_empty() {
        return Err(AppError::Download(format!(
            "All {} playlist entries failed: {}",
            entries.len(),
            url
        )));
    }

    Ok(outcomes)
}

/// True when the adapter will be able to handle the URL at all.
pub fn is_music_url(url: &str) -> bool {
    matches!(
        utils::extract_platform_from_url(url),
        Platform::Spotify | Platform::AppleMusic | Platform::SoundCloud
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_music_url() {
        assert!(is_music_url("https://open.spotify.com/track/abc"));
        assert!(is_music_url("https://soundcloud.com/a/b"));
        assert!(!is_music_url("https://youtu.be/abc"));
        assert!(!is_music_url("https://www.instagram.com/p/abc/"));
    }

    #[test]
    fn test_oembed_response_parses() {
        let json = r#"{"title": "Gole Yakh", "author_name": "Kourosh Yaghmaei"}"#;
        let resp: OembedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.title.as_deref(), Some("Gole Yakh"));
        assert_eq!(resp.author_name.as_deref(), Some("Kourosh Yaghmaei"));
    }
}
