//! yt-dlp process wrapper
//!
//! All extraction is delegated to the yt-dlp binary (`YTDL_BIN`). Every
//! invocation runs under a timeout so a wedged extractor can never hang a
//! worker. The final file path comes from `--print after_move:filepath`
//! instead of guessing output names from templates.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command as TokioCommand;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// Metadata subset of yt-dlp's `--dump-single-json` output
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    /// Present for playlists; each entry carries at least a URL
    #[serde(default)]
    pub entries: Option<Vec<PlaylistEntry>>,
}

/// One playlist entry from a `--flat-playlist` dump
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    pub url: Option<String>,
    pub title: Option<String>,
}

async fn run_with_timeout(mut cmd: TokioCommand, context: &str) -> AppResult<std::process::Output> {
    let output = tokio::time::timeout(config::download::ytdlp_timeout(), cmd.output())
        .await
        .map_err(|_| {
            AppError::Download(format!(
                "yt-dlp timed out after {}s ({})",
                config::download::YTDLP_TIMEOUT_SECS,
                context
            ))
        })??;
    Ok(output)
}

fn stderr_snippet(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr.chars().take(500).collect()
}

/// Fetch metadata without downloading anything.
pub async fn probe(url: &str) -> AppResult<MediaInfo> {
    let ytdl_bin = config::YTDL_BIN.as_str();

    let mut cmd = TokioCommand::new(ytdl_bin);
    cmd.args(["--dump-single-json", "--flat-playlist", "--no-warnings", url]);

    let output = run_with_timeout(cmd, url).await?;
    if !output.status.success() {
        return Err(AppError::Download(format!(
            "yt-dlp probe failed for {}: {}",
            url,
            stderr_snippet(&output)
        )));
    }

    let info: MediaInfo = serde_json::from_slice(&output.stdout)
        .map_err(|e| AppError::Download(format!("Failed to parse yt-dlp metadata: {}", e)))?;
    Ok(info)
}

/// Download the best audio as mp3 into `dest_dir`, returning the file path.
///
/// `url` may be a direct link or a `ytsearch1:` query.
pub async fn fetch_audio(url: &str, dest_dir: &Path) -> AppResult<PathBuf> {
    let ytdl_bin = config::YTDL_BIN.as_str();
    let output_template = dest_dir.join("%(title)s.%(ext)s");

    let mut cmd = TokioCommand::new(ytdl_bin);
    cmd.args([
        "--no-playlist",
        "--no-warnings",
        "-x",
        "--audio-format",
        "mp3",
        "--no-simulate",
        "--print",
        "after_move:filepath",
        "-o",
    ])
    .arg(output_template)
    .arg(url);

    let output = run_with_timeout(cmd, url).await?;
    if !output.status.success() {
        return Err(AppError::Download(format!(
            "yt-dlp audio download failed for {}: {}",
            url,
            stderr_snippet(&output)
        )));
    }

    parse_printed_filepath(&output.stdout, url)
}

/// Download video (mp4 container preferred) into `dest_dir`.
pub async fn fetch_video(url: &str, dest_dir: &Path) -> AppResult<PathBuf> {
    let ytdl_bin = config::YTDL_BIN.as_str();
    let output_template = dest_dir.join("%(title)s.%(ext)s");

    let mut cmd = TokioCommand::new(ytdl_bin);
    cmd.args([
        "--no-playlist",
        "--no-warnings",
        "-f",
        "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
        "--merge-output-format",
        "mp4",
        "--no-simulate",
        "--print",
        "after_move:filepath",
        "-o",
    ])
    .arg(output_template)
    .arg(url);

    let output = run_with_timeout(cmd, url).await?;
    if !output.status.success() {
        return Err(AppError::Download(format!(
            "yt-dlp video download failed for {}: {}",
            url,
            stderr_snippet(&output)
        )));
    }

    parse_printed_filepath(&output.stdout, url)
}

/// List entry URLs of a playlist without downloading, capped at `limit`.
pub async fn list_playlist_entries(url: &str, limit: usize) -> AppResult<Vec<String>> {
    let info = probe(url).await?;
    let entries = info.entries.unwrap_or_default();

    Ok(entries
        .into_iter()
        .filter_map(|entry| entry.url)
        .take(limit)
        .collect())
}

fn parse_printed_filepath(stdout: &[u8], url: &str) -> AppResult<PathBuf> {
    let text = String::from_utf8_lossy(stdout);
    // yt-dlp prints one path per downloaded file; the last line is the
    // post-processed result
    let path = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .ok_or_else(|| AppError::Download(format!("yt-dlp reported no output file for {}", url)))?;

    Ok(PathBuf::from(path))
}

/// Size of the downloaded file in bytes, 0 when stat fails.
///
/// A failed stat is not a failed download — the file was delivered; its
/// usage just cannot be accounted precisely.
pub fn file_size(path: &Path) -> u64 {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            log::error!("Failed to stat downloaded file {}: {}", path.display(), e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_printed_filepath_takes_last_line() {
        let stdout = b"/tmp/a.webm\n/tmp/a.mp3\n";
        let path = parse_printed_filepath(stdout, "https://x").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/a.mp3"));
    }

    #[test]
    fn test_parse_printed_filepath_skips_blank_lines() {
        let stdout = b"\n/tmp/track.mp3\n\n";
        let path = parse_printed_filepath(stdout, "https://x").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/track.mp3"));
    }

    #[test]
    fn test_parse_printed_filepath_empty_is_error() {
        let err = parse_printed_filepath(b"", "https://x").unwrap_err();
        assert!(matches!(err, AppError::Download(_)));
    }

    #[test]
    fn test_file_size_missing_file_is_zero() {
        assert_eq!(file_size(Path::new("/nonexistent/file.mp3")), 0);
    }

    #[test]
    fn test_media_info_parses_flat_playlist_dump() {
        let json = r#"{
            "title": "Road Trip",
            "uploader": "dj",
            "entries": [
                {"url": "https://youtu.be/a", "title": "One"},
                {"url": "https://youtu.be/b", "title": "Two"}
            ]
        }"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.title.as_deref(), Some("Road Trip"));
        assert_eq!(info.entries.unwrap().len(), 2);
    }

    #[test]
    fn test_media_info_parses_single_track_dump() {
        let json = r#"{"title": "Song", "duration": 215.0}"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();
        assert!(info.entries.is_none());
        assert_eq!(info.duration, Some(215.0));
    }
}
