//! Instagram download adapter
//!
//! Posts, reels and stories all resolve through yt-dlp's Instagram
//! extractor. Only the URL kind differs; stories additionally require the
//! extractor to be logged in, which is yt-dlp's concern, not ours.

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::{self, Platform};
use crate::download::{ytdlp, DownloadOutcome};

/// Kind of Instagram link, by URL shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstagramKind {
    Post,
    Reel,
    Story,
}

/// Classify an Instagram URL, rejecting everything else.
pub fn classify(url: &str) -> AppResult<InstagramKind> {
    if utils::extract_platform_from_url(url) != Platform::Instagram {
        return Err(AppError::Validation(format!("Not an Instagram URL: {}", url)));
    }

    let lower = url.to_lowercase();
    if lower.contains("/reel/") || lower.contains("/reels/") {
        Ok(InstagramKind::Reel)
    } else if lower.contains("/stories/") {
        Ok(InstagramKind::Story)
    } else {
        Ok(InstagramKind::Post)
    }
}

/// Download an Instagram post/reel/story into the user's directory.
pub async fn download(url: &str, user_id: i64) -> AppResult<DownloadOutcome> {
    let kind = classify(url)?;
    log::info!("Instagram download ({:?}): {}", kind, url);

    let dest_dir = utils::create_user_download_dir(&config::DOWNLOAD_FOLDER, user_id)?;

    let file_path = ytdlp::fetch_video(url, &dest_dir).await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_post() {
        assert_eq!(
            classify("https://www.instagram.com/p/Cxyz123/").unwrap(),
            InstagramKind::Post
        );
    }

    #[test]
    fn test_classify_reel() {
        assert_eq!(
            classify("https://www.instagram.com/reel/Cxyz123/").unwrap(),
            InstagramKind::Reel
        );
    }

    #[test]
    fn test_classify_story() {
        assert_eq!(
            classify("https://www.instagram.com/stories/someone/123/").unwrap(),
            InstagramKind::Story
        );
    }

    #[test]
    fn test_classify_rejects_non_instagram() {
        let err = classify("https://youtu.be/abc").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
