//! YouTube video download adapter

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::utils;
use crate::download::{ytdlp, DownloadOutcome};

/// Download a YouTube video as mp4 into the user's download directory.
pub async fn download_video(url: &str, user_id: i64) -> AppResult<DownloadOutcome> {
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

/// Download the audio track of a YouTube video as mp3.
///
/// Used when a YouTube link arrives through the music flow.
pub async fn download_audio(url: &str, user_id: i64) -> AppResult<DownloadOutcome> {
    let dest_dir = utils::create_user_download_dir(&config::DOWNLOAD_FOLDER, user_id)?;

    let file_path = ytdlp::fetch_audio(url, &dest_dir).await?;
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
