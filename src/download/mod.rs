//! Download adapters
//!
//! Each adapter delegates extraction entirely to yt-dlp and reports the
//! final file path plus byte size back to the caller. Admission checks and
//! usage recording live in the telegram layer — adapters only move bytes.

pub mod instagram;
pub mod music;
pub mod video;
pub mod ytdlp;

use std::path::PathBuf;

/// Result of a single completed download
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Final path of the delivered file
    pub file_path: PathBuf,
    /// Size of the delivered file in bytes; 0 when the size could not be
    /// determined (still counts as a successful download)
    pub byte_size: u64,
    /// Human-readable title, when the extractor provided one
    pub title: Option<String>,
}
