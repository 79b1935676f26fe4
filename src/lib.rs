//! Snexus - Telegram bot for downloading music, videos and Instagram media
//!
//! This library provides all the core functionality for the Snexus bot,
//! including the daily download quota, VIP subscription handling, download
//! adapters, database operations, and Telegram bot integration.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, quota ledger, VIP resolution, admission
//! - `storage`: Database pool and all persistence
//! - `download`: yt-dlp engine and per-platform adapters
//! - `telegram`: Telegram bot integration and handlers

pub mod core;
pub mod download;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{handle_callback, handle_message, show_main_menu};
