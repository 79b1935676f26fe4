//! Telegram bot integration and handlers

pub mod admin;
pub mod commands;
pub mod downloads;
pub mod menu;
pub mod notifications;
pub mod playlists;
pub mod vip;

/// Bot type used across all handlers
pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use commands::{answer_command, handle_message, Command};
pub use menu::{handle_callback, show_main_menu};
