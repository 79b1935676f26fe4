//! Bot commands and free-text message handling

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::core::utils::{self, Platform};
use crate::storage::db::{self, DbPool};
use crate::telegram::{admin, downloads, menu, playlists, vip, Bot};

/// Cached regex for matching URLs
/// Compiled once at startup and reused for all requests
static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("Failed to compile URL regex"));

/// Bot commands
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "دستورات ربات:")]
pub enum Command {
    #[command(description = "شروع کار با ربات")]
    Start,
    #[command(description = "راهنما")]
    Help,
    #[command(description = "منوی اصلی")]
    Menu,
    #[command(description = "دانلود موسیقی")]
    Music,
    #[command(description = "دانلود ویدیوی یوتیوب")]
    Youtube,
    #[command(description = "دانلود از اینستاگرام")]
    Instagram,
    #[command(description = "اشتراک VIP")]
    Vip,
    #[command(description = "پلی‌لیست‌های من")]
    Playlists,
    #[command(description = "ساخت پلی‌لیست جدید")]
    NewPlaylist(String),
    #[command(description = "تاریخچه دانلود")]
    History,
    #[command(hide)]
    Admin,
    #[command(hide)]
    AddChannel(String),
    #[command(hide)]
    DelChannel(String),
}

/// Register the user on every contact so names stay fresh.
///
/// Failure here must not break handling — the quota path creates the row
/// implicitly anyway.
fn register_user(msg: &Message, db_pool: &DbPool) {
    let Some(from) = msg.from.as_ref() else {
        return;
    };

    match db::get_connection(db_pool) {
        Ok(conn) => {
            if let Err(e) = db::upsert_user(
                &conn,
                from.id.0 as i64,
                from.username.as_deref(),
                Some(from.first_name.as_str()),
                from.last_name.as_deref(),
            ) {
                log::warn!("Failed to upsert user {}: {}", from.id, e);
            }
        }
        Err(e) => log::warn!("Failed to get connection for user upsert: {}", e),
    }
}

/// Handle a parsed bot command.
pub async fn answer_command(bot: Bot, msg: Message, cmd: Command, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    register_user(&msg, &db_pool);
    let chat_id = msg.chat.id;

    match cmd {
        Command::Start => {
            bot.send_message(
                chat_id,
                "سلام! 👋\n\
                 من ربات دانلود اسنکسوس هستم.\n\
                 می‌توانم موسیقی، ویدیوی یوتیوب و محتوای اینستاگرام را برای شما دانلود کنم.\n\
                 کافی است لینک را ارسال کنید.",
            )
            .await?;
            menu::show_main_menu(&bot, chat_id).await?;
        }
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string()).await?;
        }
        Command::Menu => menu::show_main_menu(&bot, chat_id).await?,
        Command::Music => {
            bot.send_message(
                chat_id,
                "🎵 لینک آهنگ یا پلی‌لیست را ارسال کنید.\n\
                 پلتفرم‌های پشتیبانی‌شده: Spotify، Apple Music، SoundCloud، YouTube Music",
            )
            .await?;
        }
        Command::Youtube => {
            bot.send_message(chat_id, "🎬 لینک ویدیوی یوتیوب را ارسال کنید.").await?;
        }
        Command::Instagram => {
            bot.send_message(chat_id, "📸 لینک پست، ریلز یا استوری اینستاگرام را ارسال کنید.")
                .await?;
        }
        Command::Vip => vip::show_vip_menu(&bot, chat_id, db_pool).await?,
        Command::Playlists => playlists::show_playlists(&bot, chat_id, db_pool).await?,
        Command::NewPlaylist(name) => {
            playlists::create_playlist_command(&bot, chat_id, &name, db_pool).await?;
        }
        Command::History => playlists::show_history(&bot, chat_id, db_pool).await?,
        Command::Admin => admin::show_admin_panel(&bot, chat_id, db_pool).await?,
        Command::AddChannel(args) => admin::add_channel_command(&bot, chat_id, &args, db_pool).await?,
        Command::DelChannel(args) => admin::del_channel_command(&bot, chat_id, &args, db_pool).await?,
    }

    Ok(())
}

/// Handle free-text messages: extract a URL and route it to the matching
/// download flow.
pub async fn handle_message(bot: Bot, msg: Message, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        bot.send_message(
            msg.chat.id,
            "لطفاً لینک آهنگ، ویدیو یا پست اینستاگرام را به صورت متنی ارسال کنید.",
        )
        .await?;
        return Ok(());
    };

    register_user(&msg, &db_pool);
    let chat_id = msg.chat.id;
    let user_id = msg.from.as_ref().map(|from| from.id.0 as i64).unwrap_or(chat_id.0);

    let Some(url_match) = URL_REGEX.find(text) else {
        bot.send_message(
            chat_id,
            "لینکی پیدا نکردم. لطفاً لینک معتبر از Spotify، SoundCloud، YouTube یا Instagram ارسال کنید.",
        )
        .await?;
        return Ok(());
    };
    let url = url_match.as_str().to_string();

    if url.len() > config::validation::MAX_URL_LENGTH {
        log::warn!("URL too long: {} characters", url.len());
        bot.send_message(chat_id, "لینک بیش از حد طولانی است.").await?;
        return Ok(());
    }
    if !utils::is_valid_url(&url) {
        bot.send_message(chat_id, "لینک معتبر نیست.").await?;
        return Ok(());
    }

    match utils::extract_platform_from_url(&url) {
        Platform::Youtube => downloads::process_youtube_url(bot, chat_id, user_id, url, db_pool).await,
        Platform::Instagram => downloads::process_instagram_url(bot, chat_id, user_id, url, db_pool).await,
        Platform::Spotify | Platform::AppleMusic | Platform::SoundCloud => {
            downloads::process_music_url(bot, chat_id, user_id, url, db_pool).await
        }
        Platform::Other => {
            bot.send_message(
                chat_id,
                "این سرویس پشتیبانی نمی‌شود.\n\
                 سرویس‌های پشتیبانی‌شده: Spotify، Apple Music، SoundCloud، YouTube، Instagram",
            )
            .await?;
            Ok(())
        }
    }
}
