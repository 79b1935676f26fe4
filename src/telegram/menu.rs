//! Main menu and callback routing

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config;
use crate::storage::db::{self, DbPool};
use crate::telegram::{admin, playlists, vip, Bot};

/// Show the main menu keyboard.
pub async fn show_main_menu(bot: &Bot, chat_id: ChatId) -> ResponseResult<()> {
    let mut rows = vec![
        vec![
            InlineKeyboardButton::callback("🎵 موسیقی".to_string(), "menu:music".to_string()),
            InlineKeyboardButton::callback("🎬 یوتیوب".to_string(), "menu:youtube".to_string()),
        ],
        vec![
            InlineKeyboardButton::callback("📸 اینستاگرام".to_string(), "menu:instagram".to_string()),
            InlineKeyboardButton::callback("⭐️ اشتراک VIP".to_string(), "menu:vip".to_string()),
        ],
        vec![
            InlineKeyboardButton::callback("🎼 پلی‌لیست‌ها".to_string(), "menu:playlists".to_string()),
            InlineKeyboardButton::callback("🕘 تاریخچه".to_string(), "menu:history".to_string()),
        ],
    ];

    if config::admin::is_admin_id(chat_id.0) {
        rows.push(vec![InlineKeyboardButton::callback(
            "🛠 مدیریت".to_string(),
            "menu:admin".to_string(),
        )]);
    }

    bot.send_message(chat_id, "لطفاً یکی از گزینه‌های زیر را انتخاب کنید:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;

    Ok(())
}

async fn show_music_menu(bot: &Bot, chat_id: ChatId) -> ResponseResult<()> {
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🔥 آهنگ‌های محبوب".to_string(), "music:popular".to_string()),
            InlineKeyboardButton::callback("🆕 آهنگ‌های جدید".to_string(), "music:new".to_string()),
        ],
        vec![InlineKeyboardButton::callback(
            "🔙 بازگشت به منوی اصلی".to_string(),
            "menu:main".to_string(),
        )],
    ]);

    bot.send_message(
        chat_id,
        "لطفاً لینک آهنگ یا پلی‌لیست را مستقیماً ارسال کنید.\n\
         پلتفرم‌های پشتیبانی‌شده: Spotify، Apple Music، SoundCloud، YouTube Music",
    )
    .reply_markup(keyboard)
    .await?;

    Ok(())
}

async fn show_song_list(bot: &Bot, chat_id: ChatId, db_pool: &DbPool, popular: bool) -> ResponseResult<()> {
    let songs = match db::get_connection(db_pool) {
        Ok(conn) => {
            let result = if popular {
                db::get_popular_songs(&conn, 10)
            } else {
                db::get_new_songs(&conn, 10)
            };
            result.unwrap_or_default()
        }
        Err(e) => {
            log::error!("Failed to get connection for song list: {}", e);
            Vec::new()
        }
    };

    if songs.is_empty() {
        bot.send_message(chat_id, "هنوز آهنگی ثبت نشده است.").await?;
        return Ok(());
    }

    let header = if popular { "🔥 آهنگ‌های محبوب:" } else { "🆕 آهنگ‌های جدید:" };
    let mut text = format!("{}\n\n", header);
    for (idx, song) in songs.iter().enumerate() {
        text.push_str(&format!("{}. {}", idx + 1, song.title));
        if let Some(url) = &song.url {
            text.push_str(&format!("\n   {}", url));
        }
        text.push('\n');
    }

    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// Central callback-query router.
///
/// Data is namespaced by prefix: `menu:` sections here, `vip:`, `pl:` and
/// `admin:` delegated to their modules.
pub async fn handle_callback(bot: Bot, query: CallbackQuery, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    // Stop the client-side spinner no matter what happens next
    bot.answer_callback_query(query.id.clone()).await?;

    let data = match query.data.as_deref() {
        Some(data) => data.to_string(),
        None => return Ok(()),
    };
    let chat_id = match query.message.as_ref() {
        Some(message) => message.chat().id,
        None => return Ok(()),
    };

    log::debug!("Callback from {}: {}", chat_id.0, data);

    match data.as_str() {
        "menu:main" => show_main_menu(&bot, chat_id).await?,
        "menu:music" => show_music_menu(&bot, chat_id).await?,
        "menu:youtube" => {
            bot.send_message(chat_id, "🎬 لینک ویدیوی یوتیوب را ارسال کنید.").await?;
        }
        "menu:instagram" => {
            bot.send_message(
                chat_id,
                "📸 لینک پست، ریلز یا استوری اینستاگرام را ارسال کنید.",
            )
            .await?;
        }
        "menu:vip" => vip::show_vip_menu(&bot, chat_id, db_pool).await?,
        "menu:playlists" => playlists::show_playlists(&bot, chat_id, db_pool).await?,
        "menu:history" => playlists::show_history(&bot, chat_id, db_pool).await?,
        "menu:admin" => admin::show_admin_panel(&bot, chat_id, db_pool).await?,
        "music:popular" => show_song_list(&bot, chat_id, &db_pool, true).await?,
        "music:new" => show_song_list(&bot, chat_id, &db_pool, false).await?,
        _ if data.starts_with("vip:") => vip::handle_vip_callback(&bot, &query, &data, db_pool).await?,
        _ if data.starts_with("pl:") => playlists::handle_playlist_callback(&bot, &query, &data, db_pool).await?,
        _ if data.starts_with("admin:") => admin::handle_admin_callback(&bot, &query, &data, db_pool).await?,
        other => log::warn!("Unknown callback data: {}", other),
    }

    Ok(())
}
