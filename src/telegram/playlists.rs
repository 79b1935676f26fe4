//! Playlist management UI
//!
//! Playlists organize downloaded tracks. Creation goes through the
//! `/newplaylist` command; everything else is inline-keyboard callbacks
//! under the `pl:` prefix. Every mutating callback re-checks ownership —
//! callback data is user-forgeable.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::utils::format_size;
use crate::storage::db::{self, DbPool};
use crate::telegram::Bot;

/// Show the user's playlists with one button per playlist.
pub async fn show_playlists(bot: &Bot, chat_id: ChatId, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    let playlists = match db::get_connection(&db_pool).map(|conn| db::get_user_playlists(&conn, chat_id.0)) {
        Ok(Ok(playlists)) => playlists,
        Ok(Err(e)) => {
            log::error!("Failed to load playlists for {}: {}", chat_id.0, e);
            bot.send_message(chat_id, "⚠️ دریافت پلی‌لیست‌ها ممکن نیست. لطفاً دوباره تلاش کنید.")
                .await?;
            return Ok(());
        }
        Err(e) => {
            log::error!("Failed to get connection for playlists: {}", e);
            bot.send_message(chat_id, "⚠️ دریافت پلی‌لیست‌ها ممکن نیست. لطفاً دوباره تلاش کنید.")
                .await?;
            return Ok(());
        }
    };

    if playlists.is_empty() {
        bot.send_message(
            chat_id,
            "شما هنوز پلی‌لیستی ندارید.\nبرای ساخت پلی‌لیست جدید:\n/newplaylist نام‌پلی‌لیست",
        )
        .await?;
        return Ok(());
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = playlists
        .iter()
        .map(|playlist| {
            vec![InlineKeyboardButton::callback(
                format!("🎼 {}", playlist.name),
                format!("pl:show:{}", playlist.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "🔙 بازگشت به منوی اصلی".to_string(),
        "menu:main".to_string(),
    )]);

    bot.send_message(chat_id, "🎼 پلی‌لیست‌های شما:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;

    Ok(())
}

/// Handle `/newplaylist <name>`.
pub async fn create_playlist_command(bot: &Bot, chat_id: ChatId, name: &str, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    let name = name.trim();
    if name.is_empty() {
        bot.send_message(chat_id, "استفاده: /newplaylist نام‌پلی‌لیست").await?;
        return Ok(());
    }

    match db::get_connection(&db_pool).map(|conn| db::create_playlist(&conn, chat_id.0, name, None)) {
        Ok(Ok(_)) => {
            bot.send_message(chat_id, format!("✅ پلی‌لیست «{}» ساخته شد.", name)).await?;
        }
        Ok(Err(e)) => {
            log::error!("Failed to create playlist for {}: {}", chat_id.0, e);
            bot.send_message(chat_id, "⚠️ ساخت پلی‌لیست ناموفق بود. لطفاً دوباره تلاش کنید.")
                .await?;
        }
        Err(e) => {
            log::error!("Failed to get connection for playlist creation: {}", e);
            bot.send_message(chat_id, "⚠️ ساخت پلی‌لیست ناموفق بود. لطفاً دوباره تلاش کنید.")
                .await?;
        }
    }

    Ok(())
}

/// Handle `pl:*` callback data.
pub async fn handle_playlist_callback(
    bot: &Bot,
    query: &CallbackQuery,
    data: &str,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    let chat_id = match query.message.as_ref() {
        Some(message) => message.chat().id,
        None => return Ok(()),
    };
    let user_id = query.from.id.0 as i64;

    let conn = match db::get_connection(&db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get connection for playlist callback: {}", e);
            bot.send_message(chat_id, "⚠️ خطای موقت. لطفاً دوباره تلاش کنید.").await?;
            return Ok(());
        }
    };

    if let Some(playlist_id) = parse_suffix_id(data, "pl:show:") {
        let playlist = match db::get_playlist(&conn, playlist_id) {
            Ok(Some(playlist)) if playlist.user_id == user_id => playlist,
            Ok(_) => return Ok(()),
            Err(e) => {
                log::error!("Failed to load playlist {}: {}", playlist_id, e);
                return Ok(());
            }
        };

        let songs = db::get_playlist_songs(&conn, playlist_id).unwrap_or_default();
        let mut text = format!("🎼 {}\n\n", playlist.name);
        if songs.is_empty() {
            text.push_str("این پلی‌لیست خالی است.");
        } else {
            for (idx, song) in songs.iter().enumerate() {
                text.push_str(&format!("{}. {}\n", idx + 1, song.title));
            }
        }

        let keyboard = InlineKeyboardMarkup::new(vec![
            vec![InlineKeyboardButton::callback(
                "🗑 حذف پلی‌لیست".to_string(),
                format!("pl:del:{}", playlist_id),
            )],
            vec![InlineKeyboardButton::callback(
                "🔙 بازگشت".to_string(),
                "menu:playlists".to_string(),
            )],
        ]);

        bot.send_message(chat_id, text).reply_markup(keyboard).await?;
    } else if let Some(playlist_id) = parse_suffix_id(data, "pl:del:") {
        match db::get_playlist(&conn, playlist_id) {
            Ok(Some(playlist)) if playlist.user_id == user_id => {
                if let Err(e) = db::delete_playlist(&conn, playlist_id) {
                    log::error!("Failed to delete playlist {}: {}", playlist_id, e);
                    bot.send_message(chat_id, "⚠️ حذف پلی‌لیست ناموفق بود.").await?;
                } else {
                    bot.send_message(chat_id, format!("🗑 پلی‌لیست «{}» حذف شد.", playlist.name))
                        .await?;
                }
            }
            Ok(_) => {}
            Err(e) => log::error!("Failed to load playlist {}: {}", playlist_id, e),
        }
    } else if let Some(song_id) = parse_suffix_id(data, "pl:pick:") {
        // Offer the user's playlists as targets for the just-downloaded song
        let playlists = db::get_user_playlists(&conn, user_id).unwrap_or_default();
        if playlists.is_empty() {
            bot.send_message(
                chat_id,
                "شما هنوز پلی‌لیستی ندارید.\nابتدا با /newplaylist یکی بسازید.",
            )
            .await?;
            return Ok(());
        }

        let rows: Vec<Vec<InlineKeyboardButton>> = playlists
            .iter()
            .map(|playlist| {
                vec![InlineKeyboardButton::callback(
                    playlist.name.clone(),
                    format!("pl:addto:{}:{}", playlist.id, song_id),
                )]
            })
            .collect();

        bot.send_message(chat_id, "به کدام پلی‌لیست اضافه شود؟")
            .reply_markup(InlineKeyboardMarkup::new(rows))
            .await?;
    } else if data.starts_with("pl:addto:") {
        let mut parts = data["pl:addto:".len()..].splitn(2, ':');
        let (playlist_id, song_id) = match (
            parts.next().and_then(|s| s.parse::<i64>().ok()),
            parts.next().and_then(|s| s.parse::<i64>().ok()),
        ) {
            (Some(playlist_id), Some(song_id)) => (playlist_id, song_id),
            _ => {
                log::warn!("Malformed playlist-add callback: {}", data);
                return Ok(());
            }
        };

        match db::get_playlist(&conn, playlist_id) {
            Ok(Some(playlist)) if playlist.user_id == user_id => {
                if let Err(e) = db::add_song_to_playlist(&conn, playlist_id, song_id) {
                    log::error!("Failed to add song {} to playlist {}: {}", song_id, playlist_id, e);
                    bot.send_message(chat_id, "⚠️ افزودن به پلی‌لیست ناموفق بود.").await?;
                } else {
                    bot.send_message(chat_id, format!("✅ به پلی‌لیست «{}» اضافه شد.", playlist.name))
                        .await?;
                }
            }
            Ok(_) => {}
            Err(e) => log::error!("Failed to load playlist {}: {}", playlist_id, e),
        }
    } else {
        log::warn!("Unknown playlist callback: {}", data);
    }

    Ok(())
}

/// Show the user's recent download history (music menu shortcut).
pub async fn show_history(bot: &Bot, chat_id: ChatId, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    let records = match db::get_connection(&db_pool).map(|conn| db::get_user_downloads(&conn, chat_id.0, 10)) {
        Ok(Ok(records)) => records,
        _ => {
            bot.send_message(chat_id, "⚠️ دریافت تاریخچه ممکن نیست.").await?;
            return Ok(());
        }
    };

    if records.is_empty() {
        bot.send_message(chat_id, "هنوز دانلودی ثبت نشده است.").await?;
        return Ok(());
    }

    let mut text = "🕘 آخرین دانلودهای شما:\n\n".to_string();
    for record in &records {
        text.push_str(&format!(
            "• {} — {} ({})\n",
            record.content_type,
            format_size(record.file_size.max(0) as u64),
            record.download_date
        ));
    }

    bot.send_message(chat_id, text).await?;
    Ok(())
}

fn parse_suffix_id(data: &str, prefix: &str) -> Option<i64> {
    data.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::parse_suffix_id;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_suffix_id() {
        assert_eq!(parse_suffix_id("pl:show:42", "pl:show:"), Some(42));
        assert_eq!(parse_suffix_id("pl:show:abc", "pl:show:"), None);
        assert_eq!(parse_suffix_id("pl:del:42", "pl:show:"), None);
    }
}
