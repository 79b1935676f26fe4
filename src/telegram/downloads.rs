//! Download orchestration
//!
//! Every URL a user sends funnels through here: required-channel gate,
//! admission check, adapter dispatch, delivery, and usage recording. This
//! is the only module that calls `check_admission` before work and
//! `record_completed_download` after it — adapters themselves never touch
//! quota state.

use std::path::Path;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Recipient};

use crate::core::admission::{self, ContentType, Decision};
use crate::core::config;
use crate::core::utils::{self, format_size, Platform};
use crate::download::{instagram, music, video, DownloadOutcome};
use crate::storage::db::{self, DbPool};
use crate::telegram::Bot;

/// Keyboard attached to every quota denial — this outcome gets an upgrade
/// prompt, not an error message.
fn vip_upsell_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "خرید اشتراک VIP".to_string(),
            "menu:vip".to_string(),
        )],
        vec![InlineKeyboardButton::callback(
            "🔙 بازگشت به منوی اصلی".to_string(),
            "menu:main".to_string(),
        )],
    ])
}

fn channel_recipient(channel_id: &str) -> Recipient {
    match channel_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(channel_id.to_string()),
    }
}

/// Verify the user joined every required channel; on failure send the join
/// prompt and return false.
///
/// Membership lookups that error count as joined — the gate must not lock
/// users out because a channel became unreachable.
async fn ensure_channels_joined(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: &DbPool) -> ResponseResult<bool> {
    let channels = match db::get_connection(db_pool).map(|conn| db::get_required_channels(&conn)) {
        Ok(Ok(channels)) => channels,
        Ok(Err(e)) => {
            log::error!("Failed to load required channels: {}", e);
            return Ok(true);
        }
        Err(e) => {
            log::error!("Failed to get connection for channel gate: {}", e);
            return Ok(true);
        }
    };

    let mut missing = Vec::new();
    for channel in channels {
        let member = bot
            .get_chat_member(channel_recipient(&channel.channel_id), UserId(user_id as u64))
            .await;
        match member {
            Ok(member) if member.is_present() => {}
            Ok(_) => missing.push(channel),
            Err(e) => {
                log::warn!("Membership check failed for {}: {}", channel.channel_id, e);
            }
        }
    }

    if missing.is_empty() {
        return Ok(true);
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = missing
        .iter()
        .filter_map(|channel| {
            url::Url::parse(&channel.channel_url)
                .ok()
                .map(|link| vec![InlineKeyboardButton::url(channel.channel_name.clone(), link)])
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "🔙 بازگشت به منوی اصلی".to_string(),
        "menu:main".to_string(),
    )]);

    bot.send_message(
        chat_id,
        "⚠️ برای استفاده از ربات ابتدا باید در کانال‌های زیر عضو شوید:",
    )
    .reply_markup(InlineKeyboardMarkup::new(rows))
    .await?;

    Ok(false)
}

/// Run the admission gate and message the user on anything but `Allowed`.
///
/// Returns true when the download may start. The two negative outcomes get
/// different messages: "out of quota" prompts an upgrade, "couldn't check"
/// asks to retry — never conflate them.
async fn admit_or_reply(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: &DbPool) -> ResponseResult<bool> {
    match admission::check_admission(db_pool, user_id, config::quota::limit_bytes()) {
        Ok(Decision::Allowed) => Ok(true),
        Ok(Decision::Denied { used }) => {
            bot.send_message(
                chat_id,
                format!(
                    "⚠️ شما به محدودیت دانلود روزانه ({} مگابایت) رسیده‌اید.\n\
                     مصرف امروز شما: {}\n\
                     برای دانلود نامحدود، اشتراک VIP تهیه کنید.",
                    *config::quota::DAILY_DOWNLOAD_LIMIT_MB,
                    format_size(used)
                ),
            )
            .reply_markup(vip_upsell_keyboard())
            .await?;
            Ok(false)
        }
        Err(e) => {
            log::error!("Admission check failed for user {}: {}", user_id, e);
            bot.send_message(
                chat_id,
                "⚠️ بررسی سهمیه دانلود در حال حاضر ممکن نیست. لطفاً کمی بعد دوباره تلاش کنید.",
            )
            .await?;
            Ok(false)
        }
    }
}

/// Record a delivered download with the gate.
///
/// Fail open: the file is already with the user, so a storage error here
/// only costs accounting — log loudly and move on.
fn record_delivery(db_pool: &DbPool, user_id: i64, content_type: ContentType, url: &str, byte_size: u64) {
    match admission::record_completed_download(db_pool, user_id, content_type, Some(url), byte_size) {
        Ok(total) => log::info!(
            "Recorded {} download for user {}: {} ({} today)",
            content_type.as_str(),
            user_id,
            format_size(byte_size),
            format_size(total)
        ),
        Err(e) => log::error!(
            "UNACCOUNTED download: failed to record {} bytes for user {}: {}",
            byte_size,
            user_id,
            e
        ),
    }
}

fn cleanup_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Failed to remove delivered file {}: {}", path.display(), e);
    }
}

/// Register the delivered track in the songs catalog and return its id.
fn register_song(db_pool: &DbPool, outcome: &DownloadOutcome, platform: Platform, url: &str) -> Option<i64> {
    let conn = match db::get_connection(db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("Failed to get connection for song registration: {}", e);
            return None;
        }
    };

    if let Ok(Some(existing)) = db::get_song_by_url(&conn, url) {
        let _ = db::increment_download_count(&conn, existing.id);
        return Some(existing.id);
    }

    let title = outcome.title.clone().unwrap_or_else(|| "Unknown".to_string());
    match db::create_song(
        &conn,
        &title,
        None,
        Some(platform.as_str()),
        Some(url),
        outcome.file_path.to_str(),
        None,
    ) {
        Ok(song_id) => {
            let _ = db::increment_download_count(&conn, song_id);
            Some(song_id)
        }
        Err(e) => {
            log::warn!("Failed to register song {}: {}", url, e);
            None
        }
    }
}

/// Handle a music URL: single track or playlist fan-out.
pub async fn process_music_url(
    bot: Bot,
    chat_id: ChatId,
    user_id: i64,
    url: String,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    if !ensure_channels_joined(&bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    if !admit_or_reply(&bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }

    let platform = utils::extract_platform_from_url(&url);

    if utils::is_playlist_url(&url) {
        let status = bot
            .send_message(chat_id, "🎶 در حال دانلود پلی‌لیست... این کار ممکن است چند دقیقه طول بکشد.")
            .await?;

        match music::download_playlist(&url, user_id).await {
            Ok(outcomes) => {
                let count = outcomes.len();
                for outcome in outcomes {
                    // Every delivered track is accounted individually; the
                    // playlist was admitted once up front (overshoot is the
                    // accepted trade-off of an advisory check)
                    record_delivery(&db_pool, user_id, ContentType::Music, &url, outcome.byte_size);
                    register_song(&db_pool, &outcome, platform, &url);
                    send_audio_file(&bot, chat_id, &outcome).await;
                    cleanup_file(&outcome.file_path);
                }
                bot.edit_message_text(chat_id, status.id, format!("✅ {} آهنگ از پلی‌لیست ارسال شد.", count))
                    .await?;
            }
            Err(e) => {
                log::error!("Playlist download failed for {}: {}", url, e);
                bot.edit_message_text(
                    chat_id,
                    status.id,
                    "❌ دانلود پلی‌لیست ناموفق بود. لطفاً دوباره تلاش کنید.",
                )
                .await?;
            }
        }
        return Ok(());
    }

    let status = bot.send_message(chat_id, "🎵 در حال دانلود آهنگ...").await?;

    match music::download_track(&url, user_id).await {
        Ok(outcome) => {
            record_delivery(&db_pool, user_id, ContentType::Music, &url, outcome.byte_size);
            let song_id = register_song(&db_pool, &outcome, platform, &url);

            send_audio_file(&bot, chat_id, &outcome).await;
            cleanup_file(&outcome.file_path);
            bot.edit_message_text(
                chat_id,
                status.id,
                format!("✅ دانلود کامل شد ({}).", format_size(outcome.byte_size)),
            )
            .await?;

            if let Some(song_id) = song_id {
                offer_playlist_add(&bot, chat_id, song_id).await?;
            }
        }
        Err(e) => {
            log::error!("Music download failed for {}: {}", url, e);
            bot.edit_message_text(
                chat_id,
                status.id,
                "❌ دانلود آهنگ ناموفق بود. لطفاً لینک را بررسی کنید و دوباره تلاش کنید.",
            )
            .await?;
        }
    }

    Ok(())
}

/// Handle a YouTube URL (video download).
pub async fn process_youtube_url(
    bot: Bot,
    chat_id: ChatId,
    user_id: i64,
    url: String,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    if !ensure_channels_joined(&bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    if !admit_or_reply(&bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }

    let status = bot.send_message(chat_id, "🎬 در حال دانلود ویدیو...").await?;

    match video::download_video(&url, user_id).await {
        Ok(outcome) => {
            record_delivery(&db_pool, user_id, ContentType::Youtube, &url, outcome.byte_size);
            send_video_file(&bot, chat_id, &outcome).await;
            cleanup_file(&outcome.file_path);
            bot.edit_message_text(
                chat_id,
                status.id,
                format!("✅ دانلود کامل شد ({}).", format_size(outcome.byte_size)),
            )
            .await?;
        }
        Err(e) => {
            log::error!("YouTube download failed for {}: {}", url, e);
            bot.edit_message_text(chat_id, status.id, "❌ دانلود ویدیو ناموفق بود. لطفاً دوباره تلاش کنید.")
                .await?;
        }
    }

    Ok(())
}

/// Handle an Instagram URL (post/reel/story).
pub async fn process_instagram_url(
    bot: Bot,
    chat_id: ChatId,
    user_id: i64,
    url: String,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    if !ensure_channels_joined(&bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    if !admit_or_reply(&bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }

    let status = bot.send_message(chat_id, "📸 در حال دانلود از اینستاگرام...").await?;

    match instagram::download(&url, user_id).await {
        Ok(outcome) => {
            record_delivery(&db_pool, user_id, ContentType::Instagram, &url, outcome.byte_size);
            send_video_file(&bot, chat_id, &outcome).await;
            cleanup_file(&outcome.file_path);
            bot.edit_message_text(
                chat_id,
                status.id,
                format!("✅ دانلود کامل شد ({}).", format_size(outcome.byte_size)),
            )
            .await?;
        }
        Err(e) => {
            log::error!("Instagram download failed for {}: {}", url, e);
            bot.edit_message_text(
                chat_id,
                status.id,
                "❌ دانلود از اینستاگرام ناموفق بود. لطفاً دوباره تلاش کنید.",
            )
            .await?;
        }
    }

    Ok(())
}

async fn send_audio_file(bot: &Bot, chat_id: ChatId, outcome: &DownloadOutcome) {
    if let Err(e) = bot.send_audio(chat_id, InputFile::file(outcome.file_path.clone())).await {
        log::error!("Failed to send audio {}: {}", outcome.file_path.display(), e);
    }
}

async fn send_video_file(bot: &Bot, chat_id: ChatId, outcome: &DownloadOutcome) {
    if let Err(e) = bot.send_video(chat_id, InputFile::file(outcome.file_path.clone())).await {
        log::error!("Failed to send video {}: {}", outcome.file_path.display(), e);
    }
}

async fn offer_playlist_add(bot: &Bot, chat_id: ChatId, song_id: i64) -> ResponseResult<()> {
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "➕ افزودن به پلی‌لیست".to_string(),
        format!("pl:pick:{}", song_id),
    )]]);

    bot.send_message(chat_id, "می‌خواهید این آهنگ را به پلی‌لیست اضافه کنید؟")
        .reply_markup(keyboard)
        .await?;

    Ok(())
}
