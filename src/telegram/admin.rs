//! Admin panel
//!
//! Reachable only for ids in `ADMIN_USER_IDS`. Shows aggregate stats and
//! manages the required-channel list. VIP payment confirmation buttons are
//! handled in the vip module; this one is reporting and channel CRUD.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config;
use crate::core::stats;
use crate::storage::db::{self, DbPool};
use crate::telegram::Bot;

/// Show the admin panel with current stats.
pub async fn show_admin_panel(bot: &Bot, chat_id: ChatId, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    if !config::admin::is_admin_id(chat_id.0) {
        bot.send_message(chat_id, "این بخش فقط برای مدیران است.").await?;
        return Ok(());
    }

    let (bot_stats, sub_stats) = match (stats::bot_stats(&db_pool), stats::subscription_stats(&db_pool)) {
        (Ok(bot_stats), Ok(sub_stats)) => (bot_stats, sub_stats),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("Failed to collect admin stats: {}", e);
            bot.send_message(chat_id, "⚠️ Stats unavailable, storage error. Check logs.")
                .await?;
            return Ok(());
        }
    };

    let text = format!(
        "🛠 Admin panel\n\n\
         Users: {}\n\
         Active VIP users: {}\n\
         Downloads today: {}\n\n\
         Subscriptions (lifetime): {}\n\
         Active subscriptions: {}\n\
         • one_month: {}\n\
         • three_month: {}\n\
         Revenue: {} Toman",
        bot_stats.total_users,
        bot_stats.vip_users,
        bot_stats.downloads_today,
        sub_stats.total_subscriptions,
        sub_stats.active_subscriptions,
        sub_stats.one_month_subscriptions,
        sub_stats.three_month_subscriptions,
        sub_stats.total_revenue,
    );

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "📢 Required channels".to_string(),
            "admin:channels".to_string(),
        )],
        vec![InlineKeyboardButton::callback(
            "👑 Active VIP list".to_string(),
            "admin:viplist".to_string(),
        )],
    ]);

    bot.send_message(chat_id, text).reply_markup(keyboard).await?;
    Ok(())
}

/// Handle `admin:*` callback data.
pub async fn handle_admin_callback(
    bot: &Bot,
    query: &CallbackQuery,
    data: &str,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    let admin_id = query.from.id.0 as i64;
    if !config::admin::is_admin_id(admin_id) {
        log::warn!("Non-admin {} attempted admin callback {}", admin_id, data);
        return Ok(());
    }
    let chat_id = match query.message.as_ref() {
        Some(message) => message.chat().id,
        None => return Ok(()),
    };

    match data {
        "admin:channels" => {
            let channels = match db::get_connection(&db_pool).map(|conn| db::get_required_channels(&conn)) {
                Ok(Ok(channels)) => channels,
                _ => {
                    bot.send_message(chat_id, "⚠️ Failed to load channels.").await?;
                    return Ok(());
                }
            };

            let mut text = String::from("📢 Required channels:\n\n");
            if channels.is_empty() {
                text.push_str("(none)\n");
            } else {
                for channel in &channels {
                    text.push_str(&format!("• {} — {}\n", channel.channel_id, channel.channel_name));
                }
            }
            text.push_str("\nAdd:  /addchannel <id> <name> <url>\nRemove:  /delchannel <id>");

            bot.send_message(chat_id, text).await?;
        }
        "admin:viplist" => {
            let subscriptions = match db::get_connection(&db_pool).map(|conn| db::get_all_active_subscriptions(&conn)) {
                Ok(Ok(subscriptions)) => subscriptions,
                _ => {
                    bot.send_message(chat_id, "⚠️ Failed to load subscriptions.").await?;
                    return Ok(());
                }
            };

            let mut text = String::from("👑 Active subscriptions:\n\n");
            if subscriptions.is_empty() {
                text.push_str("(none)");
            } else {
                for sub in &subscriptions {
                    text.push_str(&format!(
                        "• {} — {} until {}\n",
                        sub.user_id, sub.subscription_type, sub.end_date
                    ));
                }
            }

            bot.send_message(chat_id, text).await?;
        }
        other => {
            log::warn!("Unknown admin callback: {}", other);
        }
    }

    Ok(())
}

/// Handle `/addchannel <id> <name> <url>`.
pub async fn add_channel_command(bot: &Bot, chat_id: ChatId, args: &str, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    if !config::admin::is_admin_id(chat_id.0) {
        return Ok(());
    }

    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 3 {
        bot.send_message(chat_id, "Usage: /addchannel <id> <name> <url>").await?;
        return Ok(());
    }
    let (channel_id, url) = (parts[0], parts[parts.len() - 1]);
    let name = parts[1..parts.len() - 1].join(" ");

    let conn = match db::get_connection(&db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get connection for addchannel: {}", e);
            bot.send_message(chat_id, "⚠️ Storage unavailable.").await?;
            return Ok(());
        }
    };

    match db::count_required_channels(&conn) {
        Ok(count) if count as usize >= *config::channels::MAX_REQUIRED_CHANNELS => {
            bot.send_message(
                chat_id,
                format!("Channel limit reached ({} max).", *config::channels::MAX_REQUIRED_CHANNELS),
            )
            .await?;
            return Ok(());
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("Failed to count channels: {}", e);
            return Ok(());
        }
    }

    match db::add_required_channel(&conn, channel_id, &name, url, chat_id.0) {
        Ok(()) => {
            bot.send_message(chat_id, format!("✅ Channel {} added.", channel_id)).await?;
        }
        Err(e) => {
            log::error!("Failed to add channel {}: {}", channel_id, e);
            bot.send_message(chat_id, "⚠️ Failed to add channel (duplicate id?).").await?;
        }
    }

    Ok(())
}

/// Handle `/delchannel <id>`.
pub async fn del_channel_command(bot: &Bot, chat_id: ChatId, args: &str, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    if !config::admin::is_admin_id(chat_id.0) {
        return Ok(());
    }

    let channel_id = args.trim();
    if channel_id.is_empty() {
        bot.send_message(chat_id, "Usage: /delchannel <id>").await?;
        return Ok(());
    }

    match db::get_connection(&db_pool).map(|conn| db::delete_required_channel(&conn, channel_id)) {
        Ok(Ok(())) => {
            bot.send_message(chat_id, format!("🗑 Channel {} removed.", channel_id)).await?;
        }
        Ok(Err(e)) => {
            log::error!("Failed to delete channel {}: {}", channel_id, e);
            bot.send_message(chat_id, "⚠️ Failed to remove channel.").await?;
        }
        Err(e) => {
            log::error!("Failed to get connection for delchannel: {}", e);
            bot.send_message(chat_id, "⚠️ Storage unavailable.").await?;
        }
    }

    Ok(())
}
