//! VIP subscription flow
//!
//! Purchase is card-based and manually confirmed: the user picks a tier,
//! gets the card number to transfer to, and an admin presses the approve
//! button once the money shows up. Only the approval callback touches the
//! entitlement state.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config;
use crate::core::error::AppError;
use crate::core::vip::{self, Tier};
use crate::storage::db::DbPool;
use crate::telegram::{notifications, Bot};

/// Render a stored "YYYY-MM-DD HH:MM:SS" timestamp as a plain date for
/// user-facing messages; shown verbatim if it ever fails to parse.
fn format_end_date(raw: &str) -> String {
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        Ok(parsed) => parsed.format("%Y-%m-%d").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Show the VIP menu: active subscription info, or the purchase options.
pub async fn show_vip_menu(bot: &Bot, chat_id: ChatId, db_pool: Arc<DbPool>) -> ResponseResult<()> {
    let subscription = match vip::get_active_subscription(&db_pool, chat_id.0) {
        Ok(sub) => sub,
        Err(e) => {
            log::error!("Failed to resolve subscription for {}: {}", chat_id.0, e);
            bot.send_message(
                chat_id,
                "⚠️ بررسی وضعیت اشتراک در حال حاضر ممکن نیست. لطفاً کمی بعد دوباره تلاش کنید.",
            )
            .await?;
            return Ok(());
        }
    };

    match subscription {
        Some(sub) => {
            let end_date = format_end_date(&sub.end_date);
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    "تمدید اشتراک".to_string(),
                    "vip:extend".to_string(),
                )],
                vec![InlineKeyboardButton::callback(
                    "🔙 بازگشت به منوی اصلی".to_string(),
                    "menu:main".to_string(),
                )],
            ]);

            bot.send_message(
                chat_id,
                format!(
                    "✅ اشتراک VIP شما فعال است\n\n\
                     تاریخ پایان اشتراک: {}\n\n\
                     با اشتراک VIP شما می‌توانید:\n\
                     • بدون محدودیت دانلود کنید\n\
                     • به تمام قابلیت‌های ربات دسترسی داشته باشید\n\
                     • پلی‌لیست‌های نامحدود بسازید",
                    end_date
                ),
            )
            .reply_markup(keyboard)
            .await?;
        }
        None => {
            send_tier_options(bot, chat_id).await?;
        }
    }

    Ok(())
}

/// Tier selection keyboard, shown both for first purchase and extension.
pub async fn send_tier_options(bot: &Bot, chat_id: ChatId) -> ResponseResult<()> {
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(
                format!("یک ماهه ({} تومان)", *config::vip::ONE_MONTH_PRICE),
                "vip:buy:one_month".to_string(),
            ),
            InlineKeyboardButton::callback(
                format!("سه ماهه ({} تومان)", *config::vip::THREE_MONTH_PRICE),
                "vip:buy:three_month".to_string(),
            ),
        ],
        vec![InlineKeyboardButton::callback(
            "🔙 بازگشت به منوی اصلی".to_string(),
            "menu:main".to_string(),
        )],
    ]);

    bot.send_message(
        chat_id,
        "⭐️ اشتراک VIP\n\n\
         با خرید اشتراک VIP می‌توانید:\n\
         • بدون محدودیت دانلود کنید (بدون سقف ۲ گیگابایت روزانه)\n\
         • به تمام قابلیت‌های ربات دسترسی داشته باشید\n\
         • پلی‌لیست‌های نامحدود بسازید\n\n\
         لطفاً نوع اشتراک مورد نظر خود را انتخاب کنید:",
    )
    .reply_markup(keyboard)
    .await?;

    Ok(())
}

/// Handle `vip:*` callback data.
pub async fn handle_vip_callback(
    bot: &Bot,
    query: &CallbackQuery,
    data: &str,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    let chat_id = match query.message.as_ref() {
        Some(message) => message.chat().id,
        None => return Ok(()),
    };

    match data {
        "vip:extend" => {
            // Extension uses the same tiers; durations stack server-side
            send_tier_options(bot, chat_id).await?;
        }
        _ if data.starts_with("vip:buy:") => {
            let tier_name = &data["vip:buy:".len()..];
            let tier = match Tier::from_str(tier_name) {
                Ok(tier) => tier,
                Err(e) => {
                    // Callback data is produced by our own keyboards, so an
                    // unknown tier is a bug — fail loudly, grant nothing
                    log::error!("VIP purchase with invalid tier: {}", e);
                    bot.send_message(chat_id, "⚠️ خطای داخلی. لطفاً دوباره تلاش کنید.").await?;
                    return Ok(());
                }
            };

            send_payment_instructions(bot, chat_id, tier).await?;

            let username = query.from.username.as_deref();
            notifications::notify_payment_request(bot, query.from.id.0 as i64, username, tier).await;
        }
        _ if data.starts_with("vip:approve:") => {
            handle_approve(bot, query, data, db_pool).await?;
        }
        other => {
            log::warn!("Unknown vip callback: {}", other);
        }
    }

    Ok(())
}

async fn send_payment_instructions(bot: &Bot, chat_id: ChatId, tier: Tier) -> ResponseResult<()> {
    let tier_label = match tier {
        Tier::OneMonth => "یک ماهه",
        Tier::ThreeMonth => "سه ماهه",
    };

    bot.send_message(
        chat_id,
        format!(
            "💳 خرید اشتراک {}\n\n\
             مبلغ: {} تومان\n\
             شماره کارت: {}\n\
             به نام: {}\n\n\
             پس از واریز، پرداخت شما توسط پشتیبانی بررسی و اشتراک فعال می‌شود.",
            tier_label,
            tier.price(),
            config::vip::PAYMENT_CARD_NUMBER.as_str(),
            config::vip::PAYMENT_CARD_OWNER.as_str(),
        ),
    )
    .await?;

    Ok(())
}

/// Admin pressed the approve button: grant the subscription and tell the
/// user. On a storage failure nothing is granted and the USER is not
/// notified — only the admin sees the error.
async fn handle_approve(
    bot: &Bot,
    query: &CallbackQuery,
    data: &str,
    db_pool: Arc<DbPool>,
) -> ResponseResult<()> {
    let admin_id = query.from.id.0 as i64;
    if !config::admin::is_admin_id(admin_id) {
        log::warn!("Non-admin {} attempted VIP approval", admin_id);
        return Ok(());
    }

    // vip:approve:<user_id>:<tier>
    let mut parts = data["vip:approve:".len()..].splitn(2, ':');
    let (user_id, tier) = match (
        parts.next().and_then(|s| s.parse::<i64>().ok()),
        parts.next().map(Tier::from_str),
    ) {
        (Some(user_id), Some(Ok(tier))) => (user_id, tier),
        _ => {
            log::error!("Malformed VIP approval callback: {}", data);
            return Ok(());
        }
    };

    match vip::grant(&db_pool, user_id, tier, tier.price()) {
        Ok(subscription) => {
            let end_date = format_end_date(&subscription.end_date);

            bot.send_message(
                ChatId(user_id),
                format!(
                    "🎉 اشتراک VIP شما فعال شد!\n\n\
                     تاریخ پایان اشتراک: {}\n\
                     از این پس دانلود شما بدون محدودیت روزانه است.",
                    end_date
                ),
            )
            .await?;

            bot.send_message(
                ChatId(admin_id),
                format!("✅ VIP granted to {} until {}", user_id, subscription.end_date),
            )
            .await?;
        }
        Err(e) => {
            // Do NOT tell the user they are subscribed — nothing was created
            log::error!("VIP grant failed for {}: {}", user_id, e);
            let reason = if e.is_storage_unavailable() {
                "storage unavailable, retry the button"
            } else if matches!(e, AppError::InvalidTier(_)) {
                "invalid tier in callback"
            } else {
                "see logs"
            };
            bot.send_message(
                ChatId(admin_id),
                format!("❌ VIP grant FAILED for {} ({}). User was not notified.", user_id, reason),
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::format_end_date;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_end_date_strips_time() {
        assert_eq!(format_end_date("2026-09-06 14:03:22"), "2026-09-06");
    }

    #[test]
    fn test_format_end_date_passes_through_garbage() {
        assert_eq!(format_end_date("soon"), "soon");
    }
}
