//! Admin notifications

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config::admin::ADMIN_USER_IDS;
use crate::core::vip::Tier;
use crate::telegram::Bot;

/// Send a plain text notification to every configured admin.
///
/// Failures are logged and swallowed — notifications must never break the
/// flow that triggered them.
pub async fn notify_admins_text(bot: &Bot, text: &str) {
    for admin_id in ADMIN_USER_IDS.iter() {
        if let Err(e) = bot.send_message(ChatId(*admin_id), text).await {
            log::warn!("Failed to notify admin {}: {}", admin_id, e);
        }
    }
}

/// Notify admins that a user claims to have paid for a VIP tier.
///
/// Carries an approve button; the actual money check happens out-of-band
/// (card statement), the button only triggers the grant.
pub async fn notify_payment_request(bot: &Bot, user_id: i64, username: Option<&str>, tier: Tier) {
    let who = match username {
        Some(name) => format!("@{} ({})", name, user_id),
        None => user_id.to_string(),
    };
    let text = format!(
        "💳 VIP payment claimed\nUser: {}\nTier: {}\nAmount: {} Toman\n\nConfirm after checking the card statement.",
        who,
        tier,
        tier.price()
    );

    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "✅ Confirm payment".to_string(),
        format!("vip:approve:{}:{}", user_id, tier.as_str()),
    )]]);

    for admin_id in ADMIN_USER_IDS.iter() {
        if let Err(e) = bot
            .send_message(ChatId(*admin_id), &text)
            .reply_markup(keyboard.clone())
            .await
        {
            log::warn!("Failed to send payment request to admin {}: {}", admin_id, e);
        }
    }
}
