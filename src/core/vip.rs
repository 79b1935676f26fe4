//! VIP subscription resolution
//!
//! Answers "is this user exempt from the daily quota right now" and manages
//! subscription grants. A user may accumulate many subscription records over
//! time; at any instant the active one is the record with the latest
//! `end_date` still in the future. Expiry is detected lazily on the next
//! check — there is no timer demoting users at midnight.

use std::fmt;
use std::str::FromStr;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::db::{self, DbPool, Subscription};

/// Closed set of purchasable subscription tiers.
///
/// Durations are exact day counts added to the later of {now, current
/// active subscription's end}, so buying while subscribed stacks time
/// instead of wasting the remaining days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    OneMonth,
    ThreeMonth,
}

impl Tier {
    /// Subscription length in days
    pub fn duration_days(&self) -> i64 {
        match self {
            Tier::OneMonth => 30,
            Tier::ThreeMonth => 90,
        }
    }

    /// Wire/storage name of the tier
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::OneMonth => "one_month",
            Tier::ThreeMonth => "three_month",
        }
    }

    /// Configured price in Toman
    pub fn price(&self) -> u64 {
        match self {
            Tier::OneMonth => *config::vip::ONE_MONTH_PRICE,
            Tier::ThreeMonth => *config::vip::THREE_MONTH_PRICE,
        }
    }
}

impl FromStr for Tier {
    type Err = AppError;

    /// Parse a tier name, failing loudly on anything outside the
    /// enumeration — a wrong name must never be mapped to a default
    /// duration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_month" => Ok(Tier::OneMonth),
            "three_month" => Ok(Tier::ThreeMonth),
            other => Err(AppError::InvalidTier(other.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active subscription of the user, if any.
///
/// Among records whose `end_date` is strictly in the future, returns the one
/// with the latest `end_date` (ties broken by highest id). `None` covers
/// both "never subscribed" and "all subscriptions lapsed".
pub fn get_active_subscription(pool: &DbPool, user_id: i64) -> AppResult<Option<Subscription>> {
    let conn = db::get_connection(pool)?;
    Ok(db::get_active_subscription(&conn, user_id)?)
}

/// Whether the user currently bypasses the daily quota.
///
/// The admission hot path — implemented as a bare existence check, no
/// record materialized.
pub fn is_vip(pool: &DbPool, user_id: i64) -> AppResult<bool> {
    let conn = db::get_connection(pool)?;
    Ok(db::has_active_subscription(&conn, user_id)?)
}

/// Grant (or stack) a subscription after a confirmed payment.
///
/// Inserts a new record starting at the later of {now, current active
/// subscription's end}; prior records are never mutated. On a storage error
/// no record is created and the caller must NOT tell the user they are
/// subscribed.
pub fn grant(pool: &DbPool, user_id: i64, tier: Tier, payment_amount: u64) -> AppResult<Subscription> {
    let conn = db::get_connection(pool)?;
    let subscription = db::insert_subscription(
        &conn,
        user_id,
        tier.as_str(),
        payment_amount as i64,
        tier.duration_days(),
    )?;

    log::info!(
        "VIP granted: user {} tier {} until {} ({} Toman)",
        user_id,
        tier,
        subscription.end_date,
        payment_amount
    );

    Ok(subscription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::create_pool;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vip.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_tier_durations() {
        assert_eq!(Tier::OneMonth.duration_days(), 30);
        assert_eq!(Tier::ThreeMonth.duration_days(), 90);
    }

    #[test]
    fn test_tier_parse_roundtrip() {
        assert_eq!("one_month".parse::<Tier>().unwrap(), Tier::OneMonth);
        assert_eq!("three_month".parse::<Tier>().unwrap(), Tier::ThreeMonth);
        assert_eq!(Tier::OneMonth.to_string(), "one_month");
    }

    #[test]
    fn test_unknown_tier_fails_loudly() {
        let err = "six_month".parse::<Tier>().unwrap_err();
        assert!(matches!(err, AppError::InvalidTier(ref name) if name == "six_month"));

        let err = "".parse::<Tier>().unwrap_err();
        assert!(matches!(err, AppError::InvalidTier(_)));
    }

    #[test]
    fn test_grant_makes_user_vip_immediately() {
        let (_dir, pool) = test_pool();

        assert!(!is_vip(&pool, 1).unwrap());
        let sub = grant(&pool, 1, Tier::OneMonth, 50_000).unwrap();
        assert!(is_vip(&pool, 1).unwrap());
        assert_eq!(sub.subscription_type, "one_month");
        assert_eq!(sub.payment_amount, 50_000);
    }

    #[test]
    fn test_exemption_ends_when_end_date_passes() {
        let (_dir, pool) = test_pool();
        grant(&pool, 2, Tier::OneMonth, 50_000).unwrap();
        assert!(is_vip(&pool, 2).unwrap());

        // Simulate time passing end_at
        let conn = db::get_connection(&pool).unwrap();
        conn.execute(
            "UPDATE vip_subscriptions SET end_date = datetime('now', '-1 minute') WHERE user_id = 2",
            [],
        )
        .unwrap();

        assert!(!is_vip(&pool, 2).unwrap());
        assert!(get_active_subscription(&pool, 2).unwrap().is_none());
    }

    #[test]
    fn test_grant_stacks_on_active_subscription() {
        let (_dir, pool) = test_pool();

        // Active subscription ending in 10 days
        let conn = db::get_connection(&pool).unwrap();
        conn.execute(
            "INSERT INTO vip_subscriptions (user_id, subscription_type, payment_amount, end_date)
             VALUES (3, 'one_month', 50000, datetime('now', '+10 days'))",
            [],
        )
        .unwrap();

        let sub = grant(&pool, 3, Tier::OneMonth, 50_000).unwrap();

        // 10 remaining + 30 granted = ends ~40 days out, not 30
        let ends_40_days_out: i64 = conn
            .query_row(
                "SELECT ?1 BETWEEN datetime('now', '+39 days', '+23 hours')
                             AND datetime('now', '+40 days', '+1 hour')",
                &[&sub.end_date as &dyn rusqlite::ToSql],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(ends_40_days_out, 1);

        let active = get_active_subscription(&pool, 3).unwrap().unwrap();
        assert_eq!(active.id, sub.id);
    }

    #[test]
    fn test_grant_keeps_history() {
        let (_dir, pool) = test_pool();

        grant(&pool, 4, Tier::OneMonth, 50_000).unwrap();
        grant(&pool, 4, Tier::ThreeMonth, 140_000).unwrap();

        let conn = db::get_connection(&pool).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM vip_subscriptions WHERE user_id = 4", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 2);
    }
}
