//! Aggregate counters for the admin panel

use crate::core::error::AppResult;
use crate::storage::db::{self, DbPool};

/// Snapshot of subscription business metrics
#[derive(Debug, Clone, Default)]
pub struct SubscriptionStats {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub one_month_subscriptions: i64,
    pub three_month_subscriptions: i64,
    /// Lifetime revenue in Toman
    pub total_revenue: i64,
}

/// Snapshot of overall bot usage for `/admin`
#[derive(Debug, Clone, Default)]
pub struct BotStats {
    pub total_users: i64,
    pub vip_users: i64,
    pub downloads_today: i64,
}

/// Collect subscription stats in one connection checkout.
pub fn subscription_stats(pool: &DbPool) -> AppResult<SubscriptionStats> {
    let conn = db::get_connection(pool)?;
    Ok(SubscriptionStats {
        total_subscriptions: db::count_total_subscriptions(&conn)?,
        active_subscriptions: db::get_all_active_subscriptions(&conn)?.len() as i64,
        one_month_subscriptions: db::count_subscriptions_by_type(&conn, "one_month")?,
        three_month_subscriptions: db::count_subscriptions_by_type(&conn, "three_month")?,
        total_revenue: db::total_revenue(&conn)?,
    })
}

/// Collect overall usage stats in one connection checkout.
pub fn bot_stats(pool: &DbPool) -> AppResult<BotStats> {
    let conn = db::get_connection(pool)?;
    Ok(BotStats {
        total_users: db::count_users(&conn)?,
        vip_users: db::count_vip_users(&conn)?,
        downloads_today: db::count_downloads_today(&conn)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::admission::{self, ContentType};
    use crate::core::vip::{self, Tier};
    use crate::storage::db::create_pool;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_empty_database_stats() {
        let (_dir, pool) = test_pool();

        let subs = subscription_stats(&pool).unwrap();
        assert_eq!(subs.total_subscriptions, 0);
        assert_eq!(subs.total_revenue, 0);

        let bot = bot_stats(&pool).unwrap();
        assert_eq!(bot.total_users, 0);
        assert_eq!(bot.downloads_today, 0);
    }

    #[test]
    fn test_stats_reflect_grants_and_downloads() {
        let (_dir, pool) = test_pool();

        vip::grant(&pool, 1, Tier::OneMonth, 50_000).unwrap();
        vip::grant(&pool, 2, Tier::ThreeMonth, 140_000).unwrap();
        admission::record_completed_download(&pool, 3, ContentType::Music, None, 1000).unwrap();

        let subs = subscription_stats(&pool).unwrap();
        assert_eq!(subs.total_subscriptions, 2);
        assert_eq!(subs.active_subscriptions, 2);
        assert_eq!(subs.one_month_subscriptions, 1);
        assert_eq!(subs.three_month_subscriptions, 1);
        assert_eq!(subs.total_revenue, 190_000);

        let bot = bot_stats(&pool).unwrap();
        assert_eq!(bot.vip_users, 2);
        assert_eq!(bot.downloads_today, 1);
        // user 3 was created implicitly by the recorded download
        assert_eq!(bot.total_users, 1);
    }
}
