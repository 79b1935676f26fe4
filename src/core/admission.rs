//! Download admission
//!
//! The single decision point every download path consults before starting
//! work, and the single point notified after a download completes. VIP
//! users pass unconditionally; everyone else is measured against the daily
//! byte quota. The check is advisory: no capacity is reserved, so a
//! download admitted near the limit may push the user over once its real
//! size is known — deliberate, because pre-flight size probing of streamed
//! or transcoded media is unreliable.

use crate::core::error::AppResult;
use crate::core::{quota, vip};
use crate::storage::db::{self, DbPool};

/// Kind of content a download delivered, as recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Music,
    Video,
    Instagram,
    Youtube,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Music => "music",
            ContentType::Video => "video",
            ContentType::Instagram => "instagram",
            ContentType::Youtube => "youtube",
        }
    }
}

/// Outcome of an admission check.
///
/// Quota exhaustion is an expected, frequent, user-facing outcome with its
/// own message (an upgrade prompt), so it is a variant here — never an
/// error. Errors from this module mean the check itself could not be
/// performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Download may proceed
    Allowed,
    /// Daily quota exhausted; carries the user's current usage in bytes
    Denied { used: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Decide whether a download may start right now.
///
/// VIP users are `Allowed` regardless of usage. Everyone else is `Denied`
/// once today's usage has reached `quota_limit_bytes`. The result is
/// inherently stale the instant it returns — no reservation is held.
///
/// # Errors
///
/// Storage failures propagate so callers can tell "you're out of quota"
/// apart from "we couldn't check your quota".
pub fn check_admission(pool: &DbPool, user_id: i64, quota_limit_bytes: u64) -> AppResult<Decision> {
    if vip::is_vip(pool, user_id)? {
        return Ok(Decision::Allowed);
    }

    let used = quota::get_usage(pool, user_id)?;
    if used >= quota_limit_bytes {
        log::info!(
            "Admission denied: user {} used {} of {} bytes today",
            user_id,
            used,
            quota_limit_bytes
        );
        return Ok(Decision::Denied { used });
    }

    Ok(Decision::Allowed)
}

/// Record a completed download: one audit row plus the quota counter.
///
/// Must be invoked exactly once per completed download, after the byte size
/// is known — and never for aborted ones, which contribute zero usage. The
/// ledger is bumped even for VIP users so history stays uniform; exemption
/// only controls whether the counter is ever enforced.
///
/// Returns the user's new cumulative usage for today.
pub fn record_completed_download(
    pool: &DbPool,
    user_id: i64,
    content_type: ContentType,
    content_url: Option<&str>,
    byte_size: u64,
) -> AppResult<u64> {
    let conn = db::get_connection(pool)?;
    db::add_download(&conn, user_id, content_type.as_str(), content_url, byte_size as i64)?;
    drop(conn);

    quota::record_download(pool, user_id, byte_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vip::Tier;
    use crate::storage::db::create_pool;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const LIMIT: u64 = 2_147_483_648; // 2 GiB

    fn test_pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admission.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_fresh_user_is_allowed() {
        let (_dir, pool) = test_pool();
        assert_eq!(check_admission(&pool, 1, LIMIT).unwrap(), Decision::Allowed);
    }

    #[test]
    fn test_user_at_limit_is_denied_with_usage() {
        let (_dir, pool) = test_pool();

        record_completed_download(&pool, 2, ContentType::Music, None, LIMIT).unwrap();

        assert_eq!(
            check_admission(&pool, 2, LIMIT).unwrap(),
            Decision::Denied { used: LIMIT }
        );
    }

    #[test]
    fn test_user_below_limit_is_allowed() {
        let (_dir, pool) = test_pool();

        record_completed_download(&pool, 3, ContentType::Music, None, LIMIT - 1).unwrap();
        assert_eq!(check_admission(&pool, 3, LIMIT).unwrap(), Decision::Allowed);
    }

    #[test]
    fn test_vip_is_allowed_even_over_limit() {
        let (_dir, pool) = test_pool();

        crate::core::vip::grant(&pool, 4, Tier::OneMonth, 50_000).unwrap();
        record_completed_download(&pool, 4, ContentType::Video, None, LIMIT * 2).unwrap();

        assert!(crate::core::quota::get_usage(&pool, 4).unwrap() > LIMIT);
        assert_eq!(check_admission(&pool, 4, LIMIT).unwrap(), Decision::Allowed);
    }

    #[test]
    fn test_vip_usage_is_still_tracked() {
        let (_dir, pool) = test_pool();

        crate::core::vip::grant(&pool, 5, Tier::ThreeMonth, 140_000).unwrap();
        let after = record_completed_download(&pool, 5, ContentType::Instagram, Some("https://x"), 777).unwrap();

        assert_eq!(after, 777);
        let conn = crate::storage::db::get_connection(&pool).unwrap();
        let history = crate::storage::db::get_user_downloads(&conn, 5, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content_type, "instagram");
    }

    #[test]
    fn test_denied_then_allowed_after_day_rollover() {
        let (_dir, pool) = test_pool();

        // Non-exempt user at 2 000 000 000 bytes today
        record_completed_download(&pool, 6, ContentType::Youtube, None, 2_000_000_000).unwrap();
        assert_eq!(
            check_admission(&pool, 6, 2_000_000_000).unwrap(),
            Decision::Denied { used: 2_000_000_000 }
        );

        // Day rolls over: usage lazily resets to 0 < limit
        let conn = crate::storage::db::get_connection(&pool).unwrap();
        conn.execute(
            "UPDATE users SET last_download_reset = date('now', '-1 day') WHERE user_id = 6",
            [],
        )
        .unwrap();

        assert_eq!(
            check_admission(&pool, 6, 2_000_000_000).unwrap(),
            Decision::Allowed
        );
    }

    #[test]
    fn test_expired_vip_falls_back_to_quota() {
        let (_dir, pool) = test_pool();

        crate::core::vip::grant(&pool, 7, Tier::OneMonth, 50_000).unwrap();
        record_completed_download(&pool, 7, ContentType::Music, None, LIMIT).unwrap();
        assert_eq!(check_admission(&pool, 7, LIMIT).unwrap(), Decision::Allowed);

        let conn = crate::storage::db::get_connection(&pool).unwrap();
        conn.execute(
            "UPDATE vip_subscriptions SET end_date = datetime('now', '-1 minute') WHERE user_id = 7",
            [],
        )
        .unwrap();

        assert_eq!(
            check_admission(&pool, 7, LIMIT).unwrap(),
            Decision::Denied { used: LIMIT }
        );
    }
}
