//! Daily download quota ledger
//!
//! Tracks cumulative bytes downloaded per user per calendar day, backed by a
//! running counter on the user row rather than a scan over the download
//! history — reads stay O(1) on the admission hot path. The counter resets
//! lazily: a stale value is treated as zero on read and overwritten on the
//! next write, so no midnight sweep over all users is ever needed. A user
//! who stops downloading keeps their last day's count frozen in storage,
//! which is harmless because reads already treat it as stale.
//!
//! Day boundaries are SQLite's `date('now')` — the UTC calendar date — so
//! every instance sharing the database agrees on "today".

use crate::core::error::AppResult;
use crate::storage::db::{self, DbPool};

/// Bytes the user has downloaded today.
///
/// Returns 0 for users that were never seen and for users whose stored
/// counter belongs to an earlier calendar day. Read-only: the stale counter
/// is not zeroed here.
///
/// # Errors
///
/// Propagates pool/database errors; the caller must not confuse them with
/// "zero usage".
pub fn get_usage(pool: &DbPool, user_id: i64) -> AppResult<u64> {
    let conn = db::get_connection(pool)?;
    Ok(db::get_download_usage(&conn, user_id)?)
}

/// Record a completed download of `byte_size` bytes against today's counter.
///
/// Applied as a single atomic reset-if-stale-then-add statement in the
/// storage layer, so two downloads finishing in the same moment cannot lose
/// an increment. `byte_size == 0` is accepted — some sources report an
/// unknown size as zero — and still succeeds.
///
/// Returns the new cumulative usage for today.
///
/// # Errors
///
/// On a storage error the caller must assume the usage was NOT recorded.
pub fn record_download(pool: &DbPool, user_id: i64, byte_size: u64) -> AppResult<u64> {
    let conn = db::get_connection(pool)?;
    let updated = db::record_download_usage(&conn, user_id, byte_size)?;
    log::debug!(
        "Quota: user {} +{} bytes, {} used today",
        user_id,
        byte_size,
        updated
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::create_pool;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quota.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_fresh_user_has_zero_usage() {
        let (_dir, pool) = test_pool();
        assert_eq!(get_usage(&pool, 100).unwrap(), 0);
    }

    #[test]
    fn test_increments_accumulate_within_a_day() {
        let (_dir, pool) = test_pool();

        assert_eq!(record_download(&pool, 1, 1024).unwrap(), 1024);
        assert_eq!(record_download(&pool, 1, 2048).unwrap(), 3072);
        assert_eq!(get_usage(&pool, 1).unwrap(), 3072);
    }

    #[test]
    fn test_zero_byte_download_is_a_noop_but_succeeds() {
        let (_dir, pool) = test_pool();

        record_download(&pool, 2, 500).unwrap();
        assert_eq!(record_download(&pool, 2, 0).unwrap(), 500);
    }

    #[test]
    fn test_usage_is_per_user() {
        let (_dir, pool) = test_pool();

        record_download(&pool, 10, 111).unwrap();
        record_download(&pool, 11, 222).unwrap();

        assert_eq!(get_usage(&pool, 10).unwrap(), 111);
        assert_eq!(get_usage(&pool, 11).unwrap(), 222);
    }

    #[test]
    fn test_day_rollover_resets_then_restarts() {
        let (_dir, pool) = test_pool();
        record_download(&pool, 3, 900).unwrap();

        let conn = crate::storage::db::get_connection(&pool).unwrap();
        conn.execute(
            "UPDATE users SET last_download_reset = date('now', '-2 days') WHERE user_id = 3",
            [],
        )
        .unwrap();

        assert_eq!(get_usage(&pool, 3).unwrap(), 0);
        // The write after the rollover starts from the new size alone
        assert_eq!(record_download(&pool, 3, 70).unwrap(), 70);
    }
}
