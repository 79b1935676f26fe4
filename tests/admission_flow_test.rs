//! Integration tests for the quota / VIP / admission flow
//!
//! Run with: cargo test --test admission_flow_test
//!
//! Time never advances inside a test; day rollovers and subscription expiry
//! are simulated by rewriting the stored dates, which is exactly what the
//! lazy-evaluation semantics key off.

use snexus::core::admission::{self, ContentType, Decision};
use snexus::core::quota;
use snexus::core::vip::{self, Tier};
use snexus::storage::db::{self, DbPool};
use tempfile::TempDir;

const GIB2: u64 = 2_147_483_648; // the default 2 GiB daily limit

fn test_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow.sqlite");
    let pool = db::create_pool(path.to_str().unwrap()).unwrap();
    (dir, pool)
}

fn age_quota_by_days(pool: &DbPool, user_id: i64, days: i64) {
    let conn = db::get_connection(pool).unwrap();
    conn.execute(
        &format!(
            "UPDATE users SET last_download_reset = date('now', '-{} days') WHERE user_id = {}",
            days, user_id
        ),
        [],
    )
    .unwrap();
}

fn expire_subscriptions(pool: &DbPool, user_id: i64) {
    let conn = db::get_connection(pool).unwrap();
    conn.execute(
        &format!(
            "UPDATE vip_subscriptions SET end_date = datetime('now', '-1 minute') WHERE user_id = {}",
            user_id
        ),
        [],
    )
    .unwrap();
}

// ============================================================================
// Quota ledger
// ============================================================================

#[test]
fn unseen_user_has_zero_usage() {
    let (_dir, pool) = test_pool();
    assert_eq!(quota::get_usage(&pool, 12345).unwrap(), 0);
}

#[test]
fn same_day_downloads_sum_exactly() {
    let (_dir, pool) = test_pool();

    let sizes: [u64; 4] = [10, 250_000, 0, 1_000_000];
    for size in sizes {
        quota::record_download(&pool, 1, size).unwrap();
    }

    assert_eq!(quota::get_usage(&pool, 1).unwrap(), sizes.iter().sum::<u64>());
}

#[test]
fn concurrent_recordings_do_not_lose_updates() {
    // Ten threads, each recording ten downloads for the same user over the
    // shared pool. The upsert is a single statement, so the final counter
    // must be exact regardless of interleaving.
    let (_dir, pool) = test_pool();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let pool = pool.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    // SQLite may briefly report busy under write contention;
                    // retry like the real caller would
                    loop {
                        match quota::record_download(&pool, 77, 1000) {
                            Ok(_) => break,
                            Err(e) => {
                                if !e.is_storage_unavailable() {
                                    panic!("unexpected error: {e}");
                                }
                                std::thread::sleep(std::time::Duration::from_millis(5));
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(quota::get_usage(&pool, 77).unwrap(), 100 * 1000);
}

#[test]
fn stale_counter_reads_zero_then_restarts() {
    let (_dir, pool) = test_pool();

    quota::record_download(&pool, 2, 700).unwrap();
    age_quota_by_days(&pool, 2, 1);

    assert_eq!(quota::get_usage(&pool, 2).unwrap(), 0);
    // Not U + X — the stale value is discarded by the write
    assert_eq!(quota::record_download(&pool, 2, 42).unwrap(), 42);
    assert_eq!(quota::get_usage(&pool, 2).unwrap(), 42);
}

// ============================================================================
// VIP resolution
// ============================================================================

#[test]
fn grant_flips_exemption_immediately_and_expiry_flips_it_back() {
    let (_dir, pool) = test_pool();

    assert!(!vip::is_vip(&pool, 3).unwrap());
    vip::grant(&pool, 3, Tier::OneMonth, 50_000).unwrap();
    assert!(vip::is_vip(&pool, 3).unwrap());

    expire_subscriptions(&pool, 3);
    assert!(!vip::is_vip(&pool, 3).unwrap());
}

#[test]
fn extending_a_live_subscription_stacks_durations() {
    let (_dir, pool) = test_pool();

    // Active subscription with 10 days left
    let conn = db::get_connection(&pool).unwrap();
    conn.execute(
        "INSERT INTO vip_subscriptions (user_id, subscription_type, payment_amount, end_date)
         VALUES (4, 'one_month', 50000, datetime('now', '+10 days'))",
        [],
    )
    .unwrap();

    let sub = vip::grant(&pool, 4, Tier::OneMonth, 50_000).unwrap();

    // 10 + 30 = 40 days out, not 30
    let stacked: i64 = conn
        .query_row(
            "SELECT ?1 BETWEEN datetime('now', '+39 days') AND datetime('now', '+41 days')",
            [&sub.end_date],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stacked, 1);
}

// ============================================================================
// Admission gate
// ============================================================================

#[test]
fn exempt_user_is_allowed_even_above_the_limit() {
    let (_dir, pool) = test_pool();

    vip::grant(&pool, 5, Tier::ThreeMonth, 140_000).unwrap();
    admission::record_completed_download(&pool, 5, ContentType::Video, None, GIB2 + 1).unwrap();

    assert!(quota::get_usage(&pool, 5).unwrap() > GIB2);
    assert_eq!(admission::check_admission(&pool, 5, GIB2).unwrap(), Decision::Allowed);
}

#[test]
fn two_gib_denial_scenario_with_lazy_rollover() {
    let (_dir, pool) = test_pool();

    // Non-exempt user with 2 000 000 000 bytes used today
    admission::record_completed_download(&pool, 6, ContentType::Music, Some("https://x/a"), 2_000_000_000).unwrap();

    assert_eq!(
        admission::check_admission(&pool, 6, GIB2).unwrap(),
        Decision::Allowed,
        "2e9 bytes is still under the 2 GiB limit"
    );
    assert_eq!(
        admission::check_admission(&pool, 6, 2_000_000_000).unwrap(),
        Decision::Denied { used: 2_000_000_000 }
    );

    // Day rolls over; the check lazily sees zero usage and admits again
    age_quota_by_days(&pool, 6, 1);
    assert_eq!(
        admission::check_admission(&pool, 6, 2_000_000_000).unwrap(),
        Decision::Allowed
    );
}

#[test]
fn completed_downloads_are_audited_and_counted_for_everyone() {
    let (_dir, pool) = test_pool();

    vip::grant(&pool, 7, Tier::OneMonth, 50_000).unwrap();
    admission::record_completed_download(&pool, 7, ContentType::Instagram, Some("https://ig/p"), 123).unwrap();
    admission::record_completed_download(&pool, 8, ContentType::Youtube, Some("https://yt/v"), 456).unwrap();

    let conn = db::get_connection(&pool).unwrap();
    // Audit rows exist for VIP and non-VIP alike
    assert_eq!(db::get_user_downloads(&conn, 7, 10).unwrap().len(), 1);
    assert_eq!(db::get_user_downloads(&conn, 8, 10).unwrap().len(), 1);
    // So do the ledger counters
    assert_eq!(quota::get_usage(&pool, 7).unwrap(), 123);
    assert_eq!(quota::get_usage(&pool, 8).unwrap(), 456);
}

#[test]
fn denial_carries_current_usage_for_the_user_message() {
    let (_dir, pool) = test_pool();

    admission::record_completed_download(&pool, 9, ContentType::Music, None, 5000).unwrap();

    match admission::check_admission(&pool, 9, 4000).unwrap() {
        Decision::Denied { used } => assert_eq!(used, 5000),
        Decision::Allowed => panic!("user above the limit must be denied"),
    }
}
