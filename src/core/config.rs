use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot
/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: snexus.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "snexus.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: snexus.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "snexus.log".to_string()));

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable
/// Per-user subdirectories are created underneath it on demand
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string()));

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Daily download quota configuration
pub mod quota {
    use once_cell::sync::Lazy;
    use std::env;

    /// Daily download limit for non-VIP users, in megabytes
    /// Read from DAILY_DOWNLOAD_LIMIT_MB environment variable
    /// Default: 2048 MB (2 GiB)
    pub static DAILY_DOWNLOAD_LIMIT_MB: Lazy<u64> = Lazy::new(|| {
        env::var("DAILY_DOWNLOAD_LIMIT_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2048)
    });

    /// Daily download limit in bytes — the value every admission check uses
    pub fn limit_bytes() -> u64 {
        *DAILY_DOWNLOAD_LIMIT_MB * 1024 * 1024
    }
}

/// VIP subscription pricing and payment configuration
pub mod vip {
    use once_cell::sync::Lazy;
    use std::env;

    /// Price for the one-month VIP subscription, in Toman
    /// Read from ONE_MONTH_PRICE environment variable
    /// Default: 50 000
    pub static ONE_MONTH_PRICE: Lazy<u64> = Lazy::new(|| {
        env::var("ONE_MONTH_PRICE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50_000)
    });

    /// Price for the three-month VIP subscription, in Toman
    /// Read from THREE_MONTH_PRICE environment variable
    /// Default: 140 000
    pub static THREE_MONTH_PRICE: Lazy<u64> = Lazy::new(|| {
        env::var("THREE_MONTH_PRICE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(140_000)
    });

    /// Card number shown to users for manual payment
    /// Read from PAYMENT_CARD_NUMBER environment variable
    pub static PAYMENT_CARD_NUMBER: Lazy<String> =
        Lazy::new(|| env::var("PAYMENT_CARD_NUMBER").unwrap_or_else(|_| String::new()));

    /// Card owner name shown to users for manual payment
    /// Read from PAYMENT_CARD_OWNER environment variable
    pub static PAYMENT_CARD_OWNER: Lazy<String> =
        Lazy::new(|| env::var("PAYMENT_CARD_OWNER").unwrap_or_else(|_| String::new()));
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_USER_IDS environment variable
    pub static ADMIN_USER_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_USER_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    /// Returns true if the given Telegram user id is a configured admin
    pub fn is_admin_id(user_id: i64) -> bool {
        ADMIN_USER_IDS.contains(&user_id)
    }

    #[cfg(test)]
    mod tests {
        use super::parse_admin_ids;

        #[test]
        fn test_parse_admin_ids_mixed_separators() {
            assert_eq!(parse_admin_ids("1,2, 3\n4"), vec![1, 2, 3, 4]);
            assert_eq!(parse_admin_ids(""), Vec::<i64>::new());
            assert_eq!(parse_admin_ids("abc, 42"), vec![42]);
        }
    }
}

/// Required-channel join gate configuration
pub mod channels {
    use once_cell::sync::Lazy;
    use std::env;

    /// Maximum number of required channels an admin may register
    /// Read from MAX_REQUIRED_CHANNELS environment variable
    /// Default: 5
    pub static MAX_REQUIRED_CHANNELS: Lazy<usize> = Lazy::new(|| {
        env::var("MAX_REQUIRED_CHANNELS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5)
    });
}

/// Download engine configuration
pub mod download {
    use super::Duration;

    /// Timeout for yt-dlp commands (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 240;

    /// yt-dlp command timeout duration
    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }

    /// Maximum number of tracks downloaded from a single playlist URL
    pub const MAX_PLAYLIST_TRACKS: usize = 50;
}

/// Validation configuration
pub mod validation {
    /// Maximum URL length (RFC 7230 recommends 8000, but we use 2048 for safety)
    pub const MAX_URL_LENGTH: usize = 2048;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for HTTP requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
