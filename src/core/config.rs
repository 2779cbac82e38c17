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
/// Default: dispatchbot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "dispatchbot.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: dispatchbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "dispatchbot.log".to_string()));

/// Base URL of the external bulk-dispatch API
/// Read from DISPATCH_API_URL environment variable
pub static DISPATCH_API_URL: Lazy<String> =
    Lazy::new(|| env::var("DISPATCH_API_URL").unwrap_or_else(|_| String::new()));

/// API key sent with every dispatch request
/// Read from DISPATCH_API_KEY environment variable
pub static DISPATCH_API_KEY: Lazy<String> =
    Lazy::new(|| env::var("DISPATCH_API_KEY").unwrap_or_else(|_| String::new()));

/// Dispatch mode passed through to the API unchanged
/// Read from DISPATCH_MODE environment variable
pub static DISPATCH_MODE: Lazy<String> =
    Lazy::new(|| env::var("DISPATCH_MODE").unwrap_or_else(|_| "standard".to_string()));

/// Administrator configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    /// Administrator user id (numeric Telegram id) for voucher generation.
    /// Read from ADMIN_USER_ID environment variable. 0 disables admin commands.
    pub static ADMIN_USER_ID: Lazy<i64> = Lazy::new(|| {
        env::var("ADMIN_USER_ID")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0)
    });
}

/// Spend and quantity limits
pub mod limits {
    /// Maximum units a user may dispatch per calendar day
    pub const DAILY_CEILING: i64 = 2000;

    /// Smallest quantity accepted per dispatch (inclusive)
    pub const MIN_QUANTITY: i64 = 10;

    /// Largest quantity accepted per dispatch (inclusive)
    pub const MAX_QUANTITY: i64 = 1000;

    /// Invalid target entries allowed before the flow is aborted.
    /// Two consecutive invalid entries cancel the conversation.
    pub const MAX_TARGET_ATTEMPTS: i64 = 2;
}

/// Rate limiting configuration
pub mod rate_limit {
    use super::Duration;

    /// Cooldown between /send invocations per user (in seconds)
    pub const COOLDOWN_SECONDS: u64 = 5;

    /// Rate limit duration
    pub fn duration() -> Duration {
        Duration::from_secs(COOLDOWN_SECONDS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for the bulk-dispatch HTTP call (in seconds).
    /// A timed-out call is reconciled like any other failure: full refund.
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Voucher key configuration
pub mod voucher {
    /// Length of a generated voucher key
    pub const KEY_LENGTH: usize = 16;

    /// Largest batch a single /generate may mint
    pub const MAX_BATCH: i64 = 100;
}

/// Validation configuration
pub mod validation {
    /// Maximum accepted target address length (RFC 5321 path limit)
    pub const MAX_TARGET_LENGTH: usize = 254;
}
