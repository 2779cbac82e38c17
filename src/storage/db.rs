use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result};

/// A user account in the credit ledger.
pub struct User {
    /// Telegram id of the user
    pub telegram_id: i64,
    /// Telegram username, if available
    pub username: Option<String>,
    /// Remaining credit balance; never negative
    pub credits: i64,
    /// Units dispatched on `last_sent_day` (raw counter, see [`get_sent_today`])
    pub sent_today: i64,
    /// Units dispatched over the account lifetime
    pub sent_total: i64,
    /// Calendar day (UTC, `YYYY-MM-DD`) the daily counter belongs to
    pub last_sent_day: Option<String>,
}

impl User {
    /// Returns the Telegram id of the user.
    pub fn telegram_id(&self) -> i64 {
        self.telegram_id
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists on the first connection. WAL journaling keeps concurrent
/// writers queuing on the busy timeout instead of failing on lock upgrades.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
    });
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = init_schema(&conn) {
        log::error!("Failed to initialize schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Creates the three ledger relations if they do not exist yet.
///
/// - `users`: one row per account, never deleted
/// - `flow_state`: at most one row per active conversation, overwritten in place
/// - `vouchers`: one row per key; redemption marks the row rather than
///   deleting it so the redeemer index stays useful for auditing
pub fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id INTEGER PRIMARY KEY,
            username TEXT,
            credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
            sent_today INTEGER NOT NULL DEFAULT 0,
            sent_total INTEGER NOT NULL DEFAULT 0,
            last_sent_day TEXT
        );
        CREATE TABLE IF NOT EXISTS flow_state (
            telegram_id INTEGER PRIMARY KEY,
            step TEXT NOT NULL,
            retries INTEGER NOT NULL DEFAULT 0,
            target TEXT
        );
        CREATE TABLE IF NOT EXISTS vouchers (
            key TEXT PRIMARY KEY,
            credits INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            redeemed_by INTEGER,
            redeemed_at DATETIME
        );
        CREATE INDEX IF NOT EXISTS idx_vouchers_redeemed_by ON vouchers (redeemed_by);",
    )
}

/// Creates a new user with a zero balance.
///
/// # Errors
///
/// Returns an error if a user with this id already exists or on a database
/// failure; callers check [`get_user`] first for the idempotent /start path.
pub fn create_user(conn: &DbConnection, telegram_id: i64, username: Option<String>) -> Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, username, credits, sent_today, sent_total) VALUES (?1, ?2, 0, 0, 0)",
        params![telegram_id, username],
    )?;
    Ok(())
}

/// Fetches a user by Telegram id.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT telegram_id, username, credits, sent_today, sent_total, last_sent_day
         FROM users WHERE telegram_id = ?1",
        params![telegram_id],
        |row| {
            Ok(User {
                telegram_id: row.get(0)?,
                username: row.get(1)?,
                credits: row.get(2)?,
                sent_today: row.get(3)?,
                sent_total: row.get(4)?,
                last_sent_day: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Reserves `quantity` credits by decrementing the balance in one statement.
///
/// The balance check and the decrement are a single conditional UPDATE, so two
/// concurrent reservations for the same account can never both pass a stale
/// balance check and jointly overdraw it.
///
/// Returns `true` if the reservation was taken, `false` if the balance was
/// insufficient (no mutation happened).
pub fn reserve_credits(conn: &DbConnection, telegram_id: i64, quantity: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET credits = credits - ?1 WHERE telegram_id = ?2 AND credits >= ?1",
        params![quantity, telegram_id],
    )?;
    Ok(affected == 1)
}

/// Returns `quantity` credits to the balance (reconciling a failed dispatch).
pub fn refund_credits(conn: &DbConnection, telegram_id: i64, quantity: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET credits = credits + ?1 WHERE telegram_id = ?2",
        params![quantity, telegram_id],
    )?;
    Ok(())
}

/// Commits a successful dispatch: bumps the lifetime counter and the daily
/// counter, rolling the daily counter over when the calendar day changed.
///
/// One statement; the day comparison happens SQL-side so the rollover cannot
/// race a concurrent commit.
pub fn commit_sent(conn: &DbConnection, telegram_id: i64, quantity: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET
            sent_total = sent_total + ?1,
            sent_today = CASE WHEN last_sent_day = date('now') THEN sent_today + ?1 ELSE ?1 END,
            last_sent_day = date('now')
         WHERE telegram_id = ?2",
        params![quantity, telegram_id],
    )?;
    Ok(())
}

/// Units dispatched today, accounting for the daily rollover.
///
/// Reads as 0 when the stored counter belongs to a previous day.
pub fn get_sent_today(conn: &DbConnection, telegram_id: i64) -> Result<i64> {
    let sent: Option<i64> = conn
        .query_row(
            "SELECT CASE WHEN last_sent_day = date('now') THEN sent_today ELSE 0 END
             FROM users WHERE telegram_id = ?1",
            params![telegram_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(sent.unwrap_or(0))
}

/// Upserts the conversation-state row for a user (one row at most per user).
pub fn save_flow_row(
    conn: &DbConnection,
    telegram_id: i64,
    step: &str,
    retries: i64,
    target: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO flow_state (telegram_id, step, retries, target) VALUES (?1, ?2, ?3, ?4)",
        params![telegram_id, step, retries, target],
    )?;
    Ok(())
}

/// Loads the conversation-state row for a user, if a flow is active.
pub fn load_flow_row(conn: &DbConnection, telegram_id: i64) -> Result<Option<(String, i64, Option<String>)>> {
    conn.query_row(
        "SELECT step, retries, target FROM flow_state WHERE telegram_id = ?1",
        params![telegram_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()
}

/// Deletes the conversation-state row (flow completed, aborted, or cancelled).
pub fn clear_flow_row(conn: &DbConnection, telegram_id: i64) -> Result<()> {
    conn.execute("DELETE FROM flow_state WHERE telegram_id = ?1", params![telegram_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Single-connection in-memory pool: every test sees one private database.
    fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        init_schema(&pool.get().unwrap()).unwrap();
        pool
    }

    #[test]
    fn test_create_and_get_user() {
        let pool = test_pool();
        let conn = get_connection(&pool).unwrap();

        create_user(&conn, 42, Some("alice".to_string())).unwrap();
        let user = get_user(&conn, 42).unwrap().unwrap();
        assert_eq!(user.telegram_id(), 42);
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.credits, 0);
        assert_eq!(user.sent_total, 0);

        // Unknown ids read as None
        assert!(get_user(&conn, 999).unwrap().is_none());

        // Duplicate insert is a constraint error, not silent success
        assert!(create_user(&conn, 42, None).is_err());
    }

    #[test]
    fn test_reserve_respects_balance() {
        let pool = test_pool();
        let conn = get_connection(&pool).unwrap();
        create_user(&conn, 1, None).unwrap();
        refund_credits(&conn, 1, 50).unwrap();

        assert!(reserve_credits(&conn, 1, 30).unwrap());
        assert_eq!(get_user(&conn, 1).unwrap().unwrap().credits, 20);

        // Second reservation exceeding the remainder fails without mutating
        assert!(!reserve_credits(&conn, 1, 30).unwrap());
        assert_eq!(get_user(&conn, 1).unwrap().unwrap().credits, 20);

        // Balance can never go negative even on exact drains
        assert!(reserve_credits(&conn, 1, 20).unwrap());
        assert_eq!(get_user(&conn, 1).unwrap().unwrap().credits, 0);
        assert!(!reserve_credits(&conn, 1, 1).unwrap());
    }

    #[test]
    fn test_refund_restores_reservation() {
        let pool = test_pool();
        let conn = get_connection(&pool).unwrap();
        create_user(&conn, 1, None).unwrap();
        refund_credits(&conn, 1, 50).unwrap();

        assert!(reserve_credits(&conn, 1, 30).unwrap());
        refund_credits(&conn, 1, 30).unwrap();
        assert_eq!(get_user(&conn, 1).unwrap().unwrap().credits, 50);
    }

    #[test]
    fn test_commit_sent_updates_counters() {
        let pool = test_pool();
        let conn = get_connection(&pool).unwrap();
        create_user(&conn, 1, None).unwrap();

        commit_sent(&conn, 1, 30).unwrap();
        commit_sent(&conn, 1, 12).unwrap();

        let user = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.sent_total, 42);
        assert_eq!(get_sent_today(&conn, 1).unwrap(), 42);
    }

    #[test]
    fn test_sent_today_rolls_over_on_day_change() {
        let pool = test_pool();
        let conn = get_connection(&pool).unwrap();
        create_user(&conn, 1, None).unwrap();

        // Simulate a counter left over from yesterday
        conn.execute(
            "UPDATE users SET sent_today = 1999, sent_total = 1999, last_sent_day = date('now', '-1 day') WHERE telegram_id = 1",
            [],
        )
        .unwrap();

        assert_eq!(get_sent_today(&conn, 1).unwrap(), 0);

        commit_sent(&conn, 1, 10).unwrap();
        let user = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.sent_total, 2009);
        assert_eq!(get_sent_today(&conn, 1).unwrap(), 10);
    }

    #[test]
    fn test_flow_row_lifecycle() {
        let pool = test_pool();
        let conn = get_connection(&pool).unwrap();

        assert!(load_flow_row(&conn, 1).unwrap().is_none());

        save_flow_row(&conn, 1, "input_target", 0, None).unwrap();
        let (step, retries, target) = load_flow_row(&conn, 1).unwrap().unwrap();
        assert_eq!(step, "input_target");
        assert_eq!(retries, 0);
        assert!(target.is_none());

        // Overwritten, not appended
        save_flow_row(&conn, 1, "input_amount", 0, Some("user@example.com")).unwrap();
        let (step, _, target) = load_flow_row(&conn, 1).unwrap().unwrap();
        assert_eq!(step, "input_amount");
        assert_eq!(target.as_deref(), Some("user@example.com"));

        clear_flow_row(&conn, 1).unwrap();
        assert!(load_flow_row(&conn, 1).unwrap().is_none());
    }
}
