//! Single-use credit vouchers
//!
//! Keys are fixed-length random alphanumeric tokens minted by the
//! administrator and redeemed exactly once. Redemption claims the key and
//! credits the balance inside one transaction; a key is marked in place
//! (`redeemed_by`/`redeemed_at`) rather than deleted so the redeemer index
//! stays useful for auditing. Collisions at 16 alphanumeric characters are
//! accepted as negligible; a collision surfaces as a per-key insert error.

use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, TransactionBehavior};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::db::DbConnection;

/// Result of minting one batch of voucher keys.
///
/// Insertions are independent; a batch can partially succeed and the caller
/// reports each key (or its error) deterministically.
pub struct GeneratedBatch {
    pub results: Vec<Result<String, AppError>>,
}

impl GeneratedBatch {
    /// Keys that were actually persisted.
    pub fn minted(&self) -> impl Iterator<Item = &str> {
        self.results.iter().filter_map(|r| r.as_deref().ok())
    }

    /// Number of failed insertions.
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }
}

/// Generates a fixed-length random alphanumeric voucher key.
fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(config::voucher::KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Mints `count` vouchers worth `credit_value` each.
///
/// Administrator-only: `caller_id` must equal the configured admin id.
/// Returns a per-key result list; insert failures do not abort the batch.
pub fn generate(
    conn: &DbConnection,
    caller_id: i64,
    admin_id: i64,
    credit_value: i64,
    count: i64,
) -> AppResult<GeneratedBatch> {
    if admin_id == 0 || caller_id != admin_id {
        return Err(AppError::PermissionDenied);
    }
    if credit_value <= 0 || count <= 0 || count > config::voucher::MAX_BATCH {
        return Err(AppError::Validation(format!(
            "expected a positive credit value and a batch size of 1-{}",
            config::voucher::MAX_BATCH
        )));
    }

    let mut results = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = generate_key();
        let inserted = conn
            .execute(
                "INSERT INTO vouchers (key, credits) VALUES (?1, ?2)",
                params![key, credit_value],
            )
            .map(|_| key)
            .map_err(AppError::from);
        if let Err(ref e) = inserted {
            log::error!("Failed to persist voucher key: {}", e);
        }
        results.push(inserted);
    }
    Ok(GeneratedBatch { results })
}

/// Redeems a voucher key for the calling user.
///
/// Claim and credit are one transaction:
/// 1. conditionally mark the key redeemed (`redeemed_by IS NULL` guard) -
///    zero affected rows means unknown or already-used key;
/// 2. credit the user's balance by the voucher value;
/// 3. commit. Any failure after the claim rolls the whole unit back, so a
///    half-redeemed voucher (credits granted, key still live) is impossible.
///
/// Two concurrent redemptions of one token serialize on the conditional
/// update: exactly one sees an affected row.
///
/// Returns the credit value granted.
pub fn redeem(conn: &mut DbConnection, telegram_id: i64, token: &str) -> AppResult<i64> {
    // Immediate: take the write lock at BEGIN so a contending redemption
    // queues on the busy timeout instead of failing on a mid-transaction
    // lock upgrade
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let claimed = tx.execute(
        "UPDATE vouchers SET redeemed_by = ?1, redeemed_at = datetime('now')
         WHERE key = ?2 AND redeemed_by IS NULL",
        params![telegram_id, token],
    )?;
    if claimed == 0 {
        return Err(AppError::InvalidOrUsedKey);
    }

    let value: i64 = tx.query_row("SELECT credits FROM vouchers WHERE key = ?1", params![token], |row| {
        row.get(0)
    })?;

    let credited = tx.execute(
        "UPDATE users SET credits = credits + ?1 WHERE telegram_id = ?2",
        params![value, telegram_id],
    )?;
    if credited == 0 {
        // Unknown account: roll the claim back by dropping the transaction
        return Err(AppError::Validation("account not registered".to_string()));
    }

    tx.commit()?;
    log::info!("User {} redeemed a voucher for {} credits", telegram_id, value);
    Ok(value)
}
