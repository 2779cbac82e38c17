//! Common test utilities
//!
//! This module is shared across all integration tests

// Not every test binary uses every fixture
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use dispatchbot::core::error::{AppError, AppResult};
use dispatchbot::dispatch::BulkDispatcher;
use dispatchbot::storage::db::{create_user, init_schema, refund_credits};
use dispatchbot::storage::DbPool;

/// In-memory pool for tests.
///
/// Capped at one connection: every pooled connection to `:memory:` is its
/// own private database, so handing out a second one would split the state.
pub fn memory_pool() -> DbPool {
    let pool = Pool::builder()
        .max_size(1)
        .build(SqliteConnectionManager::memory())
        .unwrap();
    init_schema(&pool.get().unwrap()).unwrap();
    pool
}

/// Pool with a single registered user holding `credits`.
pub fn pool_with_user(telegram_id: i64, credits: i64) -> DbPool {
    let pool = memory_pool();
    {
        let conn = pool.get().unwrap();
        create_user(&conn, telegram_id, None).unwrap();
        if credits > 0 {
            refund_credits(&conn, telegram_id, credits).unwrap();
        }
    }
    pool
}

/// Dispatcher fake with a scripted outcome and a call counter.
pub struct ScriptedDispatcher {
    pub fail_with: Option<String>,
    pub calls: AtomicU32,
}

impl ScriptedDispatcher {
    pub fn succeeding() -> Self {
        Self {
            fail_with: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkDispatcher for ScriptedDispatcher {
    async fn dispatch(&self, _target: &str, _quantity: i64) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            None => Ok(()),
            Some(reason) => Err(AppError::ExternalCall(reason.clone())),
        }
    }
}
