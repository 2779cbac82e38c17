//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use teloxide::types::Message;

use crate::core::rate_limiter::RateLimiter;
use crate::dispatch::BulkDispatcher;
use crate::storage::db::{self, create_user, get_user};
use crate::storage::get_connection;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<db::DbPool>,
    pub dispatcher: Arc<dyn BulkDispatcher>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl HandlerDeps {
    pub fn new(db_pool: Arc<db::DbPool>, dispatcher: Arc<dyn BulkDispatcher>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            db_pool,
            dispatcher,
            rate_limiter,
        }
    }
}

/// User identity as extracted from a Telegram message
#[derive(Clone)]
pub struct UserInfo {
    pub chat_id: i64,
    pub username: Option<String>,
}

impl UserInfo {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            chat_id: msg.chat.id.0,
            username: msg.from.as_ref().and_then(|u| u.username.clone()),
        }
    }
}

/// Result of ensure_user_exists operation
pub enum UserCreationResult {
    /// User already existed
    Existed,
    /// User was newly created
    Created,
    /// Failed to reach the database
    DbError,
}

/// Ensures a user exists in the database, creating them with a zero balance
/// if needed. Registration is idempotent; repeating it never touches credits.
pub fn ensure_user_exists(db_pool: &Arc<db::DbPool>, user: &UserInfo) -> UserCreationResult {
    let conn = match get_connection(db_pool) {
        Ok(c) => c,
        Err(_) => return UserCreationResult::DbError,
    };

    match get_user(&conn, user.chat_id) {
        Ok(Some(_)) => UserCreationResult::Existed,
        Ok(None) => match create_user(&conn, user.chat_id, user.username.clone()) {
            Ok(()) => {
                log::info!("Registered new user {}", user.chat_id);
                UserCreationResult::Created
            }
            Err(e) => {
                log::error!("Failed to create user {}: {}", user.chat_id, e);
                UserCreationResult::DbError
            }
        },
        Err(e) => {
            log::error!("Failed to look up user {}: {}", user.chat_id, e);
            UserCreationResult::DbError
        }
    }
}
