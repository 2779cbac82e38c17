use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::core::config;

/// Per-user cooldown between /send invocations.
///
/// Keeps one timestamp per chat; a user inside the cooldown window cannot
/// start a new dispatch flow. This is a convenience throttle in front of the
/// hard daily ceiling the ledger enforces.
#[derive(Clone)]
pub struct RateLimiter {
    limits: Arc<Mutex<HashMap<ChatId, Instant>>>,
    cooldown: Duration,
}

impl RateLimiter {
    /// Creates a rate limiter with the configured cooldown.
    pub fn new() -> Self {
        Self::with_cooldown(config::rate_limit::duration())
    }

    /// Creates a rate limiter with a custom cooldown (used by tests).
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            limits: Arc::new(Mutex::new(HashMap::new())),
            cooldown,
        }
    }

    /// Returns `true` if the user is still inside the cooldown window.
    pub async fn is_rate_limited(&self, chat_id: ChatId) -> bool {
        let limits = self.limits.lock().await;
        if let Some(&until) = limits.get(&chat_id) {
            if Instant::now() < until {
                return true;
            }
        }
        false
    }

    /// Remaining cooldown for the user, if any.
    pub async fn get_remaining_time(&self, chat_id: ChatId) -> Option<Duration> {
        let limits = self.limits.lock().await;
        if let Some(&until) = limits.get(&chat_id) {
            let now = Instant::now();
            if now < until {
                return Some(until - now);
            }
        }
        None
    }

    /// Starts a new cooldown window for the user.
    /// Called after a flow is accepted.
    pub async fn update_rate_limit(&self, chat_id: ChatId) {
        let mut limits = self.limits.lock().await;
        limits.insert(chat_id, Instant::now() + self.cooldown);
    }

    /// Removes the cooldown for a user (administrative reset).
    pub async fn remove_rate_limit(&self, chat_id: ChatId) {
        let mut limits = self.limits.lock().await;
        limits.remove(&chat_id);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_user_not_limited() {
        let limiter = RateLimiter::with_cooldown(Duration::from_secs(30));
        assert!(!limiter.is_rate_limited(ChatId(1)).await);
        assert!(limiter.get_remaining_time(ChatId(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_cooldown_applies_and_clears() {
        let limiter = RateLimiter::with_cooldown(Duration::from_secs(30));
        limiter.update_rate_limit(ChatId(1)).await;
        assert!(limiter.is_rate_limited(ChatId(1)).await);
        // Other users are unaffected
        assert!(!limiter.is_rate_limited(ChatId(2)).await);

        limiter.remove_rate_limit(ChatId(1)).await;
        assert!(!limiter.is_rate_limited(ChatId(1)).await);
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let limiter = RateLimiter::with_cooldown(Duration::from_millis(10));
        limiter.update_rate_limit(ChatId(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!limiter.is_rate_limited(ChatId(1)).await);
    }
}
