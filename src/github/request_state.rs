// Shared state consulted by the request runner.
// Holds ETag validators with cached bodies, per-URL cooldowns and the global rate-limit reset.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::RateLimitSnapshot;

/// Last validator and body seen for a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub etag: String,
    pub body: Bytes,
    /// Pagination header, which GitHub may omit from a 304.
    pub link: Option<String>,
}

/// Point-in-time view of the request state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub rate_limit_reset: Option<DateTime<Utc>>,
    pub last_rate_limit_error: Option<String>,
    pub etag_entry_count: usize,
    pub cooldown_entry_count: usize,
    pub last_rest_rate_limit: Option<RateLimitSnapshot>,
}

#[derive(Debug, Default)]
struct Inner {
    etags: HashMap<String, CachedResponse>,
    cooldowns: HashMap<String, DateTime<Utc>>,
    rate_limit_reset: Option<DateTime<Utc>>,
    last_rate_limit_error: Option<String>,
    last_snapshot: Option<RateLimitSnapshot>,
}

/// ETag store, cooldown tracker and global rate-limit state behind one lock.
///
/// The lock is never held across an await point, so a plain mutex suffices.
impl Inner {
    /// Record a cooldown, dropping entries for URLs that were never requested again.
    fn insert_cooldown(&mut self, url: &str, until: DateTime<Utc>) {
        let now = Utc::now();
        self.cooldowns.retain(|_, expiry| *expiry > now);
        self.cooldowns.insert(url.to_string(), until);
    }
}

#[derive(Debug, Default)]
pub struct RequestState {
    inner: Mutex<Inner>,
}

impl RequestState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active global rate-limit reset, clearing it once it has passed.
    pub fn rate_limit_reset(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut inner = self.lock();
        match inner.rate_limit_reset {
            Some(reset) if now < reset => Some(reset),
            Some(_) => {
                inner.rate_limit_reset = None;
                None
            }
            None => None,
        }
    }

    /// Record that the quota is exhausted until `reset`.
    pub fn set_rate_limited(&self, url: &str, reset: DateTime<Utc>, message: &str) {
        let mut inner = self.lock();
        inner.rate_limit_reset = Some(match inner.rate_limit_reset {
            Some(existing) if existing > reset => existing,
            _ => reset,
        });
        inner.insert_cooldown(url, reset);
        inner.last_rate_limit_error = Some(message.to_string());
    }

    /// Drop the global reset if the server reports quota again and the reset has passed.
    pub fn clear_rate_limit_if_recovered(&self, remaining: Option<u64>, now: DateTime<Utc>) {
        if remaining.is_none_or(|r| r == 0) {
            return;
        }
        let mut inner = self.lock();
        if inner.rate_limit_reset.is_some_and(|reset| now >= reset) {
            inner.rate_limit_reset = None;
        }
    }

    /// Unexpired cooldown for `url`; expired entries are removed.
    pub fn cooldown(&self, url: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut inner = self.lock();
        match inner.cooldowns.get(url).copied() {
            Some(until) if now < until => Some(until),
            Some(_) => {
                inner.cooldowns.remove(url);
                None
            }
            None => None,
        }
    }

    pub fn set_cooldown(&self, url: &str, until: DateTime<Utc>) {
        self.lock().insert_cooldown(url, until);
    }

    pub fn cached_response(&self, url: &str) -> Option<CachedResponse> {
        self.lock().etags.get(url).cloned()
    }

    /// Replace the cached validator and body for `url` as one unit.
    pub fn store_response(&self, url: &str, etag: String, body: Bytes, link: Option<String>) {
        self.lock()
            .etags
            .insert(url.to_string(), CachedResponse { etag, body, link });
    }

    pub fn record_snapshot(&self, snapshot: RateLimitSnapshot) {
        self.lock().last_snapshot = Some(snapshot);
    }

    /// Forget every validator, cooldown and rate-limit marker.
    pub fn clear(&self) {
        *self.lock() = Inner::default();
    }

    pub fn diagnostics(&self, now: DateTime<Utc>) -> Diagnostics {
        let inner = self.lock();
        Diagnostics {
            rate_limit_reset: inner.rate_limit_reset.filter(|reset| now < *reset),
            last_rate_limit_error: inner.last_rate_limit_error.clone(),
            etag_entry_count: inner.etags.len(),
            cooldown_entry_count: inner
                .cooldowns
                .values()
                .filter(|until| now < **until)
                .count(),
            last_rest_rate_limit: inner.last_snapshot.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_rate_limit_clears_after_reset() {
        let state = RequestState::new();
        let now = Utc::now();
        let reset = now + Duration::seconds(60);

        state.set_rate_limited("https://api.github.com/a", reset, "limited");
        assert_eq!(state.rate_limit_reset(now), Some(reset));
        assert_eq!(state.rate_limit_reset(reset), None);
        assert_eq!(state.diagnostics(now).rate_limit_reset, None);
        assert_eq!(
            state.diagnostics(now).last_rate_limit_error.as_deref(),
            Some("limited")
        );
    }

    #[test]
    fn test_rate_limit_keeps_latest_reset() {
        let state = RequestState::new();
        let now = Utc::now();
        let later = now + Duration::seconds(120);

        state.set_rate_limited("a", later, "first");
        state.set_rate_limited("b", now + Duration::seconds(30), "second");
        assert_eq!(state.rate_limit_reset(now), Some(later));
    }

    #[test]
    fn test_recovery_requires_quota_and_elapsed_reset() {
        let state = RequestState::new();
        let now = Utc::now();
        let reset = now + Duration::seconds(10);
        state.set_rate_limited("a", reset, "limited");

        state.clear_rate_limit_if_recovered(Some(100), now);
        assert_eq!(state.diagnostics(now).rate_limit_reset, Some(reset));

        state.clear_rate_limit_if_recovered(Some(0), reset);
        assert!(state.lock().rate_limit_reset.is_some());

        state.clear_rate_limit_if_recovered(Some(100), reset);
        assert!(state.lock().rate_limit_reset.is_none());
    }

    #[test]
    fn test_cooldown_expires() {
        let state = RequestState::new();
        let now = Utc::now();
        let until = now + Duration::seconds(30);

        state.set_cooldown("u", until);
        assert_eq!(state.cooldown("u", now), Some(until));
        assert_eq!(state.diagnostics(now).cooldown_entry_count, 1);
        assert_eq!(state.cooldown("u", until), None);
        assert_eq!(state.diagnostics(now).cooldown_entry_count, 0);
    }

    #[test]
    fn test_expired_cooldowns_are_pruned() {
        let state = RequestState::new();
        let now = Utc::now();
        state.set_cooldown("once", now - Duration::seconds(1));
        state.set_rate_limited("twice", now - Duration::seconds(5), "limited");

        state.set_cooldown("fresh", now + Duration::seconds(30));

        assert_eq!(state.lock().cooldowns.len(), 1);
        assert_eq!(state.cooldown("fresh", now), Some(now + Duration::seconds(30)));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let state = RequestState::new();
        let now = Utc::now();
        state.store_response("u", "\"abc\"".to_string(), Bytes::from_static(b"{}"), None);
        state.set_cooldown("u", now + Duration::seconds(30));
        state.set_rate_limited("u", now + Duration::seconds(30), "limited");

        state.clear();
        let diagnostics = state.diagnostics(now);
        assert_eq!(diagnostics.etag_entry_count, 0);
        assert_eq!(diagnostics.cooldown_entry_count, 0);
        assert_eq!(diagnostics.rate_limit_reset, None);
        assert!(state.cached_response("u").is_none());
    }
}
