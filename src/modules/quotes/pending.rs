use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use teloxide::types::UserId;

/// What a photo from a user should be treated as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PendingState {
    /// `/addquote` was sent recently, the photo is the new quote.
    Waiting,
    /// `/addquote` was sent but the window has passed.
    Expired,
    /// No `/addquote` was sent.
    Idle,
}

/// Per-user "waiting for a quote photo" records. A record is consumed by
/// the first [`take`](Self::take) and lapses after `ttl`.
#[derive(Clone)]
pub(crate) struct PendingUploads {
    inner: Arc<Mutex<PendingUploadsInner>>,
}

struct PendingUploadsInner {
    ttl: Duration,
    started: HashMap<UserId, Instant>,
}

impl PendingUploads {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PendingUploadsInner {
                ttl,
                started: HashMap::new(),
            })),
        }
    }

    pub fn begin(&self, user_id: UserId) {
        self.begin_at(user_id, Instant::now())
    }

    /// Peeks at the state without consuming it.
    pub fn state(&self, user_id: UserId) -> PendingState {
        self.state_at(user_id, Instant::now())
    }

    /// Consumes the record of `user_id` and returns its state.
    pub fn take(&self, user_id: UserId) -> PendingState {
        self.take_at(user_id, Instant::now())
    }

    fn begin_at(&self, user_id: UserId, now: Instant) {
        self.with_mut_inner(|inner| {
            inner.evict_expired(now);
            inner.started.insert(user_id, now);
        });
    }

    fn state_at(&self, user_id: UserId, now: Instant) -> PendingState {
        self.with_mut_inner(|inner| match inner.started.get(&user_id) {
            Some(started) => inner.classify(*started, now),
            None => PendingState::Idle,
        })
    }

    fn take_at(&self, user_id: UserId, now: Instant) -> PendingState {
        self.with_mut_inner(|inner| match inner.started.remove(&user_id) {
            Some(started) => inner.classify(started, now),
            None => PendingState::Idle,
        })
    }

    fn with_mut_inner<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut PendingUploadsInner) -> R,
    {
        let mut inner_mut = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut inner_mut)
    }
}

impl PendingUploadsInner {
    fn classify(&self, started: Instant, now: Instant) -> PendingState {
        if now.saturating_duration_since(started) <= self.ttl {
            PendingState::Waiting
        } else {
            PendingState::Expired
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.started
            .retain(|_, started| now.saturating_duration_since(*started) <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn test_idle_without_begin() {
        let pending = PendingUploads::new(TTL);
        assert_eq!(pending.take(UserId(1)), PendingState::Idle);
    }

    #[test]
    fn test_take_consumes_once() {
        let pending = PendingUploads::new(TTL);
        let now = Instant::now();
        pending.begin_at(UserId(1), now);

        assert_eq!(pending.state_at(UserId(1), now), PendingState::Waiting);
        assert_eq!(pending.take_at(UserId(1), now), PendingState::Waiting);
        assert_eq!(pending.take_at(UserId(1), now), PendingState::Idle);
    }

    #[test]
    fn test_expires_after_ttl() {
        let pending = PendingUploads::new(TTL);
        let now = Instant::now();
        pending.begin_at(UserId(1), now);

        let later = now + TTL + Duration::from_secs(1);
        assert_eq!(pending.state_at(UserId(1), later), PendingState::Expired);
        assert_eq!(pending.take_at(UserId(1), later), PendingState::Expired);
        assert_eq!(pending.take_at(UserId(1), later), PendingState::Idle);
    }

    #[test]
    fn test_users_are_independent() {
        let pending = PendingUploads::new(TTL);
        let now = Instant::now();
        pending.begin_at(UserId(1), now);

        assert_eq!(pending.take_at(UserId(2), now), PendingState::Idle);
        assert_eq!(pending.take_at(UserId(1), now), PendingState::Waiting);
    }

    #[test]
    fn test_begin_evicts_stale_records() {
        let pending = PendingUploads::new(TTL);
        let now = Instant::now();
        pending.begin_at(UserId(1), now);

        let later = now + TTL * 2;
        pending.begin_at(UserId(2), later);
        assert_eq!(pending.take_at(UserId(1), later), PendingState::Idle);
        assert_eq!(pending.take_at(UserId(2), later), PendingState::Waiting);
    }

    #[test]
    fn test_begin_again_restarts_window() {
        let pending = PendingUploads::new(TTL);
        let now = Instant::now();
        pending.begin_at(UserId(1), now);

        let later = now + TTL - Duration::from_secs(1);
        pending.begin_at(UserId(1), later);
        let after_first_window = now + TTL + Duration::from_secs(10);
        assert_eq!(
            pending.take_at(UserId(1), after_first_window),
            PendingState::Waiting
        );
    }
}
