//! In-process brute-force throttle.
//!
//! Counts authorization attempts per identifier+device key inside a fixed
//! window. State is an explicit, injected resource with TTL eviction, so a
//! long-running process never accumulates stale keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;

use crate::domain::ports::{RateLimitDecision, RateLimitStore};

struct WindowSlot {
    window_started_at: DateTime<Utc>,
    attempts: u32,
}

/// Fixed-window throttle backed by a mutex-guarded map.
pub struct InMemoryRateLimitStore {
    window: Duration,
    max_attempts: u32,
    slots: Mutex<HashMap<String, WindowSlot>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateLimitStore {
    /// Build a throttle admitting `max_attempts` per `window` per key.
    pub fn new(window: Duration, max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            max_attempts,
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn window_duration(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::seconds(60))
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn register_attempt(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.utc();
        let window = self.window_duration();
        let Ok(mut slots) = self.slots.lock() else {
            // A poisoned throttle must not block authorization.
            return RateLimitDecision::Allowed;
        };

        // Evict every slot whose window has lapsed, not just the caller's.
        slots.retain(|_, slot| slot.window_started_at + window > now);

        let slot = slots.entry(key.to_owned()).or_insert(WindowSlot {
            window_started_at: now,
            attempts: 0,
        });
        if slot.attempts >= self.max_attempts {
            return RateLimitDecision::Limited;
        }
        slot.attempts += 1;
        RateLimitDecision::Allowed
    }
}
