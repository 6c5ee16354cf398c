//! Short-lived filter for statements evaluated moments ago
//!
//! Interceptor chains often hand the same statement to the guard several times
//! in quick succession. The filter remembers recently seen keys for a few
//! milliseconds so the repeat can be waved through. One filter is shared by
//! every thread calling the guard; lookups serialize on a single mutex.

use crate::config::DedupConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct DedupFilter {
    seen: Mutex<HashMap<String, Instant>>,
    capacity: usize,
    ttl: Duration,
}

impl DedupFilter {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.capacity, Duration::from_millis(config.ttl_ms))
    }

    /// Record `key` and report whether it was already seen within the TTL
    ///
    /// Keys compare exactly. Case is significant because string literals are
    /// part of the text.
    pub fn is_duplicate(&self, key: &str) -> bool {
        self.is_duplicate_at(key, Instant::now())
    }

    fn is_duplicate_at(&self, key: &str, now: Instant) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if seen
            .get(key)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.ttl)
        {
            return true;
        }

        if seen.len() >= self.capacity && !seen.contains_key(key) {
            seen.retain(|_, at| now.saturating_duration_since(*at) < self.ttl);
            if seen.len() >= self.capacity {
                let oldest = seen
                    .iter()
                    .min_by_key(|(_, at)| **at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    seen.remove(&oldest);
                }
            }
        }
        seen.insert(key.to_string(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.clear();
        }
    }
}
