//! # Log Rate Limiting
//!
//! The ingestion loop handles about one telegram per second. When a series
//! store is unavailable every telegram produces the same storage warning, so
//! repeated warnings are rate limited per category.
//!
//! ```rust
//! use meterd::util::logging::LogThrottle;
//!
//! let mut throttle = LogThrottle::new(60_000, 5); // 5 messages per minute
//! if throttle.allow() {
//!     log::warn!("Failed to record value");
//! }
//! ```

use std::collections::HashMap;
use std::time::Instant;

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    /// Messages seen in the current window, including suppressed ones
    count: u32,
    /// Start time of current window
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets counter after window expires)
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            self.t0 = now;
            self.count = 0;
        }

        self.count = self.count.saturating_add(1);
        self.count <= self.cap
    }

    /// Number of messages suppressed in the current window
    pub fn suppressed(&self) -> u32 {
        self.count.saturating_sub(self.cap)
    }
}

/// Per-category throttles, so one noisy store does not silence another.
#[derive(Debug)]
pub struct ThrottleManager {
    throttles: HashMap<String, LogThrottle>,
    window_ms: u64,
    cap: u32,
}

impl ThrottleManager {
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            throttles: HashMap::new(),
            window_ms,
            cap,
        }
    }

    /// Check if logging is allowed for a specific category
    pub fn allow(&mut self, category: &str) -> bool {
        let (window_ms, cap) = (self.window_ms, self.cap);
        self.throttles
            .entry(category.to_string())
            .or_insert_with(|| LogThrottle::new(window_ms, cap))
            .allow()
    }
}

impl Default for ThrottleManager {
    fn default() -> Self {
        Self::new(60_000, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_throttle_basic() {
        let mut throttle = LogThrottle::new(60_000, 3);

        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(!throttle.allow());
        assert!(!throttle.allow());
        assert_eq!(throttle.suppressed(), 2);
    }

    #[test]
    fn test_throttle_manager_categories_are_independent() {
        let mut manager = ThrottleManager::new(60_000, 1);

        assert!(manager.allow("raw"));
        assert!(!manager.allow("raw"));
        assert!(manager.allow("hourly"));
    }
}
