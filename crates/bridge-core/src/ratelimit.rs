//! Process-wide rate budget for remote API calls.
//!
//! The Notion API reports remaining quota and a reset timestamp in
//! response headers. One `RateBudget` is shared (behind a mutex handle)
//! by every gateway clone in the process so concurrent syncs cannot
//! oversubscribe the quota. The current time is always passed in, so
//! tests control the clock.

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

/// Calls left before we start waiting for the reset.
const LOW_WATER_MARK: u32 = 10;

/// Remaining-call counter plus reset timestamp.
#[derive(Debug, Clone)]
pub struct RateBudget {
    remaining: u32,
    reset_at: SystemTime,
}

impl Default for RateBudget {
    fn default() -> Self {
        // Optimistic until the first response tells us otherwise.
        RateBudget {
            remaining: 1000,
            reset_at: SystemTime::UNIX_EPOCH,
        }
    }
}

impl RateBudget {
    /// Record fresh limit headers. Either field may be absent from a
    /// response; absent fields keep their previous value.
    pub fn record(&mut self, remaining: Option<u32>, reset_at: Option<SystemTime>) {
        if let Some(remaining) = remaining {
            self.remaining = remaining;
        }
        if let Some(reset_at) = reset_at {
            self.reset_at = reset_at;
        }
    }

    /// How long a caller must wait before issuing the next request.
    ///
    /// `None` when quota remains or the reset time has already passed
    /// (elapsing past the reset implicitly refreshes the budget).
    pub fn required_delay(&self, now: SystemTime) -> Option<Duration> {
        if self.remaining >= LOW_WATER_MARK {
            return None;
        }
        match self.reset_at.duration_since(now) {
            // One extra second of slack past the advertised reset.
            Ok(until_reset) => Some(until_reset + Duration::from_secs(1)),
            Err(_) => None,
        }
    }
}

/// Shared handle to the process-wide budget.
pub type SharedRateBudget = Arc<Mutex<RateBudget>>;

/// Create a fresh shared budget.
pub fn shared() -> SharedRateBudget {
    Arc::new(Mutex::new(RateBudget::default()))
}
