//! Global rate-limit coordinator
//!
//! The backend imposes one quota shared across every operation in the
//! process. The coordinator is an explicit, cloneable handle injected
//! into every call site rather than hidden process-wide state: callers
//! `await_ready()` before issuing a request and `record_response()` with
//! the quota headers afterwards.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::observability::Logger;

use super::types::QuotaHeaders;

#[derive(Debug, Default)]
struct LimiterState {
    /// Last response reported zero remaining quota
    exhausted: bool,
    /// Unix time at which the quota window resets
    reset_unix: f64,
}

/// Shared backpressure valve for all backend calls.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    state: Arc<Mutex<LimiterState>>,
}

impl RateLimiter {
    /// Creates a fresh limiter with no quota pressure recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the backend's quota window has reset, if the last
    /// recorded response exhausted it. Returns immediately otherwise.
    pub async fn await_ready(&self) {
        let wait_secs = {
            let state = self.lock();
            if state.exhausted {
                (state.reset_unix - unix_now()).max(0.0)
            } else {
                0.0
            }
        };
        if wait_secs > 0.0 {
            Logger::warn(
                "RATE_LIMIT_WAIT",
                &[("seconds", &format!("{:.3}", wait_secs))],
            );
            tokio::time::sleep(Duration::from_secs_f64(wait_secs)).await;
        }
    }

    /// Records the quota headers of a completed call.
    ///
    /// A remaining count of zero arms the valve until the reported reset
    /// time; any non-zero count disarms it. Responses without quota
    /// headers leave the state untouched.
    pub fn record_response(&self, quota: &QuotaHeaders) {
        let mut state = self.lock();
        match quota.remaining {
            Some(0) => {
                state.exhausted = true;
                state.reset_unix = quota.reset_unix.unwrap_or_else(unix_now);
            }
            Some(_) => {
                state.exhausted = false;
            }
            None => {}
        }
    }

    /// True when the next call would have to wait
    pub fn is_exhausted(&self) -> bool {
        let state = self.lock();
        state.exhausted && state.reset_unix > unix_now()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
