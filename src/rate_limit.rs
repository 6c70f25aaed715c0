//! # Rate Limiter
//! Sliding-window admission control for upstream calls.
//!
//! Keeps the timestamps (ms) of admitted calls in a `VecDeque`. Before each
//! admission check, entries that have left the window are dropped from the
//! front. A rejected attempt is not recorded.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::error::FetchError;

/// Source of "now" in milliseconds. Injected so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock (UNIX milliseconds).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_millis(0))
            .as_millis() as u64
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Mutex::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        let mut g = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *g = g.saturating_add(ms);
    }

    pub fn set(&self, ms: u64) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Returned by a successful admission; carries the recorded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    pub admitted_at_ms: u64,
}

/// Thread-safe sliding-window limiter. One instance is shared per process.
pub struct RateLimiter {
    budget: Mutex<VecDeque<u64>>,
    max_requests: usize,
    window_ms: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window_ms", &self.window_ms)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            budget: Mutex::new(VecDeque::with_capacity(max_requests)),
            max_requests,
            window_ms: window.as_millis() as u64,
            clock,
        }
    }

    /// Admit one call now, or fail with `RateLimited` carrying the time until
    /// the oldest retained entry leaves the window.
    pub fn admit(&self) -> Result<Permit, FetchError> {
        let now = self.clock.now_ms();
        let mut budget = self.budget.lock().unwrap_or_else(|p| p.into_inner());

        while let Some(&t) = budget.front() {
            if now.saturating_sub(t) >= self.window_ms {
                budget.pop_front();
            } else {
                break;
            }
        }

        if budget.len() >= self.max_requests {
            let retry_after_ms = budget
                .front()
                .map(|&oldest| self.window_ms.saturating_sub(now.saturating_sub(oldest)))
                .unwrap_or(self.window_ms);
            return Err(FetchError::RateLimited { retry_after_ms });
        }

        budget.push_back(now);
        Ok(Permit {
            admitted_at_ms: now,
        })
    }

    /// Number of admitted calls still inside the window (diagnostics).
    pub fn in_window(&self) -> usize {
        let now = self.clock.now_ms();
        let budget = self.budget.lock().unwrap_or_else(|p| p.into_inner());
        budget
            .iter()
            .filter(|&&t| now.saturating_sub(t) < self.window_ms)
            .count()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}
