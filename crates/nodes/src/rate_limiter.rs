//! Sliding-window limiter for outbound model-inference calls.
//!
//! The limiter tracks every reservation made in the last 60 seconds and admits
//! a new call only when both the call count and the estimated token volume
//! stay within budget. A blocked caller sleeps until the oldest reservation
//! leaves the window, then re-checks; there is no fixed polling interval.
//!
//! One limiter is shared by every concurrent run in the process.

use std::collections::VecDeque;
use std::time::Duration;

use pipeline::TokenCount;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// The window both budgets apply to.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Per-window budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub max_calls_per_minute: u32,
    pub max_tokens_per_minute: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_calls_per_minute: 30,
            max_tokens_per_minute: 14_000,
        }
    }
}

#[derive(Debug)]
struct Reservation {
    at: Instant,
    tokens: u64,
}

#[derive(Debug, Default)]
struct Window {
    reservations: VecDeque<Reservation>,
    tokens: u64,
}

impl Window {
    fn evict_expired(&mut self, now: Instant) {
        while let Some(front) = self.reservations.front() {
            if now.duration_since(front.at) < RATE_WINDOW {
                break;
            }
            self.tokens -= front.tokens;
            self.reservations.pop_front();
        }
    }
}

/// Two-axis sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Creates a limiter. Zero budgets are raised to one so a caller can
    /// always make progress.
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits: RateLimits {
                max_calls_per_minute: limits.max_calls_per_minute.max(1),
                max_tokens_per_minute: limits.max_tokens_per_minute.max(1),
            },
            window: Mutex::new(Window::default()),
        }
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Waits until a call estimated at `tokens` fits both budgets, then
    /// reserves it.
    ///
    /// A request larger than the whole token budget is admitted once the
    /// window is empty.
    pub async fn acquire(&self, tokens: TokenCount) {
        let tokens = tokens.as_u64();
        loop {
            let wake_at = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                window.evict_expired(now);

                let calls_ok = window.reservations.len() < self.limits.max_calls_per_minute as usize;
                let tokens_ok = window.reservations.is_empty()
                    || window.tokens.saturating_add(tokens) <= self.limits.max_tokens_per_minute;
                if calls_ok && tokens_ok {
                    window.reservations.push_back(Reservation { at: now, tokens });
                    window.tokens += tokens;
                    return;
                }
                window.reservations.front().map(|oldest| oldest.at + RATE_WINDOW)
            };

            if let Some(wake_at) = wake_at {
                tracing::debug!(
                    wait_ms = wake_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "rate limit reached; waiting for window to slide"
                );
                tokio::time::sleep_until(wake_at).await;
            }
        }
    }

    /// Calls and tokens reserved in the current window.
    pub async fn usage(&self) -> (usize, u64) {
        let mut window = self.window.lock().await;
        window.evict_expired(Instant::now());
        (window.reservations.len(), window.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(calls: u32, tokens: u64) -> RateLimiter {
        RateLimiter::new(RateLimits {
            max_calls_per_minute: calls,
            max_tokens_per_minute: tokens,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn call_budget_blocks_until_oldest_call_leaves_window() {
        let limiter = limiter(3, 1_000_000);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(TokenCount::new(1)).await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.acquire(TokenCount::new(1)).await;
        assert!(start.elapsed() >= RATE_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_call_does_not_proceed_early() {
        let limiter = Arc::new(limiter(1, 1_000_000));
        limiter.acquire(TokenCount::new(1)).await;

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire(TokenCount::new(1)).await })
        };
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(!waiter.is_finished());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(waiter.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn token_budget_blocks_independently() {
        let limiter = limiter(100, 1_000);
        let start = Instant::now();
        limiter.acquire(TokenCount::new(600)).await;
        limiter.acquire(TokenCount::new(600)).await;
        assert!(start.elapsed() >= RATE_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_request_runs_on_empty_window() {
        let limiter = limiter(10, 100);
        let start = Instant::now();
        limiter.acquire(TokenCount::new(5_000)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.usage().await, (1, 5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn usage_forgets_expired_reservations() {
        let limiter = limiter(10, 1_000);
        limiter.acquire(TokenCount::new(10)).await;
        tokio::time::advance(RATE_WINDOW).await;
        assert_eq!(limiter.usage().await, (0, 0));
    }
}
