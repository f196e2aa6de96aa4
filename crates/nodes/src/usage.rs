//! Model-inference usage accounting.

use std::sync::atomic::{AtomicU64, Ordering};

use pipeline::{TokenCount, Usage};

/// Lock-free call and token counter.
///
/// Each run owns one (in its `RunContext`); the gateway keeps another for
/// process-wide totals.
#[derive(Debug, Default)]
pub struct UsageCounter {
    calls: AtomicU64,
    tokens: AtomicU64,
}

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed call.
    pub fn record(&self, usage: Usage) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.tokens.fetch_add(usage.total().as_u64(), Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn tokens(&self) -> TokenCount {
        TokenCount::new(self.tokens.load(Ordering::Relaxed))
    }
}
