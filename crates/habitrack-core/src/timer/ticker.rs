//! Single authoritative tick handle.
//!
//! A timer owns exactly one `Ticker`. It is armed when the timer enters
//! `Running` and cancelled whenever it leaves. Arming always cancels the
//! previous handle first, so at most one interval is ever live. Ticks that
//! arrive while no handle is armed are ignored.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TICKER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one armed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickerId(u64);

#[derive(Debug, Default)]
pub struct Ticker {
    active: Option<TickerId>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any live interval and arm a new one.
    pub fn arm(&mut self) -> TickerId {
        self.cancel();
        let id = TickerId(NEXT_TICKER_ID.fetch_add(1, Ordering::Relaxed));
        self.active = Some(id);
        id
    }

    /// Cancel the live interval. Calling it twice is a no-op.
    pub fn cancel(&mut self) -> Option<TickerId> {
        self.active.take()
    }

    pub fn is_armed(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<TickerId> {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_replaces_previous_handle() {
        let mut ticker = Ticker::new();
        let first = ticker.arm();
        let second = ticker.arm();
        assert_ne!(first, second);
        assert_eq!(ticker.active(), Some(second));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut ticker = Ticker::new();
        ticker.arm();
        assert!(ticker.cancel().is_some());
        assert!(ticker.cancel().is_none());
        assert!(!ticker.is_armed());
    }
}
