//! Wall-clock source.
//!
//! The engine never calls `SystemTime::now()` directly, so tests can move
//! time forward to simulate suspended tabs and restarted processes.

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// The calendar date habits are tracked against.
    fn today(&self) -> NaiveDate;

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms() as i64).unwrap_or_default()
    }
}

/// Real time, local calendar date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Rc::new(Cell::new(now_ms)),
        }
    }

    /// Start at midnight UTC of `date` plus `hour` hours.
    pub fn at(date: NaiveDate, hour: u32) -> Self {
        let ts = date
            .and_hms_opt(hour, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or_default();
        Self::new(ts as u64)
    }

    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs * 1000);
    }

    pub fn advance_days(&self, days: u64) {
        self.advance_secs(days * 86_400);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    /// UTC date of the current instant.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let clock = ManualClock::at(date, 9);
        let handle = clock.clone();
        handle.advance_secs(37);
        assert_eq!(clock.now_ms(), handle.now_ms());
        assert_eq!(clock.today(), date);
        handle.advance_days(1);
        assert_eq!(clock.today(), date.succ_opt().unwrap());
    }
}
