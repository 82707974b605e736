//! Injected time source for recency windows.

use chrono::Datelike;

/// Current year/month provider. Injected so recency filters are
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn current_year(&self) -> i32;
    fn current_month(&self) -> u32;
}

/// Wall-clock implementation.
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_year(&self) -> i32 {
        chrono::Utc::now().year()
    }

    fn current_month(&self) -> u32 {
        chrono::Utc::now().month()
    }
}

/// Fixed time source for tests.
pub struct FixedClock {
    pub year: i32,
    pub month: u32,
}

impl Clock for FixedClock {
    fn current_year(&self) -> i32 {
        self.year
    }

    fn current_month(&self) -> u32 {
        self.month
    }
}
