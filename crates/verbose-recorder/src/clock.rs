//! Wall clock and coarse duration formatting.

use chrono::{DateTime, Utc};
use verbose_types::Clock;

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[cfg(any(test, feature = "test-util"))]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

const UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];

/// Human duration keeping the two most significant non-zero units, e.g. `3 minutes 5 seconds`.
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0 seconds".to_string();
    }
    let mut rest = seconds;
    let mut parts = Vec::with_capacity(2);
    for (size, name) in UNITS {
        let n = rest / size;
        rest %= size;
        if n > 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", n, name, plural));
        } else if !parts.is_empty() {
            // stop at the first gap after the leading unit
            break;
        }
        if parts.len() == 2 {
            break;
        }
    }
    parts.join(" ")
}
