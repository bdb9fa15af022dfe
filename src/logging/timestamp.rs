// SPDX-License-Identifier: Apache-2.0 OR MIT
// Time sources and the two stamps on every line

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Monotonic uptime plus wall clock, supplied to the logger
pub trait TimeSource: Send + Sync {
    /// Time since the server started
    fn uptime(&self) -> Duration;

    fn wall_clock(&self) -> DateTime<Utc>;
}

/// System clocks, uptime counted from construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// Count uptime from an earlier instant, e.g. the owner's start in a forked worker
    pub fn started_at(started: Instant) -> Self {
        Self { started }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// `[Nd:]hh:mm:ss.mmm ` with a trailing space; the day field only once a day has passed
pub fn uptime_stamp(uptime: Duration) -> String {
    let total_ms = uptime.as_millis();
    let sec_ms = total_ms % 60_000;
    let mut up = total_ms / 60_000;
    let min = up % 60;
    up /= 60;
    let hr = up % 24;
    let days = up / 24;

    let clock = format!(
        "{:02}:{:02}:{:02}.{:03} ",
        hr,
        min,
        sec_ms / 1000,
        sec_ms % 1000
    );
    if days > 0 {
        format!("{}d:{}", days, clock)
    } else {
        clock
    }
}

/// `ctime(3)` layout in UTC without the year: `Thu Oct 16 09:05:03`
pub fn wall_clock_stamp(now: DateTime<Utc>) -> String {
    now.format("%a %b %e %H:%M:%S").to_string()
}
