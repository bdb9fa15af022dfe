// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Receiver channel busy flags.
//!
//! The channel scheduler owns and updates these flags; the logger only reads
//! them to render one glyph per channel in front of every line.

use std::sync::atomic::{AtomicBool, Ordering};

/// Read-only view of the per-channel busy bitmap
pub trait ChannelStatus: Send + Sync {
    /// Number of receiver channels
    fn channel_count(&self) -> usize;

    /// Whether `chan` is currently busy. Out-of-range channels are idle.
    fn is_busy(&self, chan: usize) -> bool;
}

/// Fixed-size busy vector, one flag per receiver channel
#[derive(Debug)]
pub struct ChannelVector {
    busy: Box<[AtomicBool]>,
}

impl ChannelVector {
    pub fn new(channels: usize) -> Self {
        let busy: Vec<AtomicBool> = (0..channels).map(|_| AtomicBool::new(false)).collect();
        Self {
            busy: busy.into_boxed_slice(),
        }
    }

    /// Scheduler side: mark a channel busy or idle. Out-of-range is ignored.
    pub fn set_busy(&self, chan: usize, busy: bool) {
        if let Some(flag) = self.busy.get(chan) {
            flag.store(busy, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Vec<bool> {
        self.busy.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }
}

impl ChannelStatus for ChannelVector {
    fn channel_count(&self) -> usize {
        self.busy.len()
    }

    fn is_busy(&self, chan: usize) -> bool {
        self.busy
            .get(chan)
            .map(|b| b.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Glyph naming a channel: `0`-`9`, then `a`-`z`
pub fn channel_glyph(chan: usize) -> char {
    char::from_digit((chan % 36) as u32, 36).unwrap_or('?')
}

/// One glyph per channel: the channel's digit when busy, `.` when idle
pub fn busy_glyphs(status: &dyn ChannelStatus) -> String {
    (0..status.channel_count())
        .map(|chan| {
            if status.is_busy(chan) {
                channel_glyph(chan)
            } else {
                '.'
            }
        })
        .collect()
}
