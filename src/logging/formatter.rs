// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Line accumulation across calls.
//!
//! A call whose text does not end in a newline leaves the text pending; the
//! next call appends to it. Only one line can be pending per process, and
//! callers must not interleave unterminated lines from two contexts.

use std::collections::TryReserveError;
use std::fmt::{self, Write};

use super::PrintfFlags;

/// Scratch bytes for one line, terminator included
pub const DEFAULT_SCRATCH_LEN: usize = 1024;

/// Outcome of feeding one call into the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit {
    /// A whole line, ready for routing
    Finished(String),
    /// Text held back until a newline arrives
    Pending,
}

/// Per-process continuation buffer
#[derive(Debug)]
pub struct Continuation {
    scratch: String,
    limit: usize,
    appending: bool,
}

impl Continuation {
    /// `limit` counts the terminator, so at most `limit - 1` bytes accumulate
    pub fn new(limit: usize) -> Self {
        Self {
            scratch: String::new(),
            limit: limit.max(2),
            appending: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.appending
    }

    pub fn pending_text(&self) -> &str {
        if self.appending {
            &self.scratch
        } else {
            ""
        }
    }

    /// Render `args` into the scratch buffer.
    ///
    /// The line finishes when the text ends in a newline, when MESSAGE is set,
    /// or when the scratch space runs out. A line cut short by the scratch
    /// limit is terminated with a newline in its last byte; one that exactly
    /// fills it is finished as written.
    ///
    /// Fails only when scratch memory cannot be obtained.
    pub fn emit(
        &mut self,
        flags: PrintfFlags,
        args: fmt::Arguments<'_>,
    ) -> Result<Emit, TryReserveError> {
        if !self.appending {
            self.scratch.clear();
            self.scratch.try_reserve(self.limit)?;
        }

        let room = (self.limit - 1).saturating_sub(self.scratch.len());
        let mut writer = Bounded {
            buf: &mut self.scratch,
            room,
            truncated: false,
        };
        // Bounded never fails; a Display impl that errors just ends the text early
        let _ = writer.write_fmt(args);
        let truncated = writer.truncated;
        let exhausted = truncated || writer.room == 0;

        let terminated = self.scratch.ends_with('\n');
        if !terminated && !exhausted && !flags.contains(PrintfFlags::MESSAGE) {
            self.appending = true;
            return Ok(Emit::Pending);
        }
        self.appending = false;

        if truncated && !terminated {
            self.scratch.pop();
            self.scratch.push('\n');
        }

        Ok(Emit::Finished(std::mem::take(&mut self.scratch)))
    }

    /// Drop any pending text
    pub fn reset(&mut self) {
        self.scratch.clear();
        self.appending = false;
    }
}

impl Default for Continuation {
    fn default() -> Self {
        Self::new(DEFAULT_SCRATCH_LEN)
    }
}

/// Writer that silently stops at `room` bytes, on a char boundary
struct Bounded<'a> {
    buf: &'a mut String,
    room: usize,
    truncated: bool,
}

impl Write for Bounded<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Ok(());
        }
        if s.len() <= self.room {
            self.buf.push_str(s);
            self.room -= s.len();
        } else {
            let mut cut = self.room;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            self.buf.push_str(&s[..cut]);
            self.room -= cut;
            self.truncated = true;
        }
        Ok(())
    }
}
