// SPDX-License-Identifier: Apache-2.0 OR MIT
// Routing flags carried by every log call

use std::ops::{BitOr, BitOrAssign};

/// Routing flags for a log call. Flags combine freely with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrintfFlags(u8);

impl PrintfFlags {
    pub const NONE: Self = Self(0);
    /// Ordinary line: console and line store
    pub const REGULAR: Self = Self(0x01);
    /// Mirror to the system logger
    pub const LOG: Self = Self(0x02);
    /// Broadcast to status observers
    pub const MESSAGE: Self = Self(0x04);
    /// Broadcast with the replace marker so observers drop earlier status text
    pub const FORM_FEED: Self = Self(0x08);
    /// Console passthrough: no prefix, no accumulation, no other sink
    pub const RAW: Self = Self(0x10);

    const ALL: u8 = 0x1f;

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits, dropping unknown ones
    #[inline]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if every flag of `other` is set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag of `other` is set
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Lines of this class go to console, syslog and the line store
    #[inline]
    pub const fn is_routed(self) -> bool {
        self.intersects(Self::REGULAR.union(Self::LOG))
    }
}

impl BitOr for PrintfFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PrintfFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for PrintfFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(PrintfFlags, &str); 5] = [
            (PrintfFlags::REGULAR, "REG"),
            (PrintfFlags::LOG, "LOG"),
            (PrintfFlags::MESSAGE, "MSG"),
            (PrintfFlags::FORM_FEED, "FF"),
            (PrintfFlags::RAW, "RAW"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("NONE")?;
        }
        Ok(())
    }
}
