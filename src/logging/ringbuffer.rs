// SPDX-License-Identifier: Apache-2.0 OR MIT
// Shared ring of recent log lines
//
// Layout of the shared region:
//
//   +----------------+--------------------+----------------------------+
//   | StoreHeader    | order: [u32; N]    | slots: N x line_len bytes  |
//   +----------------+--------------------+----------------------------+
//
// `order` maps sequence positions to slot numbers. Eviction permutes the
// order array instead of moving line text, and slot numbers (not pointers)
// keep the layout valid at whatever address each process maps it.

use serde::{Deserialize, Serialize};
use nix::time::{clock_gettime, ClockId};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::entry::{decode_slot, encode_slot};
use super::futex::FutexLock;
use super::shm::SharedRegion;
use crate::error::StoreError;

const STORE_MAGIC: u32 = 0x534c_4f47; // "SLOG"
const SLOT_ALIGN: usize = 64;

pub const MIN_CAPACITY: usize = 2;
pub const MIN_LINE_LEN: usize = 3;
pub const MAX_LINE_LEN: usize = u16::MAX as usize;

/// What happens to the sequence once every slot is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eviction {
    /// The first half of the lines is kept as early history; only the
    /// second half rolls, losing its oldest line on each overflow.
    #[default]
    HalfRotation,
    /// Plain ring: the oldest line overall is lost
    Fifo,
}

impl Eviction {
    fn as_raw(self) -> u32 {
        match self {
            Eviction::HalfRotation => 0,
            Eviction::Fifo => 1,
        }
    }

    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Eviction::HalfRotation),
            1 => Some(Eviction::Fifo),
            _ => None,
        }
    }

    /// Leading positions that overflow never touches
    pub fn frozen_positions(self, capacity: usize) -> usize {
        match self {
            Eviction::HalfRotation => capacity / 2,
            Eviction::Fifo => 0,
        }
    }
}

#[repr(C, align(64))]
struct StoreHeader {
    magic: AtomicU32,
    capacity: AtomicU32,
    line_len: AtomicU32,
    eviction: AtomicU32,
    init: AtomicU32,
    write_idx: AtomicU32,
    lock: FutexLock,
    not_shown: AtomicU64,
    /// CLOCK_MONOTONIC at initialization, shared by every process on the host
    started_ns: AtomicU64,
}

/// Lines in chronological order plus the count of lines that were evicted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub lines: Vec<String>,
    pub not_shown: u64,
}

/// Fixed-capacity line store shared by the owner and its workers
///
/// The owner carves the region and initializes it; workers inherit it
/// across fork or attach by name. Every append and read runs under a
/// process-shared lock in the header, so concurrent appends from several
/// processes never lose an index update.
pub struct LineStore {
    region: SharedRegion,
    header: NonNull<StoreHeader>,
    order: NonNull<u32>,
    slots: NonNull<u8>,
    capacity: usize,
    line_len: usize,
    eviction: Eviction,
}

// SAFETY: the header is only touched through atomics, and the order array
// and slots only while the header lock is held.
unsafe impl Send for LineStore {}
unsafe impl Sync for LineStore {}

fn align_up(n: usize, align: usize) -> usize {
    n.div_ceil(align) * align
}

fn order_offset() -> usize {
    std::mem::size_of::<StoreHeader>()
}

fn slots_offset(capacity: usize) -> usize {
    align_up(order_offset() + capacity * std::mem::size_of::<u32>(), SLOT_ALIGN)
}

/// CLOCK_MONOTONIC in nanoseconds, the clock `Instant` reads on Linux
fn monotonic_ns() -> Option<u64> {
    let now = clock_gettime(ClockId::CLOCK_MONOTONIC).ok()?;
    let secs = u64::try_from(now.tv_sec()).ok()?;
    let nanos = u64::try_from(now.tv_nsec()).ok()?;
    secs.checked_mul(1_000_000_000)?.checked_add(nanos)
}

fn check_geometry(capacity: usize, line_len: usize) -> Result<(), StoreError> {
    if capacity < MIN_CAPACITY || capacity > u32::MAX as usize {
        return Err(StoreError::Geometry(format!(
            "capacity {} outside {}..={}",
            capacity,
            MIN_CAPACITY,
            u32::MAX
        )));
    }
    if !(MIN_LINE_LEN..=MAX_LINE_LEN).contains(&line_len) {
        return Err(StoreError::Geometry(format!(
            "line length {} outside {}..={}",
            line_len, MIN_LINE_LEN, MAX_LINE_LEN
        )));
    }
    Ok(())
}

impl LineStore {
    /// Bytes of shared memory needed for `capacity` lines of `line_len` bytes
    pub fn region_size(capacity: usize, line_len: usize) -> Result<usize, StoreError> {
        check_geometry(capacity, line_len)?;
        capacity
            .checked_mul(line_len)
            .and_then(|slots| slots.checked_add(slots_offset(capacity)))
            .ok_or_else(|| StoreError::Geometry("store does not fit the address space".into()))
    }

    /// Partition `region` into a store without marking it initialized.
    ///
    /// Appends fail with [`StoreError::Uninitialized`] until
    /// [`initialize`](Self::initialize) runs.
    pub fn carve(
        region: SharedRegion,
        capacity: usize,
        line_len: usize,
        eviction: Eviction,
    ) -> Result<Self, StoreError> {
        let needed = Self::region_size(capacity, line_len)?;
        if region.len() < needed {
            return Err(StoreError::RegionTooSmall {
                needed,
                actual: region.len(),
            });
        }

        let store = Self::map(region, capacity, line_len, eviction)?;
        let header = store.header();
        header.init.store(0, Ordering::Release);
        header.capacity.store(capacity as u32, Ordering::Relaxed);
        header.line_len.store(line_len as u32, Ordering::Relaxed);
        header.eviction.store(eviction.as_raw(), Ordering::Relaxed);
        header.magic.store(STORE_MAGIC, Ordering::Release);
        Ok(store)
    }

    /// Reset the order, index and counter, record the start time, then
    /// publish the store
    pub fn initialize(&self) {
        let header = self.header();
        {
            let _guard = header.lock.lock();
            for (i, slot) in self.order_mut().iter_mut().enumerate() {
                *slot = i as u32;
            }
            unsafe {
                std::ptr::write_bytes(self.slots.as_ptr(), 0, self.capacity * self.line_len);
            }
            header.write_idx.store(0, Ordering::Relaxed);
            header.not_shown.store(0, Ordering::Relaxed);
            header
                .started_ns
                .store(monotonic_ns().unwrap_or(0), Ordering::Relaxed);
        }
        header.init.store(1, Ordering::Release);
    }

    /// Initialized store in an anonymous mapping, for workers created by fork
    pub fn create_anonymous(
        capacity: usize,
        line_len: usize,
        eviction: Eviction,
    ) -> Result<Self, StoreError> {
        let region = SharedRegion::anonymous(Self::region_size(capacity, line_len)?)?;
        let store = Self::carve(region, capacity, line_len, eviction)?;
        store.initialize();
        Ok(store)
    }

    /// Initialized store in named shared memory; the name is removed on drop
    pub fn create_named(
        name: &str,
        capacity: usize,
        line_len: usize,
        eviction: Eviction,
    ) -> Result<Self, StoreError> {
        let region = SharedRegion::create(name, Self::region_size(capacity, line_len)?)?;
        let store = Self::carve(region, capacity, line_len, eviction)?;
        store.initialize();
        Ok(store)
    }

    /// Attach to a named store; geometry and policy come from its header
    pub fn attach(name: &str) -> Result<Self, StoreError> {
        let region = SharedRegion::attach(name)?;
        if region.len() < std::mem::size_of::<StoreHeader>() {
            return Err(StoreError::RegionTooSmall {
                needed: std::mem::size_of::<StoreHeader>(),
                actual: region.len(),
            });
        }

        let header = unsafe { &*(region.as_ptr() as *const StoreHeader) };
        let magic = header.magic.load(Ordering::Acquire);
        if magic != STORE_MAGIC {
            return Err(StoreError::BadMagic(magic));
        }
        let capacity = header.capacity.load(Ordering::Relaxed) as usize;
        let line_len = header.line_len.load(Ordering::Relaxed) as usize;
        let raw_eviction = header.eviction.load(Ordering::Relaxed);
        let eviction = Eviction::from_raw(raw_eviction)
            .ok_or_else(|| StoreError::Geometry(format!("unknown eviction {}", raw_eviction)))?;

        let needed = Self::region_size(capacity, line_len)?;
        if region.len() < needed {
            return Err(StoreError::RegionTooSmall {
                needed,
                actual: region.len(),
            });
        }
        Self::map(region, capacity, line_len, eviction)
    }

    fn map(
        region: SharedRegion,
        capacity: usize,
        line_len: usize,
        eviction: Eviction,
    ) -> Result<Self, StoreError> {
        let base = region.as_ptr();
        let null = || StoreError::Geometry("null shared mapping".into());
        let header = NonNull::new(base as *mut StoreHeader).ok_or_else(null)?;
        let order = NonNull::new(unsafe { base.add(order_offset()) } as *mut u32).ok_or_else(null)?;
        let slots = NonNull::new(unsafe { base.add(slots_offset(capacity)) }).ok_or_else(null)?;

        Ok(Self {
            region,
            header,
            order,
            slots,
            capacity,
            line_len,
            eviction,
        })
    }

    fn header(&self) -> &StoreHeader {
        unsafe { self.header.as_ref() }
    }

    // Callers hold the header lock
    #[allow(clippy::mut_from_ref)]
    fn order_mut(&self) -> &mut [u32] {
        unsafe { std::slice::from_raw_parts_mut(self.order.as_ptr(), self.capacity) }
    }

    #[allow(clippy::mut_from_ref)]
    fn slot_mut(&self, slot: u32) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.slots.as_ptr().add(slot as usize * self.line_len),
                self.line_len,
            )
        }
    }

    fn slot(&self, slot: u32) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.slots.as_ptr().add(slot as usize * self.line_len),
                self.line_len,
            )
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.header().init.load(Ordering::Acquire) != 0
    }

    /// Store one line and return the sequence position it landed in.
    ///
    /// Until the store is full each line takes the next position. Once it is
    /// full the drop counter goes up, the non-frozen tail of the order array
    /// shifts left by one, and the line lands in the last position (reusing
    /// the slot whose line was just evicted). Over-long text is truncated
    /// to `line_len - 2` bytes plus a newline.
    pub fn append(&self, text: &str) -> Result<usize, StoreError> {
        if !self.is_initialized() {
            return Err(StoreError::Uninitialized);
        }
        let header = self.header();
        let _guard = header.lock.lock();

        let idx = header.write_idx.load(Ordering::Relaxed) as usize;
        let order = self.order_mut();
        let pos = if idx < self.capacity {
            header.write_idx.store(idx as u32 + 1, Ordering::Relaxed);
            idx
        } else {
            header.not_shown.fetch_add(1, Ordering::Relaxed);
            let frozen = self.eviction.frozen_positions(self.capacity);
            order[frozen..].rotate_left(1);
            self.capacity - 1
        };

        encode_slot(self.slot_mut(order[pos]), text);
        Ok(pos)
    }

    /// Current lines in chronological order and the drop counter
    pub fn read_all(&self) -> Result<StoreSnapshot, StoreError> {
        if !self.is_initialized() {
            return Err(StoreError::Uninitialized);
        }
        let header = self.header();
        let _guard = header.lock.lock();

        let n = (header.write_idx.load(Ordering::Relaxed) as usize).min(self.capacity);
        let lines = self.order_mut()[..n]
            .iter()
            .map(|&slot| decode_slot(self.slot(slot)))
            .collect();

        Ok(StoreSnapshot {
            lines,
            not_shown: header.not_shown.load(Ordering::Relaxed),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn line_len(&self) -> usize {
        self.line_len
    }

    pub fn eviction(&self) -> Eviction {
        self.eviction
    }

    pub fn write_index(&self) -> usize {
        self.header().write_idx.load(Ordering::Relaxed) as usize
    }

    pub fn not_shown(&self) -> u64 {
        self.header().not_shown.load(Ordering::Relaxed)
    }

    /// When the owner initialized the store, as an `Instant` of this process.
    ///
    /// Processes that attach by name count uptime from here so their lines
    /// line up with the owner's. Falls back to now if the clock is unreadable.
    pub fn started_at(&self) -> Instant {
        let now = Instant::now();
        let started = self.header().started_ns.load(Ordering::Relaxed);
        match monotonic_ns() {
            Some(mono) if started != 0 => now
                .checked_sub(Duration::from_nanos(mono.saturating_sub(started)))
                .unwrap_or(now),
            _ => now,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.region.name()
    }
}

impl std::fmt::Debug for LineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStore")
            .field("region", &self.region)
            .field("capacity", &self.capacity)
            .field("line_len", &self.line_len)
            .field("eviction", &self.eviction)
            .field("write_index", &self.write_index())
            .field("not_shown", &self.not_shown())
            .finish()
    }
}
