// SPDX-License-Identifier: Apache-2.0 OR MIT
// Process-shared mutex for memory mapped with MAP_SHARED

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const UNLOCKED: u32 = 0;
/// Set while another process or thread may be parked on the word
const WAITERS: u32 = 1 << 31;
/// Linux pids stay below 2^22, well clear of the waiters bit
const PID_MASK: u32 = !WAITERS;

/// How long a waiter sleeps before checking whether the holder still exists
const HOLDER_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Mutex usable from every process that maps the memory it lives in.
///
/// The lock word holds the holder's PID plus a waiters bit, so taking and
/// releasing the lock are each a single atomic step and a locked word always
/// names its holder. All-zero bytes are a valid unlocked lock, so it can sit
/// in a fresh mapping without construction. A waiter that finds the holder
/// gone takes the lock over rather than hanging on a process that crashed
/// mid-append.
#[repr(C)]
pub struct FutexLock {
    word: AtomicU32,
}

impl FutexLock {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(UNLOCKED),
        }
    }

    pub fn lock(&self) -> FutexGuard<'_> {
        let me = std::process::id() & PID_MASK;

        if self
            .word
            .compare_exchange(UNLOCKED, me, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return FutexGuard { lock: self };
        }

        loop {
            let mut current = self.word.load(Ordering::Relaxed);
            if current == UNLOCKED {
                // others may be parked behind us, so keep the waiters bit
                if self
                    .word
                    .compare_exchange(UNLOCKED, me | WAITERS, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return FutexGuard { lock: self };
                }
                continue;
            }
            if current & WAITERS == 0 {
                if self
                    .word
                    .compare_exchange(
                        current,
                        current | WAITERS,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    )
                    .is_err()
                {
                    continue;
                }
                current |= WAITERS;
            }
            if !futex_wait(&self.word, current, HOLDER_CHECK_INTERVAL)
                && self.take_over(current, me)
            {
                return FutexGuard { lock: self };
            }
        }
    }

    /// PID of the current holder, 0 when free
    pub fn holder(&self) -> u32 {
        self.word.load(Ordering::Relaxed) & PID_MASK
    }

    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Relaxed) != UNLOCKED
    }

    /// Claim the lock if the holder recorded in `seen` no longer exists
    fn take_over(&self, seen: u32, me: u32) -> bool {
        let holder = seen & PID_MASK;
        // me: another thread of this process
        if holder == me {
            return false;
        }
        if kill(Pid::from_raw(holder as i32), None) != Err(Errno::ESRCH) {
            return false;
        }
        self.word
            .compare_exchange(seen, me | WAITERS, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for FutexLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FutexGuard<'a> {
    lock: &'a FutexLock,
}

impl Drop for FutexGuard<'_> {
    fn drop(&mut self) {
        if self.lock.word.swap(UNLOCKED, Ordering::Release) & WAITERS != 0 {
            futex_wake(&self.lock.word);
        }
    }
}

/// Sleep while `atomic == expected`. Returns false when the wait timed out.
#[cfg(target_os = "linux")]
fn futex_wait(atomic: &AtomicU32, expected: u32, timeout: Duration) -> bool {
    if atomic.load(Ordering::Relaxed) != expected {
        return true;
    }

    let ts = libc::timespec {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as libc::c_long,
    };
    // no FUTEX_PRIVATE_FLAG: waiters live in different processes
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            &ts as *const libc::timespec,
            std::ptr::null::<u32>(),
            0u32,
        )
    };
    !(rc == -1 && Errno::last() == Errno::ETIMEDOUT)
}

#[cfg(target_os = "linux")]
fn futex_wake(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            1,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn futex_wait(atomic: &AtomicU32, expected: u32, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while atomic.load(Ordering::Relaxed) == expected {
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::yield_now();
    }
    true
}

#[cfg(not(target_os = "linux"))]
fn futex_wake(_atomic: &AtomicU32) {}
