// SPDX-License-Identifier: Apache-2.0 OR MIT
// Shared memory regions backing the line store

use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, mmap_anonymous, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use std::ffi::c_void;
use std::fs::File;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use crate::error::StoreError;

/// A read/write `MAP_SHARED` mapping
///
/// Anonymous regions are shared with children created by `fork` after the
/// mapping exists. Named regions live in the POSIX shm namespace so that
/// unrelated processes (e.g. an admin viewer) can attach by name.
pub struct SharedRegion {
    name: Option<String>,
    _file: Option<File>, // keeps the shm fd open for the mapping's lifetime
    addr: NonNull<c_void>,
    len: usize,
    is_owner: bool,
}

// SAFETY: the region is plain memory; all cross-process access to the store
// header goes through the futex lock placed inside it.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

fn non_zero(len: usize) -> Result<NonZeroUsize, StoreError> {
    NonZeroUsize::new(len).ok_or_else(|| StoreError::Geometry("empty shared region".to_string()))
}

impl SharedRegion {
    /// Zero-filled anonymous shared mapping, inherited across fork
    pub fn anonymous(len: usize) -> Result<Self, StoreError> {
        let size = non_zero(len)?;
        let addr = unsafe {
            mmap_anonymous(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(StoreError::os("mmap"))?;

        Ok(Self {
            name: None,
            _file: None,
            addr,
            len,
            is_owner: true,
        })
    }

    /// Create a named region (owner side). A stale object of the same name is replaced.
    pub fn create(name: &str, len: usize) -> Result<Self, StoreError> {
        let size = non_zero(len)?;

        // left over from a crashed instance; ENOENT is the normal case
        let _ = shm_unlink(name);

        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(StoreError::os("shm_open"))?;
        ftruncate(&fd, len as i64).map_err(StoreError::os("ftruncate"))?;

        let file = File::from(fd);
        let addr = unsafe {
            mmap(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .map_err(StoreError::os("mmap"))?;

        Ok(Self {
            name: Some(name.to_string()),
            _file: Some(file),
            addr,
            len,
            is_owner: true,
        })
    }

    /// Attach to a named region created by another process
    pub fn attach(name: &str) -> Result<Self, StoreError> {
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(StoreError::os("shm_open"))?;
        let file = File::from(fd);
        let len = file.metadata().map_err(StoreError::io("fstat"))?.len() as usize;
        let size = non_zero(len)?;

        let addr = unsafe {
            mmap(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .map_err(StoreError::os("mmap"))?;

        Ok(Self {
            name: Some(name.to_string()),
            _file: Some(file),
            addr,
            len,
            is_owner: false,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr() as *mut u8
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.addr, self.len);
        }
        // only the creator removes the name; attached processes just unmap
        if self.is_owner {
            if let Some(name) = &self.name {
                let _ = shm_unlink(name.as_str());
            }
        }
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("is_owner", &self.is_owner)
            .finish()
    }
}
