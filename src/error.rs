// SPDX-License-Identifier: Apache-2.0 OR MIT
// Errors raised by the shared line store and its memory region

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("line store appended to before the owner initialized it")]
    Uninitialized,

    #[error("invalid store geometry: {0}")]
    Geometry(String),

    #[error("shared region holds {actual} bytes, store needs {needed}")]
    RegionTooSmall { needed: usize, actual: usize },

    #[error("shared region is not a line store (magic {0:#010x})")]
    BadMagic(u32),

    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn os(op: &'static str) -> impl FnOnce(nix::Error) -> Self {
        move |source| StoreError::Os { op, source }
    }

    pub(crate) fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| StoreError::Io { op, source }
    }
}
