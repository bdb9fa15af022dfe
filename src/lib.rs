// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Diagnostic logging for a server that forks worker processes.
//!
//! Lines are built by a per-process [`Logger`], prefixed with uptime and the
//! receiver channels' busy state, and fanned out to the console, the system
//! logger, a [`LineStore`] shared by the owner and its workers, and the admin
//! pages' status text. Fatal conditions go through the [`CrashReporter`],
//! which reports a backtrace before terminating.

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;

pub use channel::{ChannelStatus, ChannelVector};
pub use config::{ConfigError, LogConfig};
pub use connection::{ConnKind, ConnectionRef, ConnectionRegistry, ConnectionTable, Transport};
pub use error::StoreError;
pub use logging::{
    CrashReporter, Eviction, LineStore, Logger, LoggerBuilder, OwnerLogging, PrintfFlags,
    StoreSnapshot, WorkerLogging,
};
