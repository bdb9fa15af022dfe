//! Logging Integration Module
//!
//! Helpers that wire the logging system into the owner process and its
//! workers. The owner carves and initializes the shared line store before
//! any worker exists; workers either inherit the mapping across `fork` or
//! attach to it by name.

use std::sync::Arc;
use std::time::Instant;

use crate::config::LogConfig;
use crate::error::StoreError;
use crate::logging::{LineStore, LoggerBuilder};

/// Logging system for the owner process
///
/// Holds the shared store. Each process, the owner and every forked worker,
/// builds its own [`Logger`](crate::logging::Logger) from it so that
/// continuation state stays per process.
pub struct OwnerLogging {
    config: LogConfig,
    store: Arc<LineStore>,
    started: Instant,
}

impl OwnerLogging {
    /// Store in an anonymous shared mapping, visible to workers forked later
    pub fn anonymous(config: LogConfig) -> Result<Self, StoreError> {
        let store = LineStore::create_anonymous(config.store_lines, config.line_len, config.eviction)?;
        Ok(Self::with_store(config, store))
    }

    /// Store in named shared memory so an admin viewer can attach.
    ///
    /// The name is removed when the owner drops it. A forked worker holding
    /// a copy of this value must leave without running destructors
    /// (`_exit`), or it would remove the name too.
    pub fn named(name: &str, config: LogConfig) -> Result<Self, StoreError> {
        let store =
            LineStore::create_named(name, config.store_lines, config.line_len, config.eviction)?;
        Ok(Self::with_store(config, store))
    }

    fn with_store(config: LogConfig, store: LineStore) -> Self {
        Self {
            config,
            started: store.started_at(),
            store: Arc::new(store),
        }
    }

    /// Builder preloaded with the config and the shared store.
    ///
    /// Uptime counts from the owner's start, also in forked workers.
    pub fn logger(&self) -> LoggerBuilder {
        LoggerBuilder::new(self.config.clone())
            .store(Arc::clone(&self.store))
            .started_at(self.started)
    }

    pub fn store(&self) -> &Arc<LineStore> {
        &self.store
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn started_at(&self) -> Instant {
        self.started
    }
}

/// Logging system for a worker that was not forked from the owner
///
/// Attaches to the owner's named store; geometry and eviction policy come
/// from the store header, not from the worker's config. Uptime counts from
/// the owner's start recorded there.
pub struct WorkerLogging {
    config: LogConfig,
    store: Arc<LineStore>,
    started: Instant,
}

impl WorkerLogging {
    pub fn attach(name: &str, config: LogConfig) -> Result<Self, StoreError> {
        let store = LineStore::attach(name)?;
        Ok(Self {
            config,
            started: store.started_at(),
            store: Arc::new(store),
        })
    }

    pub fn logger(&self) -> LoggerBuilder {
        LoggerBuilder::new(self.config.clone())
            .store(Arc::clone(&self.store))
            .started_at(self.started)
    }

    pub fn started_at(&self) -> Instant {
        self.started
    }

    pub fn store(&self) -> &Arc<LineStore> {
        &self.store
    }
}
