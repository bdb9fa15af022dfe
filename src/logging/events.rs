// SPDX-License-Identifier: Apache-2.0 OR MIT
// Structured diagnostic event markers

use std::sync::{Arc, Mutex};

/// Receives event markers alongside log output (e.g. a timing tracer)
pub trait EventSink: Send + Sync {
    fn event(&self, kind: &str, detail: &str);
}

/// Keeps every marker in memory
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(String, String)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl EventSink for EventLog {
    fn event(&self, kind: &str, detail: &str) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((kind.to_string(), detail.to_string()));
    }
}
