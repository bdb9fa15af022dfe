// SPDX-License-Identifier: Apache-2.0 OR MIT
// Status broadcast to admin and manufacturing pages

use std::borrow::Cow;
use std::sync::Arc;

use super::PrintfFlags;
use crate::connection::{ConnectionRef, ConnectionRegistry};

/// Message type the transport files status text under
pub const STATUS_MSG_TYPE: &str = "MSG";

/// Field carrying the status text
pub const STATUS_FIELD: &str = "status_msg_text";

/// Prefix telling the page to replace, not append to, its status text
pub const REPLACE_MARKER: char = '\u{0c}';

/// Pushes MESSAGE lines to every live status observer
#[derive(Clone)]
pub struct StatusBroadcaster {
    registry: Arc<dyn ConnectionRegistry>,
}

impl StatusBroadcaster {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Broadcast to the registry's current connections; returns deliveries
    pub fn broadcast(&self, flags: PrintfFlags, line: &str) -> usize {
        broadcast_to(flags, line, &self.registry.connections())
    }

    pub fn registry(&self) -> &Arc<dyn ConnectionRegistry> {
        &self.registry
    }
}

/// Payload for `line`, replace-marked under FORM_FEED
pub fn status_payload(flags: PrintfFlags, line: &str) -> Cow<'_, str> {
    if flags.contains(PrintfFlags::FORM_FEED) {
        Cow::Owned(format!("{}{}", REPLACE_MARKER, line))
    } else {
        Cow::Borrowed(line)
    }
}

/// Deliver `line` to each eligible connection, fire-and-forget.
///
/// Eligible means valid, admin or manufacturing, and holding a transport.
/// No eligible connection is not an error; the count is simply zero.
pub fn broadcast_to(flags: PrintfFlags, line: &str, connections: &[ConnectionRef]) -> usize {
    let payload = status_payload(flags, line);
    let mut delivered = 0;

    for conn in connections.iter().filter(|c| c.accepts_status()) {
        if let Some(transport) = &conn.transport {
            transport.send_encoded(STATUS_MSG_TYPE, STATUS_FIELD, &payload);
            delivered += 1;
        }
    }

    delivered
}
