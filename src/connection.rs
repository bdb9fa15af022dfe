// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Connection records supplied by the transport layer.
//!
//! The logger never owns connections. It reads the registry to decide which
//! observers receive status broadcasts and to annotate lines that were logged
//! on behalf of a particular connection.

use std::sync::{Arc, RwLock};

/// Stream type of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnKind {
    /// Administrative page
    Admin,
    /// Manufacturing/test page
    Manufacturing,
    Waterfall,
    Sound,
    /// Extension bound to a receiver channel
    Extension,
    Other,
}

impl ConnKind {
    /// Observers that receive status broadcasts
    pub const fn is_status_observer(self) -> bool {
        matches!(self, ConnKind::Admin | ConnKind::Manufacturing)
    }

    /// Streams that are tied to a receiver channel
    pub const fn is_channel_stream(self) -> bool {
        matches!(
            self,
            ConnKind::Waterfall | ConnKind::Sound | ConnKind::Extension
        )
    }
}

/// Wire side of a connection. Framing and encoding belong to the transport.
pub trait Transport: Send + Sync {
    /// Queue an encoded message: `msg_type` selects the channel of the
    /// protocol, `field` the named value, `payload` the text.
    fn send_encoded(&self, msg_type: &str, field: &str, payload: &str);
}

/// Borrowed view of one entry in the connection registry
#[derive(Clone)]
pub struct ConnectionRef {
    pub valid: bool,
    pub kind: ConnKind,
    pub transport: Option<Arc<dyn Transport>>,
    /// Receiver channel the connection is bound to, if any
    pub rx_channel: Option<usize>,
    /// Position in the registry
    pub index: usize,
}

impl ConnectionRef {
    pub fn new(index: usize, kind: ConnKind) -> Self {
        Self {
            valid: true,
            kind,
            transport: None,
            rx_channel: None,
            index,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn on_channel(mut self, chan: usize) -> Self {
        self.rx_channel = Some(chan);
        self
    }

    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Channel to highlight in the line prefix. Only channel streams have one.
    pub fn highlight_channel(&self) -> Option<usize> {
        if self.kind.is_channel_stream() {
            self.rx_channel
        } else {
            None
        }
    }

    /// Eligible for status broadcasts: live admin or manufacturing page with a transport
    pub fn accepts_status(&self) -> bool {
        self.valid && self.kind.is_status_observer() && self.transport.is_some()
    }
}

impl std::fmt::Debug for ConnectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRef")
            .field("index", &self.index)
            .field("valid", &self.valid)
            .field("kind", &self.kind)
            .field("transport", &self.transport.is_some())
            .field("rx_channel", &self.rx_channel)
            .finish()
    }
}

/// Source of the active connection set
pub trait ConnectionRegistry: Send + Sync {
    fn connections(&self) -> Vec<ConnectionRef>;

    /// Connection currently bound to a receiver channel
    fn for_channel(&self, chan: usize) -> Option<ConnectionRef> {
        self.connections()
            .into_iter()
            .find(|c| c.valid && c.highlight_channel() == Some(chan))
    }
}

/// Registry for processes that have no connections (workers, tools)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoConnections;

impl ConnectionRegistry for NoConnections {
    fn connections(&self) -> Vec<ConnectionRef> {
        Vec::new()
    }
}

/// In-process registry maintained by the connection layer
#[derive(Default)]
pub struct ConnectionTable {
    conns: RwLock<Vec<ConnectionRef>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry at `conn.index`
    pub fn upsert(&self, conn: ConnectionRef) {
        let mut conns = self.conns.write().unwrap_or_else(|e| e.into_inner());
        match conns.iter_mut().find(|c| c.index == conn.index) {
            Some(existing) => *existing = conn,
            None => conns.push(conn),
        }
    }

    pub fn remove(&self, index: usize) {
        let mut conns = self.conns.write().unwrap_or_else(|e| e.into_inner());
        conns.retain(|c| c.index != index);
    }

    pub fn len(&self) -> usize {
        self.conns.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConnectionRegistry for ConnectionTable {
    fn connections(&self) -> Vec<ConnectionRef> {
        self.conns.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTransport;

    impl Transport for NullTransport {
        fn send_encoded(&self, _msg_type: &str, _field: &str, _payload: &str) {}
    }

    #[test]
    fn test_accepts_status() {
        let t: Arc<dyn Transport> = Arc::new(NullTransport);

        assert!(ConnectionRef::new(0, ConnKind::Admin)
            .with_transport(Arc::clone(&t))
            .accepts_status());
        assert!(ConnectionRef::new(1, ConnKind::Manufacturing)
            .with_transport(Arc::clone(&t))
            .accepts_status());

        // no transport
        assert!(!ConnectionRef::new(2, ConnKind::Admin).accepts_status());
        // wrong kind
        assert!(!ConnectionRef::new(3, ConnKind::Sound)
            .with_transport(Arc::clone(&t))
            .accepts_status());
        // stale
        assert!(!ConnectionRef::new(4, ConnKind::Admin)
            .with_transport(t)
            .invalidated()
            .accepts_status());
    }

    #[test]
    fn test_highlight_channel() {
        assert_eq!(
            ConnectionRef::new(0, ConnKind::Sound)
                .on_channel(2)
                .highlight_channel(),
            Some(2)
        );
        // admin connections are never channel-bound
        assert_eq!(
            ConnectionRef::new(0, ConnKind::Admin)
                .on_channel(2)
                .highlight_channel(),
            None
        );
    }

    #[test]
    fn test_table_lookup_by_channel() {
        let table = ConnectionTable::new();
        table.upsert(ConnectionRef::new(0, ConnKind::Admin));
        table.upsert(ConnectionRef::new(1, ConnKind::Waterfall).on_channel(3));
        table.upsert(ConnectionRef::new(2, ConnKind::Sound).on_channel(1));
        assert_eq!(table.len(), 3);

        assert_eq!(table.for_channel(1).map(|c| c.index), Some(2));
        assert_eq!(table.for_channel(3).map(|c| c.index), Some(1));
        assert!(table.for_channel(0).is_none());

        table.remove(2);
        assert!(table.for_channel(1).is_none());
    }

    #[test]
    fn test_table_upsert_replaces() {
        let table = ConnectionTable::new();
        table.upsert(ConnectionRef::new(5, ConnKind::Admin));
        table.upsert(ConnectionRef::new(5, ConnKind::Admin).invalidated());
        let conns = table.connections();
        assert_eq!(conns.len(), 1);
        assert!(!conns[0].valid);
    }
}
