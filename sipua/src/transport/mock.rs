//! A socket that records what it sends, for tests.

use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::Result;
use crate::message::TransportKind;
use crate::transport::{Socket, SocketTx};

pub(crate) struct MockSocket {
    kind: TransportKind,
    sent: Mutex<Vec<Bytes>>,
}

impl MockSocket {
    pub fn new() -> Arc<Self> {
        Arc::new(MockSocket {
            kind: TransportKind::Ws,
            sent: Mutex::new(Vec::new()),
        })
    }

    /// A mock that reports itself unreliable, for retransmission timers.
    pub fn unreliable() -> Arc<Self> {
        Arc::new(MockSocket {
            kind: TransportKind::Udp,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("Lock failed").len()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().expect("Lock failed").clone()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.sent
            .lock()
            .expect("Lock failed")
            .last()
            .map(|buf| String::from_utf8_lossy(buf).into_owned())
    }
}

#[async_trait::async_trait]
impl Socket for MockSocket {
    async fn connect(&self, _events: SocketTx) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        self.sent.lock().expect("Lock failed").push(Bytes::copy_from_slice(buf));
        Ok(buf.len())
    }

    fn tp_kind(&self) -> TransportKind {
        self.kind
    }

    fn peer_name(&self) -> &str {
        "mock"
    }
}
