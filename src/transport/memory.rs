use crate::envelope::OutboundEnvelope;
use crate::transport::{Connector, Transport};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// In-process connector that records instead of delivering.
///
/// Useful for dry runs (`memory://` DSNs) and for tests. Clones share the
/// same recorder, as do all transports created from it.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    connects: AtomicUsize,
    dsns: Mutex<Vec<String>>,
    sent: Mutex<Vec<OutboundEnvelope>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// DSNs passed to `connect`, in call order.
    pub fn dsns(&self) -> Vec<String> {
        lock(&self.state.dsns).clone()
    }

    /// Envelopes sent through any transport created by this connector.
    pub fn sent(&self) -> Vec<OutboundEnvelope> {
        lock(&self.state.sent).clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn connect(&self, dsn: &str) -> Result<MemoryTransport> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.dsns).push(dsn.to_string());

        Ok(MemoryTransport {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<MemoryState>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, envelope: &OutboundEnvelope) -> Result<()> {
        info!(
            trace_id = %envelope.trace_id,
            destination = %envelope.destination,
            headers = ?envelope.headers,
            payload = %String::from_utf8_lossy(&envelope.payload),
            "Message recorded by in-memory transport"
        );
        lock(&self.state.sent).push(envelope.clone());
        Ok(())
    }
}
