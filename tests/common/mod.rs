#![allow(dead_code)]

use async_trait::async_trait;
use bus_publisher::config::EnvSource;
use bus_publisher::transport::{Connector, Transport};
use bus_publisher::{Error, OutboundEnvelope, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Environment that tests can change after the publisher was built.
#[derive(Clone, Default)]
pub struct SharedEnv {
    vars: Arc<RwLock<HashMap<String, String>>>,
}

impl SharedEnv {
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        let env = Self::default();
        for (key, value) in pairs {
            env.set(key, value);
        }
        env
    }

    pub fn set(&self, key: &str, value: &str) {
        self.vars
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

impl EnvSource for SharedEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.read().unwrap().get(key).cloned()
    }
}

/// Connector whose connect and send outcomes are scripted by the test.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<ScriptState>,
}

#[derive(Default)]
struct ScriptState {
    connect_calls: AtomicUsize,
    send_calls: AtomicUsize,
    failing_connects: AtomicUsize,
    reject_sends: AtomicUsize,
    dsns: Mutex<Vec<String>>,
    sent: Mutex<Vec<OutboundEnvelope>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.failing_connects.store(n, Ordering::SeqCst);
    }

    /// The next `n` sends are rejected by the "broker".
    pub fn reject_next_sends(&self, n: usize) {
        self.state.reject_sends.store(n, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.state.send_calls.load(Ordering::SeqCst)
    }

    pub fn dsns(&self) -> Vec<String> {
        self.state.dsns.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<OutboundEnvelope> {
        self.state.sent.lock().unwrap().clone()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, dsn: &str) -> Result<ScriptedTransport> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.dsns.lock().unwrap().push(dsn.to_string());

        // Widen the window in which concurrent publishers could race.
        tokio::task::yield_now().await;

        if take_one(&self.state.failing_connects) {
            return Err(Error::Connection(format!("cannot reach {}", dsn)));
        }

        Ok(ScriptedTransport {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct ScriptedTransport {
    state: Arc<ScriptState>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, envelope: &OutboundEnvelope) -> Result<()> {
        self.state.send_calls.fetch_add(1, Ordering::SeqCst);

        if take_one(&self.state.reject_sends) {
            return Err(Error::Delivery("message rejected".to_string()));
        }

        self.state.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}
