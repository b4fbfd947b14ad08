//! Publishing messages to the bus.
//!
//! [`AsyncPublisher`] is the async core; [`Publisher`] wraps it for
//! callers that want `publish` to block until the broker has accepted the
//! message.
//!
//! # Example
//!
//! ```rust,no_run
//! use bus_publisher::{JsonMessage, PublishOptions, Publisher};
//! use serde_json::json;
//!
//! fn main() -> bus_publisher::Result<()> {
//!     let publisher = Publisher::new(".env")?;
//!
//!     let message = JsonMessage::new("OrderPlaced", json!({"id": 42}));
//!     publisher.publish(
//!         &message,
//!         PublishOptions::new().with_topic("orders").with_routing_key("created"),
//!     )?;
//!
//!     Ok(())
//! }
//! ```

use crate::config::{self, EnvSource, ProcessEnv, PublishOptions, TRANSPORT_DSN_VAR};
use crate::encoder::{JsonEncoder, MessageEncoder};
use crate::envelope::OutboundEnvelope;
use crate::message::BusMessage;
use crate::transport::{BrokerConnector, Connector, Transport};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

enum ConnectionState<T> {
    Unconnected,
    Connected(Arc<T>),
}

/// Async publisher holding one lazily established broker connection.
///
/// The connection is created by the first `publish` and reused by every
/// later call. It is never replaced or health-checked; a failed connect
/// leaves the publisher unconnected so the next call starts over.
pub struct AsyncPublisher<C: Connector = BrokerConnector, E = JsonEncoder, V = ProcessEnv> {
    connector: C,
    encoder: E,
    env: V,
    state: Mutex<ConnectionState<C::Transport>>,
}

impl AsyncPublisher {
    /// Loads the env file at `env_path` into the process environment and
    /// creates a publisher with the default connector and JSON encoder.
    ///
    /// No connection is made until the first `publish`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigLoad`](crate::Error::ConfigLoad) if the file
    /// is missing or malformed.
    pub fn new(env_path: impl AsRef<Path>) -> Result<Self> {
        config::load_env_file(env_path)?;
        Ok(Self::with_parts(
            BrokerConnector::new(),
            JsonEncoder::default(),
            ProcessEnv,
        ))
    }
}

impl<C, E, V> AsyncPublisher<C, E, V>
where
    C: Connector,
    E: MessageEncoder,
    V: EnvSource,
{
    pub fn with_parts(connector: C, encoder: E, env: V) -> Self {
        Self {
            connector,
            encoder,
            env,
            state: Mutex::new(ConnectionState::Unconnected),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Connected(_))
    }

    /// Sends one message and waits for the broker to accept it.
    ///
    /// Destination and trace id come from `options`, falling back to the
    /// environment and to a fresh UUID respectively.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`](crate::Error::Connection) if the broker
    ///   cannot be reached
    /// - [`Error::Encoding`](crate::Error::Encoding) if the message cannot
    ///   be serialized; nothing is sent in that case
    /// - [`Error::Delivery`](crate::Error::Delivery) if the broker does not
    ///   accept the envelope
    #[instrument(skip_all, fields(message_type = tracing::field::Empty))]
    pub async fn publish<M>(&self, message: &M, options: PublishOptions) -> Result<()>
    where
        M: BusMessage + ?Sized,
    {
        let message_type = message.message_type();
        tracing::Span::current().record("message_type", message_type.as_str());

        let target = options.resolve(&self.env);
        let transport = self.ensure_connection().await?;

        let payload = self.encoder.encode(message)?;
        let envelope = OutboundEnvelope::new(
            target.trace_id,
            payload,
            message_type,
            target.destination,
        )
        .with_content_type(self.encoder.content_type());

        transport.send(&envelope).await?;

        info!(
            trace_id = %envelope.trace_id,
            destination = %envelope.destination,
            "Message published"
        );
        Ok(())
    }

    async fn ensure_connection(&self) -> Result<Arc<C::Transport>> {
        let mut state = self.state.lock().await;

        if let ConnectionState::Connected(transport) = &*state {
            return Ok(Arc::clone(transport));
        }

        let dsn = self.env.var(TRANSPORT_DSN_VAR).unwrap_or_default();
        debug!("No broker connection yet, connecting");

        let transport = Arc::new(self.connector.connect(&dsn).await?);
        *state = ConnectionState::Connected(Arc::clone(&transport));

        info!("Broker connection established");
        Ok(transport)
    }
}

/// Blocking publisher.
///
/// Drives an [`AsyncPublisher`] on its own single-threaded runtime, so
/// `publish` returns only once the broker has accepted the message. Must
/// not be used from inside another tokio runtime.
pub struct Publisher<C: Connector = BrokerConnector, E = JsonEncoder, V = ProcessEnv> {
    runtime: Runtime,
    inner: AsyncPublisher<C, E, V>,
}

impl Publisher {
    /// Loads the env file at `env_path` and creates a publisher with the
    /// default connector and JSON encoder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigLoad`](crate::Error::ConfigLoad) for a bad
    /// env file and [`Error::Runtime`](crate::Error::Runtime) if the
    /// runtime cannot be started.
    pub fn new(env_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_async(AsyncPublisher::new(env_path)?)
    }
}

impl<C, E, V> Publisher<C, E, V>
where
    C: Connector,
    E: MessageEncoder,
    V: EnvSource,
{
    pub fn from_async(inner: AsyncPublisher<C, E, V>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime, inner })
    }

    pub fn connector(&self) -> &C {
        self.inner.connector()
    }

    pub fn is_connected(&self) -> bool {
        self.runtime.block_on(self.inner.is_connected())
    }

    /// Blocking form of [`AsyncPublisher::publish`].
    pub fn publish<M>(&self, message: &M, options: PublishOptions) -> Result<()>
    where
        M: BusMessage + ?Sized,
    {
        self.runtime.block_on(self.inner.publish(message, options))
    }
}
