//! The outbound envelope handed to a transport.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Header naming the logical type of the payload.
pub const MESSAGE_TYPE_HEADER: &str = "service-bus-message-type";

/// Header carrying the trace id on transports without a native field for it.
pub const TRACE_ID_HEADER: &str = "service-bus-trace-id";

/// The (topic, routing key) pair a message is routed by.
///
/// For AMQP the topic is the exchange; for Kafka the routing key becomes
/// the record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub topic: String,
    pub routing_key: String,
}

impl Destination {
    pub fn new(topic: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            routing_key: routing_key.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.routing_key)
    }
}

/// A single message ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEnvelope {
    /// Correlates the message across systems
    pub trace_id: String,
    /// Encoded message body
    pub payload: Bytes,
    /// Transport headers; always contains [`MESSAGE_TYPE_HEADER`]
    pub headers: BTreeMap<String, String>,
    pub destination: Destination,
    /// MIME type reported by the encoder
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl OutboundEnvelope {
    pub fn new(
        trace_id: impl Into<String>,
        payload: impl Into<Bytes>,
        message_type: impl Into<String>,
        destination: Destination,
    ) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(MESSAGE_TYPE_HEADER.to_string(), message_type.into());

        Self {
            trace_id: trace_id.into(),
            payload: payload.into(),
            headers,
            destination,
            content_type: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn message_type(&self) -> Option<&str> {
        self.headers.get(MESSAGE_TYPE_HEADER).map(String::as_str)
    }
}
