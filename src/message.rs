//! Messages that can be published to the bus.

use serde::{Serialize, Serializer};
use serde_json::Value;

/// A serializable message with a logical type name.
///
/// The type name ends up in the `service-bus-message-type` header so
/// consumers can pick a decoder. By default it is the fully-qualified Rust
/// type name; override [`message_type`](BusMessage::message_type) to publish
/// under a stable contract name instead.
///
/// ```rust
/// use bus_publisher::BusMessage;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct OrderPlaced {
///     id: u64,
/// }
///
/// impl BusMessage for OrderPlaced {
///     fn message_type(&self) -> String {
///         "OrderPlaced".to_string()
///     }
/// }
///
/// assert_eq!(OrderPlaced { id: 42 }.message_type(), "OrderPlaced");
/// ```
pub trait BusMessage: Serialize {
    fn message_type(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// A message built at runtime from a type name and a JSON body.
///
/// Serializes as its body alone; the type name only travels in the headers.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonMessage {
    message_type: String,
    body: Value,
}

impl JsonMessage {
    pub fn new(message_type: impl Into<String>, body: Value) -> Self {
        Self {
            message_type: message_type.into(),
            body,
        }
    }
}

impl Serialize for JsonMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

impl BusMessage for JsonMessage {
    fn message_type(&self) -> String {
        self.message_type.clone()
    }
}

impl BusMessage for Value {}
