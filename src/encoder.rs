//! Message encoders.

use crate::Result;
use serde::Serialize;

/// Turns a message into the bytes placed in the envelope payload.
pub trait MessageEncoder: Send + Sync {
    /// Serializes `message`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`](crate::Error::Encoding) if the message
    /// cannot be represented in the encoder's format.
    fn encode<M: Serialize + ?Sized>(&self, message: &M) -> Result<Vec<u8>>;

    /// MIME type of the produced payload.
    fn content_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    /// Single-line JSON
    #[default]
    JsonCompact,
    /// Indented JSON, easier to read in a broker UI
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder {
    format: SerializationFormat,
}

impl JsonEncoder {
    pub fn new(format: SerializationFormat) -> Self {
        Self { format }
    }
}

impl MessageEncoder for JsonEncoder {
    fn encode<M: Serialize + ?Sized>(&self, message: &M) -> Result<Vec<u8>> {
        let bytes = match self.format {
            SerializationFormat::JsonCompact => serde_json::to_vec(message)?,
            SerializationFormat::Json => serde_json::to_vec_pretty(message)?,
        };
        Ok(bytes)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}
