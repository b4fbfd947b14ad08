pub mod config;
pub mod encoder;
pub mod envelope;
pub mod error;
pub mod message;
pub mod publisher;
pub mod transport;

pub use config::PublishOptions;
pub use encoder::{JsonEncoder, MessageEncoder, SerializationFormat};
pub use envelope::{Destination, OutboundEnvelope};
pub use error::{Error, Result};
pub use message::{BusMessage, JsonMessage};
pub use publisher::{AsyncPublisher, Publisher};
