//! Error types for bus-publisher.
//!
//! [`Error`] separates the four ways a publish can go wrong: the env file,
//! the broker connection, the message encoding and the delivery itself.
//!
//! ```rust,no_run
//! use bus_publisher::{Error, JsonMessage, PublishOptions, Publisher};
//! use serde_json::json;
//!
//! let publisher = match Publisher::new(".env") {
//!     Ok(publisher) => publisher,
//!     Err(Error::ConfigLoad { path, source }) => {
//!         panic!("cannot read {:?}: {}", path, source)
//!     }
//!     Err(e) => panic!("{}", e),
//! };
//!
//! let message = JsonMessage::new("OrderPlaced", json!({"id": 42}));
//! match publisher.publish(&message, PublishOptions::new()) {
//!     Ok(()) => {}
//!     // Rejected by the broker; the connection is still usable.
//!     Err(Error::Delivery(reason)) => eprintln!("not delivered: {}", reason),
//!     Err(e) => eprintln!("publish failed: {}", e),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for bus-publisher operations.
///
/// Every failure surfaces to the caller unchanged; nothing in the crate
/// retries or swallows an error.
#[derive(Error, Debug)]
pub enum Error {
    /// The environment file is missing or malformed.
    #[error("Failed to load environment file {path:?}: {source}")]
    ConfigLoad {
        /// Path that was handed to the publisher
        path: PathBuf,
        /// Underlying parser or I/O failure
        #[source]
        source: dotenvy::Error,
    },

    /// The broker is unreachable, the DSN is unusable, or the handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The message could not be serialized.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The broker rejected the envelope or could not accept it.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// The blocking publisher could not start its runtime.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

/// A convenient Result type alias for bus-publisher operations.
///
/// This is equivalent to `std::result::Result<T, bus_publisher::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
