//! Environment configuration for the publisher.
//!
//! Publishing defaults live in environment variables. They are read at
//! publish time, not at construction time, so a value changed between two
//! calls is picked up by the second one.
//!
//! # Example
//!
//! ```rust
//! use bus_publisher::config::PublishOptions;
//! use std::collections::HashMap;
//!
//! let mut env = HashMap::new();
//! env.insert("SENDER_DESTINATION_TOPIC".to_string(), "orders".to_string());
//!
//! let target = PublishOptions::new()
//!     .with_routing_key("created")
//!     .resolve(&env);
//!
//! assert_eq!(target.destination.topic, "orders");
//! assert_eq!(target.destination.routing_key, "created");
//! ```

use crate::envelope::Destination;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Default topic when none is passed to `publish`.
pub const DESTINATION_TOPIC_VAR: &str = "SENDER_DESTINATION_TOPIC";

/// Default routing key when none is passed to `publish`.
pub const DESTINATION_ROUTING_KEY_VAR: &str = "SENDER_DESTINATION_TOPIC_ROUTING_KEY";

/// Broker DSN, consumed only when the connection is established.
pub const TRANSPORT_DSN_VAR: &str = "TRANSPORT_CONNECTION_DSN";

/// Loads a key=value environment file into the process environment.
///
/// The whole file is parsed before anything is written, so a malformed
/// file leaves the environment untouched. Variables already present in the
/// environment keep their value.
///
/// # Errors
///
/// Returns [`Error::ConfigLoad`] if the file does not exist or a line
/// cannot be parsed.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = EnvFile::read(path)?;

    for (key, value) in &file.vars {
        if std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
        }
    }

    debug!("Loaded {} variables from {:?}", file.len(), path);
    Ok(())
}

/// Source of environment-style variables.
pub trait EnvSource: Send + Sync {
    /// Returns the value of `key`, or `None` when it is not set.
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: EnvSource + ?Sized> EnvSource for Arc<T> {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

/// An environment file parsed into memory.
///
/// Unlike [`load_env_file`] this never touches the process environment,
/// which makes it usable from tests and from several publishers with
/// different settings in one process.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    vars: HashMap<String, String>,
}

impl EnvFile {
    /// Parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigLoad`] if the file is missing or malformed.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let to_error = |source| Error::ConfigLoad {
            path: path.to_path_buf(),
            source,
        };

        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path).map_err(to_error)? {
            let (key, value) = item.map_err(to_error)?;
            vars.insert(key, value);
        }

        Ok(Self { vars })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvSource for EnvFile {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Per-call overrides for `publish`.
///
/// Every field left as `None` falls back to the environment (or, for the
/// trace id, to a freshly generated UUID) when the options are resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub trace_id: Option<String>,
    pub topic: Option<String>,
    pub routing_key: Option<String>,
}

/// Where and under which trace id a single message is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub trace_id: String,
    pub destination: Destination,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    /// Resolves the options against `env`.
    ///
    /// An unset topic or routing key resolves to an empty string.
    pub fn resolve<V: EnvSource + ?Sized>(&self, env: &V) -> ResolvedTarget {
        let topic = self
            .topic
            .clone()
            .or_else(|| env.var(DESTINATION_TOPIC_VAR))
            .unwrap_or_default();
        let routing_key = self
            .routing_key
            .clone()
            .or_else(|| env.var(DESTINATION_ROUTING_KEY_VAR))
            .unwrap_or_default();
        let trace_id = self
            .trace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        ResolvedTarget {
            trace_id,
            destination: Destination::new(topic, routing_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_with(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_explicit_options_win_over_env() {
        let env = env_with(&[
            (DESTINATION_TOPIC_VAR, "env-topic"),
            (DESTINATION_ROUTING_KEY_VAR, "env-key"),
        ]);

        let target = PublishOptions::new()
            .with_topic("orders")
            .with_routing_key("created")
            .with_trace_id("trace-1")
            .resolve(&env);

        assert_eq!(target.trace_id, "trace-1");
        assert_eq!(target.destination, Destination::new("orders", "created"));
    }

    #[test]
    fn test_missing_options_fall_back_to_env() {
        let env = env_with(&[
            (DESTINATION_TOPIC_VAR, "env-topic"),
            (DESTINATION_ROUTING_KEY_VAR, "env-key"),
        ]);

        let target = PublishOptions::new().resolve(&env);
        assert_eq!(target.destination, Destination::new("env-topic", "env-key"));
    }

    #[test]
    fn test_unset_destination_resolves_to_empty() {
        let target = PublishOptions::new().resolve(&HashMap::<String, String>::new());
        assert_eq!(target.destination, Destination::new("", ""));
    }

    #[test]
    fn test_explicit_empty_topic_is_kept() {
        let env = env_with(&[(DESTINATION_TOPIC_VAR, "env-topic")]);
        let target = PublishOptions::new().with_topic("").resolve(&env);
        assert_eq!(target.destination.topic, "");
    }

    #[test]
    fn test_generated_trace_ids_differ() {
        let env: HashMap<String, String> = HashMap::new();
        let options = PublishOptions::new();
        let first = options.resolve(&env).trace_id;
        let second = options.resolve(&env).trace_id;

        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_env_file_read() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# broker settings").unwrap();
        writeln!(file, "{}=amqp://test", TRANSPORT_DSN_VAR).unwrap();
        writeln!(file, "{}=\"orders\"", DESTINATION_TOPIC_VAR).unwrap();

        let env = EnvFile::read(file.path()).unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env.var(TRANSPORT_DSN_VAR).as_deref(), Some("amqp://test"));
        assert_eq!(env.var(DESTINATION_TOPIC_VAR).as_deref(), Some("orders"));
        assert_eq!(env.var(DESTINATION_ROUTING_KEY_VAR), None);
    }

    #[test]
    fn test_env_file_missing_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = EnvFile::read(dir.path().join("absent.env"));
        assert!(matches!(result, Err(Error::ConfigLoad { .. })));
    }

    #[test]
    fn test_env_file_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "NOT A VALID LINE").unwrap();

        let result = EnvFile::read(file.path());
        assert!(matches!(result, Err(Error::ConfigLoad { .. })));
    }

    #[test]
    fn test_load_env_file_populates_process_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "BUS_PUBLISHER_CONFIG_TEST_VAR=loaded").unwrap();

        load_env_file(file.path()).unwrap();
        assert_eq!(
            ProcessEnv.var("BUS_PUBLISHER_CONFIG_TEST_VAR").as_deref(),
            Some("loaded")
        );
    }

    #[test]
    fn test_load_env_file_keeps_existing_values() {
        std::env::set_var("BUS_PUBLISHER_CONFIG_PRESET_VAR", "from-process");
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "BUS_PUBLISHER_CONFIG_PRESET_VAR=from-file").unwrap();

        load_env_file(file.path()).unwrap();
        assert_eq!(
            ProcessEnv.var("BUS_PUBLISHER_CONFIG_PRESET_VAR").as_deref(),
            Some("from-process")
        );
    }

    #[test]
    fn test_load_env_file_malformed_writes_nothing() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "BUS_PUBLISHER_CONFIG_BEFORE_BAD_LINE=loaded").unwrap();
        writeln!(file, "NOT A VALID LINE").unwrap();

        let result = load_env_file(file.path());
        assert!(matches!(result, Err(Error::ConfigLoad { .. })));
        assert_eq!(ProcessEnv.var("BUS_PUBLISHER_CONFIG_BEFORE_BAD_LINE"), None);
    }

    #[test]
    fn test_load_env_file_missing_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = load_env_file(dir.path().join("absent.env"));
        assert!(matches!(result, Err(Error::ConfigLoad { .. })));
    }
}
