use crate::envelope::{OutboundEnvelope, TRACE_ID_HEADER};
use crate::transport::{redact_dsn, Transport};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, info, instrument};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Producer settings parsed from a `kafka://` DSN.
///
/// `kafka://broker1:9092,broker2:9092?acks=1&compression=lz4&linger_ms=5`
///
/// Query keys other than `acks`, `compression` and `linger_ms` are passed
/// to librdkafka unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSettings {
    pub brokers: Vec<String>,
    pub acks: String,
    pub compression: String,
    pub linger_ms: u32,
    pub extra: Vec<(String, String)>,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            acks: default_acks(),
            compression: default_compression(),
            linger_ms: default_linger_ms(),
            extra: Vec::new(),
        }
    }
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_compression() -> String {
    "none".to_string()
}

fn default_linger_ms() -> u32 {
    0
}

impl KafkaSettings {
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let rest = dsn
            .split_once("://")
            .map(|(_, rest)| rest)
            .ok_or_else(|| {
                Error::Connection(format!("Invalid Kafka DSN '{}'", redact_dsn(dsn)))
            })?;
        let (hosts, query) = rest.split_once('?').unwrap_or((rest, ""));

        let brokers: Vec<String> = hosts
            .trim_end_matches('/')
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect();
        if brokers.is_empty() {
            return Err(Error::Connection(format!(
                "Kafka DSN '{}' names no brokers",
                redact_dsn(dsn)
            )));
        }

        let mut settings = Self {
            brokers,
            ..Self::default()
        };

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::Connection(format!("Invalid Kafka DSN parameter '{}'", pair))
            })?;
            match key {
                "acks" => settings.acks = value.to_string(),
                "compression" => settings.compression = value.to_string(),
                "linger_ms" => {
                    settings.linger_ms = value.parse().map_err(|_| {
                        Error::Connection(format!("Invalid linger_ms '{}'", value))
                    })?
                }
                _ => settings.extra.push((key.to_string(), value.to_string())),
            }
        }

        Ok(settings)
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.brokers.join(","))
            .set("acks", &self.acks)
            .set("compression.type", &self.compression)
            .set("linger.ms", self.linger_ms.to_string());
        for (key, value) in &self.extra {
            config.set(key, value);
        }
        config
    }
}

/// Kafka transport.
///
/// The envelope topic is the Kafka topic and the routing key becomes the
/// record key, so messages sharing a routing key land on one partition.
pub struct KafkaTransport {
    producer: FutureProducer,
}

impl KafkaTransport {
    /// Creates a producer and checks that the cluster answers a metadata
    /// request.
    #[instrument(skip(dsn))]
    pub async fn connect(dsn: &str) -> Result<Self> {
        let settings = KafkaSettings::from_dsn(dsn)?;
        info!(brokers = ?settings.brokers, "Connecting to Kafka");

        let producer: FutureProducer = settings
            .client_config()
            .create()
            .map_err(|e| Error::Connection(format!("Kafka producer creation failed: {}", e)))?;

        let metadata_producer = producer.clone();
        tokio::task::spawn_blocking(move || {
            metadata_producer
                .client()
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|_| ())
        })
        .await
        .map_err(|e| Error::Connection(format!("Kafka metadata task failed: {}", e)))?
        .map_err(|e| Error::Connection(format!("Kafka cluster unreachable: {}", e)))?;

        info!("Connected to Kafka");
        Ok(Self { producer })
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    #[instrument(skip_all, fields(trace_id = %envelope.trace_id, destination = %envelope.destination))]
    async fn send(&self, envelope: &OutboundEnvelope) -> Result<()> {
        let mut headers = OwnedHeaders::new();
        for (key, value) in &envelope.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            });
        }
        headers = headers.insert(Header {
            key: TRACE_ID_HEADER,
            value: Some(envelope.trace_id.as_str()),
        });

        let record = FutureRecord::to(&envelope.destination.topic)
            .payload(&envelope.payload[..])
            .key(envelope.destination.routing_key.as_str())
            .headers(headers)
            .timestamp(envelope.created_at.timestamp_millis());

        let (partition, offset) = self
            .producer
            .send(record, Timeout::Never)
            .await
            .map_err(|(e, _)| Error::Delivery(format!("Kafka delivery failed: {}", e)))?;

        debug!(partition, offset, "Message acknowledged by Kafka");
        Ok(())
    }
}
