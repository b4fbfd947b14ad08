use anyhow::Context;
use bus_publisher::config::TRANSPORT_DSN_VAR;
use bus_publisher::transport::BrokerConnector;
use bus_publisher::{
    config, AsyncPublisher, JsonEncoder, JsonMessage, PublishOptions, Publisher,
    SerializationFormat,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "bus-publish")]
#[command(about = "Publish a single message to the service bus", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = ".env")]
    env: PathBuf,

    #[arg(short, long, help = "Value of the service-bus-message-type header")]
    message_type: String,

    #[arg(short, long, help = "JSON message body", conflicts_with = "payload_file")]
    payload: Option<String>,

    #[arg(long, value_name = "FILE", help = "Read the JSON message body from a file")]
    payload_file: Option<PathBuf>,

    #[arg(short, long, help = "Overrides SENDER_DESTINATION_TOPIC")]
    topic: Option<String>,

    #[arg(short, long, help = "Overrides SENDER_DESTINATION_TOPIC_ROUTING_KEY")]
    routing_key: Option<String>,

    #[arg(long, help = "Trace id; a UUID is generated when omitted")]
    trace_id: Option<String>,

    #[arg(long, help = "Encode the body as indented JSON")]
    pretty: bool,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose)?;

    info!("Loading environment from {:?}", args.env);
    config::load_env_file(&args.env).context("Failed to load environment file")?;

    let body = match (&args.payload, &args.payload_file) {
        (Some(payload), _) => payload.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file {:?}", path))?,
        (None, None) => "{}".to_string(),
    };
    let body = serde_json::from_str(&body).context("Payload is not valid JSON")?;
    let message = JsonMessage::new(args.message_type, body);

    let format = if args.pretty {
        SerializationFormat::Json
    } else {
        SerializationFormat::JsonCompact
    };
    let publisher = Publisher::from_async(AsyncPublisher::with_parts(
        BrokerConnector::new(),
        JsonEncoder::new(format),
        config::ProcessEnv,
    ))?;

    let options = PublishOptions {
        trace_id: args.trace_id,
        topic: args.topic,
        routing_key: args.routing_key,
    };

    if let Err(e) = publisher.publish(&message, options) {
        error!("Publish failed: {}", e);
        if std::env::var(TRANSPORT_DSN_VAR).is_err() {
            error!("{} is not set", TRANSPORT_DSN_VAR);
        }
        return Err(e.into());
    }

    Ok(())
}

/// Logs go to stderr. `RUST_LOG` sets the base filter; `--verbose` adds
/// debug output for this crate on top of it.
fn init_logging(json: bool, verbose: bool) -> anyhow::Result<()> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bus_publisher=info,warn"));
    if verbose {
        filter = filter
            .add_directive("bus_publisher=debug".parse()?)
            .add_directive("lapin=info".parse()?);
    }

    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let layer = if json {
        layer.json().with_current_span(true).with_span_list(false).boxed()
    } else {
        layer.with_target(verbose).without_time().boxed()
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
    Ok(())
}
