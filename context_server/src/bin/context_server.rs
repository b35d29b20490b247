//! Context server binary.
//!
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use context_server::{
    aggregator::{AggregationMode, AggregatorSettings},
    clock::MonotonicClock,
    data_socket::spawn_data_socket,
    endpoints::serve,
    meter::spawn_meter_logger,
    registry::ContextRegistry,
    WINDOW_MS,
};
use env_logger::TimestampPrecision;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the HTTP endpoints on
    #[clap(long, default_value = "127.0.0.1:3000")]
    server_address: String,

    /// Address of the socket receiving classification samples
    #[clap(long, default_value = "127.0.0.1:3001")]
    socket_address: String,

    /// Length of the trailing vote window in milliseconds
    #[clap(long, default_value_t = WINDOW_MS)]
    window_ms: u64,

    /// Weight every sample with its confidence instead of counting it once
    #[clap(long)]
    weighted: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let settings = AggregatorSettings {
        window_ms: args.window_ms,
        mode: match args.weighted {
            true => AggregationMode::ConfidenceWeighted,
            false => AggregationMode::Count,
        },
    };
    log::info!("Aggregating with {:?}", settings);

    let registry = Arc::new(ContextRegistry::new(
        settings,
        Arc::new(MonotonicClock::new()),
    ));

    // Create socket to receive classification samples via network
    let (_, ingestion) = spawn_data_socket(Arc::clone(&registry), &args.socket_address).await?;

    spawn_meter_logger(Duration::from_millis(args.window_ms.max(1_000)));

    // Serve HTTP server until it or the data socket fails
    let addr: SocketAddr = args.server_address.parse()?;
    serve(registry, addr, ingestion).await
}
