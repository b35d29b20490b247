use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use common::protocol::{ProtoMsg, SampleMsg};
use env_logger::TimestampPrecision;
use futures::sink::SinkExt;
use sample_sender::{replay::ReplayClassifier, sampler::spawn_sampler, SAMPLE_INTERVAL_MS};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address of the context server's data socket
    #[clap(long, default_value = "127.0.0.1:3001")]
    address: String,

    /// Channel name that this sender publishes to
    #[clap(long, default_value = "default")]
    channel: String,

    /// Script of `<label> <confidence>` lines to replay
    #[clap(long)]
    script: PathBuf,

    /// Milliseconds between two classifications
    #[clap(long, default_value_t = SAMPLE_INTERVAL_MS)]
    interval_ms: u64,

    /// Start the script over once it is exhausted
    #[clap(long)]
    repeat: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    log::info!("Launching sample sender for channel {}", &args.channel);

    let classifier = ReplayClassifier::from_path(&args.script, args.repeat)?;

    let stream = TcpStream::connect(&args.address).await?;
    log::info!("Connected to {}", &args.address);

    // Wrap stream in transport handler with length-delimited codec
    let mut transport = Framed::new(stream, LengthDelimitedCodec::new());

    // Send init message
    let init_msg = bytes::Bytes::from(ProtoMsg::ConnectReq(args.channel.clone()).serialize()?);
    transport.send(init_msg).await?;

    let (tx, mut rx) = mpsc::channel(4);
    let sampler = spawn_sampler(classifier, Duration::from_millis(args.interval_ms), tx);

    // Forward classifications until the sampler stops
    while let Some(classification) = rx.recv().await {
        let data = ProtoMsg::Sample(SampleMsg::new(
            args.channel.clone(),
            classification.label,
            classification.confidence,
        ));
        let data = bytes::Bytes::from(data.serialize()?);
        transport.send(data).await?;
    }

    sampler.await?;
    log::info!("Replay finished");

    Ok(())
}
