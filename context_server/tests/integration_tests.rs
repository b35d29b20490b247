use std::{net::SocketAddr, sync::Arc, time::Duration};

use common::protocol::{ProtoMsg, SampleMsg};
use context_server::{
    aggregator::AggregatorSettings,
    clock::{ManualClock, MonotonicClock},
    data_socket::spawn_data_socket,
    endpoints::{app, serve},
    registry::{ContextReceiver, ContextRegistry},
};
use futures::SinkExt;
use tokio::{net::TcpStream, time::timeout};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

type Error = Box<dyn std::error::Error>;

async fn send(
    transport: &mut Framed<TcpStream, LengthDelimitedCodec>,
    msg: ProtoMsg,
) -> Result<(), Error> {
    transport.send(bytes::Bytes::from(msg.serialize()?)).await?;
    Ok(())
}

async fn wait_for(rx: &mut ContextReceiver, expected: &str) -> Result<(), Error> {
    timeout(Duration::from_secs(5), async {
        loop {
            if *rx.borrow_and_update() == expected {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await?;
    assert_eq!(*rx.borrow(), expected);
    Ok(())
}

async fn serve_http(registry: Arc<ContextRegistry>) -> Result<SocketAddr, Error> {
    let addr: SocketAddr = "127.0.0.1:0".parse()?;
    let server = axum::Server::bind(&addr).serve(app(registry).into_make_service());
    let local_addr = server.local_addr();
    tokio::spawn(server);
    Ok(local_addr)
}

#[tokio::test]
async fn test_samples_over_socket() -> Result<(), Error> {
    let clock = Arc::new(ManualClock::new(0));
    let registry = Arc::new(ContextRegistry::new(
        AggregatorSettings::default(),
        clock.clone(),
    ));
    let (addr, _handle) = spawn_data_socket(Arc::clone(&registry), "127.0.0.1:0").await?;

    let mut rx = registry.subscribe("porch").await;

    let stream = TcpStream::connect(addr).await?;
    let mut transport = Framed::new(stream, LengthDelimitedCodec::new());
    send(&mut transport, ProtoMsg::ConnectReq("porch".into())).await?;

    // The context only turns to "mailbox" once all three samples went through
    for label in ["doormat", "mailbox", "mailbox"] {
        let msg = SampleMsg::new("porch".into(), label.into(), 0.5);
        send(&mut transport, ProtoMsg::Sample(msg)).await?;
    }
    wait_for(&mut rx, "mailbox").await?;

    // Garbage does not end the connection
    transport
        .send(bytes::Bytes::from_static(&[0xff, 0xff, 0xff, 0xff]))
        .await?;

    // Everything sent so far ages out with the next sample
    clock.advance(10_000);
    for label in ["doormat", "doormat"] {
        let msg = SampleMsg::new("porch".into(), label.into(), 0.5);
        send(&mut transport, ProtoMsg::Sample(msg)).await?;
    }
    wait_for(&mut rx, "doormat").await?;

    assert_eq!(registry.names().await, vec!["porch"]);

    Ok(())
}

#[tokio::test]
async fn test_context_endpoints() -> Result<(), Error> {
    let registry = Arc::new(ContextRegistry::new(
        AggregatorSettings::default(),
        Arc::new(MonotonicClock::new()),
    ));
    let addr = serve_http(Arc::clone(&registry)).await?;

    let health = reqwest::get(format!("http://{addr}/healthcheck"))
        .await?
        .text()
        .await?;
    assert_eq!(health, "healthy");

    let context = reqwest::get(format!("http://{addr}/context"))
        .await?
        .text()
        .await?;
    assert_eq!(context, "Context: N/A");

    registry.observe("default", "library", 0.4).await;
    registry.observe("garage", "car", 0.8).await;

    let context = reqwest::get(format!("http://{addr}/context"))
        .await?
        .text()
        .await?;
    assert_eq!(context, "Context: library");

    let context = reqwest::get(format!("http://{addr}/context?name=garage"))
        .await?
        .text()
        .await?;
    assert_eq!(context, "Context: car");

    let channels = reqwest::get(format!("http://{addr}/channels"))
        .await?
        .text()
        .await?;
    assert_eq!(channels, "default\ngarage");

    Ok(())
}

#[tokio::test]
async fn test_context_stream() -> Result<(), Error> {
    let registry = Arc::new(ContextRegistry::new(
        AggregatorSettings::default(),
        Arc::new(MonotonicClock::new()),
    ));
    let addr = serve_http(Arc::clone(&registry)).await?;

    let mut response = reqwest::get(format!("http://{addr}/context_stream?name=yard")).await?;

    let first = timeout(Duration::from_secs(5), response.chunk()).await??;
    assert_eq!(first.as_deref(), Some(&b"Context: N/A\n"[..]));

    registry.observe("yard", "lawn mower", 0.6).await;

    let second = timeout(Duration::from_secs(5), response.chunk()).await??;
    assert_eq!(second.as_deref(), Some(&b"Context: lawn mower\n"[..]));

    Ok(())
}

#[tokio::test]
async fn test_context_stream_skips_unchanged_contexts() -> Result<(), Error> {
    let registry = Arc::new(ContextRegistry::new(
        AggregatorSettings::default(),
        Arc::new(MonotonicClock::new()),
    ));
    let addr = serve_http(Arc::clone(&registry)).await?;

    let mut response = reqwest::get(format!("http://{addr}/context_stream?name=yard")).await?;
    let first = timeout(Duration::from_secs(5), response.chunk()).await??;
    assert_eq!(first.as_deref(), Some(&b"Context: N/A\n"[..]));

    registry.observe("yard", "lawn", 0.6).await;
    let second = timeout(Duration::from_secs(5), response.chunk()).await??;
    assert_eq!(second.as_deref(), Some(&b"Context: lawn\n"[..]));

    registry.observe("yard", "lawn", 0.7).await;
    let repeated = timeout(Duration::from_millis(500), response.chunk()).await;
    assert!(repeated.is_err(), "unchanged context sent again: {repeated:?}");

    // "lawn" keeps the context until "hedge" outnumbers it
    for _ in 0..3 {
        registry.observe("yard", "hedge", 0.5).await;
    }
    let third = timeout(Duration::from_secs(5), response.chunk()).await??;
    assert_eq!(third.as_deref(), Some(&b"Context: hedge\n"[..]));

    Ok(())
}

#[tokio::test]
async fn test_serve_ends_when_ingestion_fails() -> Result<(), Error> {
    let registry = Arc::new(ContextRegistry::new(
        AggregatorSettings::default(),
        Arc::new(MonotonicClock::new()),
    ));
    let ingestion = tokio::spawn(async { Err::<(), _>(anyhow::anyhow!("too many open files")) });

    let result = timeout(
        Duration::from_secs(5),
        serve(registry, "127.0.0.1:0".parse()?, ingestion),
    )
    .await?;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "data socket failed");
    assert_eq!(err.root_cause().to_string(), "too many open files");

    Ok(())
}
