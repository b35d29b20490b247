//! Socket receiving classification samples.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use common::protocol::ProtoMsg;
use futures::StreamExt;
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{meter::METER, registry::ContextRegistry};

/// Bind the data socket and accept connections in a separate task.
///
/// Returns the bound address, which differs from `addr` when binding to port 0, and the handle of
/// the accept loop. The loop only ends with the error that stopped it.
pub async fn spawn_data_socket(
    registry: Arc<ContextRegistry>,
    addr: &str,
) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    log::info!("Data socket listening on {}", local_addr);

    let handle = tokio::spawn(accept_connections(listener, registry));

    Ok((local_addr, handle))
}

async fn accept_connections(listener: TcpListener, registry: Arc<ContextRegistry>) -> Result<()> {
    loop {
        let (socket, _) = listener.accept().await?;
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(err) = handle_incoming(socket, registry).await {
                log::error!("Connection failed: {}", err);
            }
        });
    }
}

async fn handle_incoming(stream: TcpStream, registry: Arc<ContextRegistry>) -> Result<()> {
    let peer = stream.peer_addr()?;
    log::info!("{}: New connection", peer);

    let mut transport = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = transport.next().await {
        let data = frame?;
        match ProtoMsg::deserialize(&data[..]) {
            Ok(ProtoMsg::ConnectReq(name)) => {
                log::info!("{}: Sending samples for channel {}", peer, name);
            }
            Ok(ProtoMsg::Sample(sample)) => {
                registry
                    .observe(&sample.id, &sample.label, sample.confidence)
                    .await;
            }
            Err(err) => {
                METER.tick_rejected();
                log::warn!("{}: Skipping undecodable frame: {}", peer, err);
            }
        }
    }

    log::info!("{}: Connection closed", peer);

    Ok(())
}
