//! Endpoints of HTTP server.
//!
use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::{anyhow, Result};
use axum::{
    body::StreamBody, extract::Query, http::header, response::IntoResponse, routing::get,
    Extension, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use crate::{registry::ContextRegistry, DEFAULT_CHANNEL};

/// Search parameters available to context endpoints.
#[derive(Debug, Deserialize)]
pub struct ContextParams {
    #[serde(default)]
    name: Option<String>,
}

impl ContextParams {
    fn channel(self) -> String {
        self.name.unwrap_or_else(|| DEFAULT_CHANNEL.into())
    }
}

/// Line shown to the user for a context label.
pub fn context_line(label: &str) -> String {
    format!("Context: {label}")
}

/// Build the HTTP router serving the contexts of `registry`.
pub fn app(registry: Arc<ContextRegistry>) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/context", get(context))
        .route("/context_stream", get(context_stream))
        .route("/channels", get(channels))
        .layer(Extension(registry))
}

/// Serve the HTTP endpoints on `addr` for as long as `ingestion` keeps running.
///
/// Contexts go stale once nothing feeds the registry, so the end of `ingestion` ends the server
/// with an error.
pub async fn serve(
    registry: Arc<ContextRegistry>,
    addr: SocketAddr,
    ingestion: JoinHandle<Result<()>>,
) -> Result<()> {
    let server = axum::Server::try_bind(&addr)?.serve(app(registry).into_make_service());
    log::info!("Serving contexts on {}", server.local_addr());

    tokio::select! {
        res = server => res?,
        res = ingestion => {
            let err = match res {
                Ok(Ok(())) => anyhow!("data socket stopped"),
                Ok(Err(err)) => err.context("data socket failed"),
                Err(err) => anyhow::Error::new(err).context("data socket task aborted"),
            };
            return Err(err);
        }
    }

    Ok(())
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

/// Current context of a channel.
pub async fn context(
    Extension(registry): Extension<Arc<ContextRegistry>>,
    Query(params): Query<ContextParams>,
) -> String {
    let name = params.channel();
    context_line(&registry.current(&name).await)
}

/// Stream of context lines, one per change of the channel's context.
pub async fn context_stream(
    Extension(registry): Extension<Arc<ContextRegistry>>,
    Query(params): Query<ContextParams>,
) -> impl IntoResponse {
    let name = params.channel();
    log::info!("Context stream for {} requested", &name);

    let rx = registry.subscribe(&name).await;
    let stream = WatchStream::new(rx)
        .map(|label| Ok::<_, Infallible>(format!("{}\n", context_line(&label))));

    let body = StreamBody::new(stream);
    let headers = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];

    (headers, body)
}

/// Names of all known channels, one per line.
pub async fn channels(Extension(registry): Extension<Arc<ContextRegistry>>) -> String {
    registry.names().await.join("\n")
}
