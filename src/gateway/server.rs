//! Gateway server setup and lifecycle
//!
//! Startup sequencing: launch the backend supervisor, build the one
//! upstream client, block on the readiness gate, install the client into
//! the handle (handlers can observe it only from then on), then serve.
//! Shutdown is best-effort: close the handle, stop the supervisor, log
//! anything that goes wrong, escalate nothing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::backend;
use crate::config::Config;
use crate::engine::{CompletionEngine, HttpCompletionEngine};

use super::handlers::{completions_handler, relay_handler};
use super::readiness;
use super::state::GatewayState;
use super::supervisor::BackendSupervisor;
use super::upstream::{UpstreamClient, UpstreamHandle};

/// How long to wait for the backend thread at shutdown
const BACKEND_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the gateway until the shutdown signal fires.
///
/// A readiness failure returns before the listener ever binds - the
/// process must not enter serving state with a dead backend.
pub async fn run(config: Config, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
    // Launch the embedded backend unless fronting an external API
    let mut supervisor = BackendSupervisor::new(config.backend.clone());
    if config.backend.embedded && !config.upstream.is_external() {
        let app = backend::router(&config.backend)?;
        supervisor.start(app)?;
    }

    // The one upstream client for the process lifetime. It exists before
    // polling starts but stays invisible to handlers until installed.
    let base_url = config.upstream.resolved_base_url(&config.backend);
    let client = UpstreamClient::new(base_url.as_str(), config.upstream.request_timeout())?;

    // Block until the backend accepts traffic; the deadline is fatal
    readiness::await_ready(&client, config.backend.startup_timeout()).await?;

    let upstream = Arc::new(UpstreamHandle::new());
    upstream.install(client);

    // Completion engine bound to the same upstream
    let engine: Arc<dyn CompletionEngine> = Arc::new(HttpCompletionEngine::new(
        base_url.as_str(),
        config.upstream.request_timeout(),
    )?);

    let state = GatewayState {
        upstream: upstream.clone(),
        engine,
        backend_authority: HeaderValue::from_str(&config.backend.authority())
            .context("Backend authority is not a valid header value")?,
        host_header: config.upstream.resolved_host_header(),
    };

    let app = router(state);

    tracing::info!("Starting gateway on {}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Gateway listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        })
        .await
        .context("Server error")?;

    // Teardown: further upstream use fails fast, then the backend gets a
    // bounded chance to exit
    upstream.close();
    supervisor.stop(BACKEND_STOP_TIMEOUT).await;

    tracing::info!("Gateway shut down gracefully");
    Ok(())
}

/// Build the gateway router: the completion dispatcher on its two paths,
/// everything else relayed. Non-POST methods on the completion paths fall
/// through to the relay as well.
pub(crate) fn router(state: GatewayState) -> Router {
    Router::new()
        .route(
            "/chat/completions",
            post(completions_handler).fallback(relay_handler),
        )
        .route(
            "/v1/chat/completions",
            post(completions_handler).fallback(relay_handler),
        )
        .fallback(relay_handler)
        .with_state(state)
}
