//! Backend process supervisor
//!
//! Owns the embedded backend's lifecycle. The backend is a full HTTP
//! server in its own right, so it runs on a dedicated OS thread with its
//! own single-threaded runtime - the gateway's request loop and the
//! backend's must make progress independently. At most one instance is
//! live at a time.
//!
//! Failures inside the backend are isolated: they are logged on the
//! backend thread and surface to the gateway only through the readiness
//! gate, if the health endpoint never starts answering.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::oneshot;

use crate::config::BackendConfig;

/// Supervises the embedded backend service.
pub struct BackendSupervisor {
    config: BackendConfig,
    running: Option<RunningBackend>,
}

struct RunningBackend {
    thread: thread::JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl BackendSupervisor {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// Launch the backend bound to the configured host:port, serving
    /// `app`. No-op if an instance is already running.
    pub fn start(&mut self, app: Router) -> Result<()> {
        if let Some(running) = &self.running {
            if !running.thread.is_finished() {
                tracing::debug!("Backend already running");
                return Ok(());
            }
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let addr = self.config.authority();

        let thread = thread::Builder::new()
            .name("memgate-backend".to_string())
            .spawn(move || run_backend(addr, app, shutdown_rx))
            .context("Failed to spawn backend thread")?;

        self.running = Some(RunningBackend {
            thread,
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Signal the backend to exit, then wait up to `timeout` for its
    /// thread to finish. Best-effort: a timeout is logged, never
    /// escalated - the process is shutting down anyway.
    pub async fn stop(&mut self, timeout: Duration) {
        let Some(running) = self.running.take() else {
            return;
        };

        // Receiver gone means the thread already exited; both are fine
        let _ = running.shutdown.send(());

        let deadline = tokio::time::Instant::now() + timeout;
        while !running.thread.is_finished() {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    "Backend did not stop within {:.0}s; detaching",
                    timeout.as_secs_f64()
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let _ = running.thread.join();
        tracing::debug!("Backend stopped");
    }
}

/// Thread body: a single-threaded runtime serving the backend app until
/// the shutdown signal arrives.
fn run_backend(addr: String, app: Router, shutdown_rx: oneshot::Receiver<()>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Backend runtime failed to start: {e}");
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Backend failed to bind {addr}: {e}");
                return;
            }
        };

        tracing::info!("Backend listening on {addr}");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
            })
            .await
        {
            tracing::error!("Backend server error: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::readiness;
    use crate::gateway::upstream::UpstreamClient;
    use axum::routing::get;

    /// Find a port the OS considers free right now
    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn test_config(port: u16) -> BackendConfig {
        BackendConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        }
    }

    fn health_router() -> Router {
        Router::new().route("/health", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn test_start_serves_health_and_stop_tears_down() {
        let port = free_port();
        let mut supervisor = BackendSupervisor::new(test_config(port));
        supervisor.start(health_router()).unwrap();

        let client =
            UpstreamClient::new(format!("http://127.0.0.1:{port}"), None).unwrap();
        readiness::await_ready(&client, Duration::from_secs(5))
            .await
            .expect("backend should become ready");

        supervisor.stop(Duration::from_secs(5)).await;

        // After stop, probes fail again
        let result = readiness::await_ready(&client, Duration::from_millis(400)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_is_idempotent_while_running() {
        let port = free_port();
        let mut supervisor = BackendSupervisor::new(test_config(port));
        supervisor.start(health_router()).unwrap();
        // Second start is a no-op, not an error or a second bind
        supervisor.start(health_router()).unwrap();

        let client =
            UpstreamClient::new(format!("http://127.0.0.1:{port}"), None).unwrap();
        readiness::await_ready(&client, Duration::from_secs(5))
            .await
            .expect("backend should become ready");

        supervisor.stop(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut supervisor = BackendSupervisor::new(test_config(free_port()));
        supervisor.stop(Duration::from_millis(100)).await;
    }
}
