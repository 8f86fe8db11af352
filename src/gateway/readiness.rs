//! Readiness gate - blocks gateway startup until the backend answers
//!
//! Polls the backend health endpoint at a fixed interval. Any response
//! with a status below 500 counts as ready (a 404 from an upstream that
//! has no /health still proves it accepts traffic). Transient transport
//! errors are swallowed and retried; only the deadline is fatal, and a
//! fatal gate aborts gateway startup entirely.

use std::time::Duration;

use tokio::time::Instant;

use super::error::GatewayError;
use super::upstream::UpstreamClient;

/// Fixed delay between health probes
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Per-attempt request timeout, so one black-holed probe cannot consume
/// the whole startup deadline
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `GET /health` until a status < 500 arrives or the deadline passes.
pub async fn await_ready(
    client: &UpstreamClient,
    startup_timeout: Duration,
) -> Result<(), GatewayError> {
    let started = Instant::now();
    let deadline = started + startup_timeout;

    while Instant::now() < deadline {
        match client.health_check(ATTEMPT_TIMEOUT).await {
            Ok(status) if status.as_u16() < 500 => {
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    %status,
                    "Backend ready"
                );
                return Ok(());
            }
            Ok(status) => {
                tracing::trace!(%status, "Backend not ready yet");
            }
            Err(e) => {
                // Connection refused/reset while the backend boots - expected
                tracing::trace!("Health probe failed: {e}");
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    Err(GatewayError::BackendNotReady {
        waited: startup_timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_ready_on_200() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(200);
            })
            .await;

        let client = UpstreamClient::new(server.base_url(), None).unwrap();
        assert!(await_ready(&client, Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_ready_on_404_from_upstream_without_health() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(404);
            })
            .await;

        let client = UpstreamClient::new(server.base_url(), None).unwrap();
        assert!(await_ready(&client, Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_deadline_fatal_when_backend_stays_sick() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(503);
            })
            .await;

        let client = UpstreamClient::new(server.base_url(), None).unwrap();
        let result = await_ready(&client, Duration::from_millis(500)).await;
        assert!(matches!(
            result,
            Err(GatewayError::BackendNotReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_retried_until_deadline() {
        // Nothing listens on this port; probes fail with transport errors
        // that must be swallowed until the deadline expires.
        let client = UpstreamClient::new("http://127.0.0.1:1", None).unwrap();
        let result = await_ready(&client, Duration::from_millis(500)).await;
        assert!(matches!(
            result,
            Err(GatewayError::BackendNotReady { .. })
        ));
    }
}
