//! Embedded backend - the model-routing service the gateway supervises
//!
//! A deliberately small OpenAI-compatible router: it resolves public model
//! names against a configured table and forwards chat completions to the
//! owning provider. The gateway only depends on its interface (the health
//! endpoint and the completion route); everything else about model routing
//! stays behind this module boundary.

mod table;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, Response, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::BackendConfig;

use table::ModelTable;

#[derive(Clone)]
struct BackendState {
    client: reqwest::Client,
    models: Arc<ModelTable>,
}

/// Build the backend router from config. Called by the supervisor's owner
/// before the backend thread starts.
pub fn router(config: &BackendConfig) -> Result<Router> {
    let models = ModelTable::load(&config.config_path)?;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .http1_only()
        .build()
        .context("Failed to create backend HTTP client")?;

    let state = BackendState {
        client,
        models: Arc::new(models),
    };

    Ok(Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/v1/models", get(list_models))
        .route("/chat/completions", post(chat_completions))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health(State(state): State<BackendState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "models": state.models.len(),
    }))
}

async fn list_models(State(state): State<BackendState>) -> Json<Value> {
    let data: Vec<Value> = state
        .models
        .names()
        .into_iter()
        .map(|name| json!({"id": name, "object": "model", "owned_by": "memgate"}))
        .collect();
    Json(json!({"object": "list", "data": data}))
}

/// Resolve the requested model and forward the completion to its provider.
/// Streaming requests pass the provider's SSE bytes through untouched.
async fn chat_completions(
    State(state): State<BackendState>,
    body: Bytes,
) -> Result<Response<Body>, Response<Body>> {
    let mut payload: Value = serde_json::from_slice(&body)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &format!("invalid JSON: {e}")))?;

    let model_name = payload
        .get("model")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "missing model field"))?;

    let target = state.models.get(&model_name).cloned().ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            &format!("no route for model '{model_name}'"),
        )
    })?;

    // The provider sees its own model identifier, not the public name.
    // api_key in the payload is a gateway-level concern, never forwarded.
    payload["model"] = Value::String(target.model.clone());
    if let Some(map) = payload.as_object_mut() {
        map.remove("api_key");
    }
    let streaming = payload.get("stream") == Some(&Value::Bool(true));

    let url = format!("{}/chat/completions", target.api_base);
    let mut request = state.client.post(&url).json(&payload);
    if let Some(key) = &target.api_key {
        request = request.bearer_auth(key);
    }

    tracing::debug!(model = %model_name, provider = %target.api_base, streaming, "Routing completion");

    let response = request.send().await.map_err(|e| {
        error_response(
            StatusCode::BAD_GATEWAY,
            &format!("provider request failed: {e}"),
        )
    })?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| header::HeaderValue::from_static("application/json"));

    let body = if streaming && status.is_success() {
        // SSE passthrough; the provider's framing is already correct
        Body::from_stream(response.bytes_stream())
    } else {
        let bytes = response.bytes().await.map_err(|e| {
            error_response(
                StatusCode::BAD_GATEWAY,
                &format!("provider response failed: {e}"),
            )
        })?;
        Body::from(bytes)
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .map_err(|_| {
            error_response(StatusCode::BAD_GATEWAY, "failed to assemble provider response")
        })
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let body = json!({"error": {"message": message}});
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::from("Internal error building error response")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn config_with_table(contents: &str) -> (BackendConfig, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let config = BackendConfig {
            config_path: PathBuf::from(file.path()),
            ..Default::default()
        };
        (config, file)
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_model_count() {
        let (config, _file) = config_with_table(
            r#"
            [[model_list]]
            model_name = "gpt-4o"
            [model_list.params]
            model = "gpt-4o"
            api_base = "https://api.example.com/v1"
            "#,
        );
        let app = router(&config).unwrap();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["models"], 1);
    }

    #[tokio::test]
    async fn test_models_listing() {
        let (config, _file) = config_with_table(
            r#"
            [[model_list]]
            model_name = "gpt-4o"
            [model_list.params]
            model = "gpt-4o"
            api_base = "https://api.example.com/v1"
            "#,
        );
        let app = router(&config).unwrap();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/v1/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"][0]["id"], "gpt-4o");
    }

    #[tokio::test]
    async fn test_unknown_model_is_404() {
        let (config, _file) = config_with_table("");
        let app = router(&config).unwrap();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/chat/completions")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"model":"ghost","messages":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_completion_forwards_with_rewritten_model_and_auth() {
        let provider = MockServer::start_async().await;
        let mock = provider
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"model": "provider-model"}"#);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"id":"cmpl-1"}"#);
            })
            .await;

        let (config, _file) = config_with_table(&format!(
            r#"
            [[model_list]]
            model_name = "public-model"
            [model_list.params]
            model = "provider-model"
            api_base = "{}/v1"
            api_key = "sk-test"
            "#,
            provider.base_url()
        ));
        let app = router(&config).unwrap();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/chat/completions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"model":"public-model","messages":[],"api_key":"client-key"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], "cmpl-1");
    }
}
