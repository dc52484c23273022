use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ModelError;
use crate::types::ModelProvider;

const ERROR_BODY_LIMIT: usize = 2_000;

pub(super) fn join_url(base_url: &str, path: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

/// One client per handler. Loopback endpoints bypass any system proxy.
pub(super) fn build_http_client(base_url: &str) -> Client {
    let builder = Client::builder();
    let builder = if is_loopback_base_url(base_url) {
        builder.no_proxy()
    } else {
        builder
    };
    builder.build().unwrap_or_else(|_| Client::new())
}

pub(super) fn is_loopback_base_url(base_url: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(base_url) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "[::1]"
}

/// Sends `request` and returns the response if the vendor accepted it.
pub(super) async fn send_request(
    provider: ModelProvider,
    request: RequestBuilder,
) -> Result<Response, ModelError> {
    let response = request
        .send()
        .await
        .map_err(|error| map_transport_error(provider, error))?;
    check_response(provider, response).await
}

pub(super) async fn read_json_body(
    provider: ModelProvider,
    response: Response,
) -> Result<Value, ModelError> {
    let body = response
        .text()
        .await
        .map_err(|error| map_transport_error(provider, error))?;
    serde_json::from_str(&body).map_err(|error| {
        ModelError::inference_failed(format!("{provider} returned invalid JSON: {error}"))
            .with_metadata(json!({
                "source": provider.as_str(),
                "body": truncate_for_metadata(&body),
            }))
    })
}

async fn check_response(
    provider: ModelProvider,
    response: Response,
) -> Result<Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let error = map_status_error(provider, status, &body);
    warn!(%provider, status = status.as_u16(), "vendor rejected inference request: {error}");
    Err(error)
}

pub(super) fn map_status_error(
    provider: ModelProvider,
    status: StatusCode,
    body: &str,
) -> ModelError {
    let metadata = json!({
        "source": provider.as_str(),
        "status": status.as_u16(),
        "body": truncate_for_metadata(body),
    });
    let reason = format!(
        "{provider} HTTP {}: {}",
        status.as_u16(),
        truncate_for_metadata(body)
    );

    if status == StatusCode::TOO_MANY_REQUESTS {
        return ModelError::rate_limit_exceeded(provider).with_metadata(metadata);
    }
    if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        return ModelError::inference_failed(reason)
            .with_metadata(metadata)
            .transient();
    }
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        return ModelError::inference_input_invalid(reason).with_metadata(metadata);
    }
    ModelError::inference_failed(reason).with_metadata(metadata)
}

/// Connection and body read failures are always worth another attempt.
pub(super) fn map_transport_error(provider: ModelProvider, error: reqwest::Error) -> ModelError {
    ModelError::inference_failed(format!("{provider} transport error: {error}"))
        .with_metadata(json!({ "source": provider.as_str() }))
        .transient()
}

fn truncate_for_metadata(text: &str) -> String {
    if text.len() <= ERROR_BODY_LIMIT {
        return text.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
