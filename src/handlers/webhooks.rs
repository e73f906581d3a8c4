use axum::{
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode, header::HOST},
};

use crate::{
    client::ClientError,
    error::ApiError,
    orders::OrderError,
    state::AppState,
    store::StoreError,
    types::WebhookNotification,
    webhooks::{self, WebhookError},
};

/// Inbound notification endpoint. Unrecognized event types and malformed
/// bodies are rejected before any verification traffic is generated;
/// verification failures come back as 4xx so the provider redelivers.
pub async fn paypal_webhook_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let payload: serde_json::Value = serde_json::from_str(&body)
        .map_err(|_| ApiError::BadRequest("body must be a JSON object".to_string()))?;

    let event_type = payload
        .get("event_type")
        .and_then(|value| value.as_str())
        .ok_or_else(|| ApiError::BadRequest("event_type is required".to_string()))?;
    if !webhooks::is_recognized_event(event_type) {
        return Err(ApiError::BadRequest(format!(
            "unrecognized event type {event_type}"
        )));
    }

    let notification: WebhookNotification = serde_json::from_value(payload.clone())
        .map_err(|_| ApiError::BadRequest("malformed webhook payload".to_string()))?;

    let listener_url = listener_url(&state, uri.path(), &headers);

    webhooks::verify_and_record(
        &state.client,
        &state.pool,
        &listener_url,
        &headers,
        &notification,
        &payload,
    )
    .await
    .map_err(map_webhook_error)?;

    webhooks::dispatch(&state.client, &state.pool, &state.events, &notification)
        .await
        .map_err(map_webhook_error)?;

    Ok(StatusCode::OK)
}

/// The absolute URL this delivery arrived at, used to select the matching
/// subscription. A configured listener URL wins over reconstruction from
/// the Host header.
fn listener_url(state: &AppState, path: &str, headers: &HeaderMap) -> String {
    if let Some(listener) = &state.client.config().webhook_listener {
        return listener.clone();
    }
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("https://{host}{path}")
}

fn map_webhook_error(err: WebhookError) -> ApiError {
    match err {
        WebhookError::SubscriptionNotFound { url } => {
            ApiError::Internal(format!("no webhook subscription registered for {url}"))
        }
        WebhookError::AlreadyExists { url } => {
            ApiError::Conflict(format!("subscription already exists for {url}"))
        }
        WebhookError::VerificationFailed { .. } => {
            ApiError::BadRequest("webhook signature verification failed".to_string())
        }
        WebhookError::MissingSignatureHeader(name) => {
            ApiError::BadRequest(format!("missing signature header {name}"))
        }
        WebhookError::MalformedPayload(message) => ApiError::BadRequest(message),
        WebhookError::Client(err) => map_client_error(err),
        WebhookError::Store(err) => map_store_error(err),
        WebhookError::Order(err) => map_order_error(err),
        WebhookError::Codec(err) => ApiError::Internal(err.to_string()),
    }
}

fn map_order_error(err: OrderError) -> ApiError {
    match err {
        OrderError::NotFound(order_id) => {
            ApiError::BadRequest(format!("order {order_id} is not known"))
        }
        OrderError::AlreadyCaptured(order_id) => {
            ApiError::Conflict(format!("order {order_id} is already captured"))
        }
        OrderError::Client(err) => map_client_error(err),
        OrderError::Store(err) => map_store_error(err),
        OrderError::Codec(err) => ApiError::Internal(err.to_string()),
    }
}

fn map_client_error(err: ClientError) -> ApiError {
    ApiError::Upstream(err.to_string())
}

fn map_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Db(db) => ApiError::Db(db),
        StoreError::NotFound(message) => ApiError::NotFound(message),
        StoreError::Conflict(message) => ApiError::Conflict(message),
        StoreError::Parse(message) => ApiError::Internal(message),
    }
}
