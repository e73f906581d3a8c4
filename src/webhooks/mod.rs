//! Webhook authenticity checking and dispatch. Verification is delegated to
//! the provider's remote signature-verification endpoint; only a `SUCCESS`
//! verdict lets a notification through, and the stored event row is the
//! durable record of each accepted delivery.

pub mod store;

use axum::http::HeaderMap;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::client::{ApiResult, ClientError, Method, PaypalClient};
use crate::events::{OrderEvent, OrderEvents};
use crate::orders::{self, OrderError};
use crate::store::StoreError;
use crate::types::webhooks_api::{
    EventTypeName, RegisterWebhookRequest, VerificationStatus, VerifySignatureRequest,
    VerifySignatureResponse, WebhookListResponse, WebhookNotification, WebhookResource,
};
use crate::types::{WebhookEvent, WebhookSubscription};

pub const ORDER_APPROVED: &str = "CHECKOUT.ORDER.APPROVED";
pub const ORDER_COMPLETED: &str = "CHECKOUT.ORDER.COMPLETED";
pub const PAYMENT_APPROVAL_REVERSED: &str = "CHECKOUT.PAYMENT-APPROVAL.REVERSED";

pub const ORDER_EVENT_TYPES: [&str; 3] =
    [ORDER_APPROVED, ORDER_COMPLETED, PAYMENT_APPROVAL_REVERSED];

pub fn is_recognized_event(event_type: &str) -> bool {
    ORDER_EVENT_TYPES.contains(&event_type)
}

mod signature_headers {
    pub const AUTH_ALGO: &str = "paypal-auth-algo";
    pub const CERT_URL: &str = "paypal-cert-url";
    pub const TRANSMISSION_ID: &str = "paypal-transmission-id";
    pub const TRANSMISSION_SIG: &str = "paypal-transmission-sig";
    pub const TRANSMISSION_TIME: &str = "paypal-transmission-time";
}

#[derive(Debug, Error)]
pub enum WebhookError {
    /// No subscription registered for the inbound listener URL under the
    /// caller's credentials. A deployment problem, not a transient one.
    #[error("no webhook subscription registered for {url}")]
    SubscriptionNotFound { url: String },
    #[error("a webhook subscription already exists for {url}")]
    AlreadyExists { url: String },
    #[error("webhook signature verification failed")]
    VerificationFailed { response: serde_json::Value },
    #[error("missing signature header {0}")]
    MissingSignatureHeader(&'static str),
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("payload encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

/// The five provider-supplied signature headers on a webhook delivery.
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
}

impl SignatureHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Result<Self, WebhookError> {
        Ok(Self {
            auth_algo: header_value(headers, signature_headers::AUTH_ALGO)?,
            cert_url: header_value(headers, signature_headers::CERT_URL)?,
            transmission_id: header_value(headers, signature_headers::TRANSMISSION_ID)?,
            transmission_sig: header_value(headers, signature_headers::TRANSMISSION_SIG)?,
            transmission_time: header_value(headers, signature_headers::TRANSMISSION_TIME)?,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or(WebhookError::MissingSignatureHeader(name))
}

/// Authenticates an inbound notification and persists it. In relaxed mode
/// the subscription lookup and the remote verification call are skipped and
/// the event is stored without a subscription reference.
pub async fn verify_and_record(
    client: &PaypalClient,
    pool: &SqlitePool,
    listener_url: &str,
    headers: &HeaderMap,
    notification: &WebhookNotification,
    raw_payload: &serde_json::Value,
) -> Result<WebhookEvent, WebhookError> {
    let subscription_id = if client.config().relaxed_verification {
        None
    } else {
        let subscription =
            store::find_subscription_by_listener(pool, listener_url, &client.auth_hash())
                .await?
                .ok_or_else(|| WebhookError::SubscriptionNotFound {
                    url: listener_url.to_string(),
                })?;
        verify_signature(client, &subscription, headers, raw_payload).await?;
        Some(subscription.webhook_id)
    };

    // associate the order only when it is known locally
    let order_id = match notification.resource_order_id() {
        Some(id) => orders::store::find_order(pool, id)
            .await?
            .map(|order| order.order_id),
        None => None,
    };

    let event = store::insert_webhook_event(
        pool,
        subscription_id.as_deref(),
        order_id.as_deref(),
        &notification.event_type,
        raw_payload,
    )
    .await?;

    tracing::info!(
        event_type = %notification.event_type,
        order_id = order_id.as_deref().unwrap_or("-"),
        "webhook event recorded"
    );
    Ok(event)
}

async fn verify_signature(
    client: &PaypalClient,
    subscription: &WebhookSubscription,
    headers: &HeaderMap,
    raw_payload: &serde_json::Value,
) -> Result<(), WebhookError> {
    let signature = SignatureHeaders::from_header_map(headers)?;
    let request = VerifySignatureRequest {
        auth_algo: signature.auth_algo,
        cert_url: signature.cert_url,
        transmission_id: signature.transmission_id,
        transmission_sig: signature.transmission_sig,
        transmission_time: signature.transmission_time,
        webhook_id: subscription.webhook_id.clone(),
        webhook_event: raw_payload.clone(),
    };

    let verify_path = client.config().verify_path.clone();
    let response = client
        .call(&verify_path, Method::POST, Some(&serde_json::to_value(&request)?))
        .await?
        .into_json();

    let parsed: VerifySignatureResponse = serde_json::from_value(response.clone())?;
    if parsed.verification_status != VerificationStatus::Success {
        tracing::warn!(webhook_id = %subscription.webhook_id, "webhook verification refused");
        return Err(WebhookError::VerificationFailed { response });
    }
    Ok(())
}

/// Applies the local side effects for a verified notification. An approval
/// triggers capture; re-delivered approvals hitting the already-captured
/// guard are treated as successfully processed.
pub async fn dispatch(
    client: &PaypalClient,
    pool: &SqlitePool,
    events: &OrderEvents,
    notification: &WebhookNotification,
) -> Result<(), WebhookError> {
    let order_id = notification.resource_order_id().map(str::to_string);

    match notification.event_type.as_str() {
        ORDER_APPROVED => {
            events.emit(OrderEvent::Approved {
                order_id: order_id.clone(),
                resource: notification.resource.clone(),
            });
            let Some(order_id) = order_id else {
                return Err(WebhookError::MalformedPayload(
                    "approval notification carries no order id".to_string(),
                ));
            };
            match orders::capture_order(client, pool, events, &order_id).await {
                Ok(_) => {}
                Err(OrderError::AlreadyCaptured(_)) => {
                    tracing::info!(%order_id, "approval re-delivered for captured order");
                }
                Err(err) => return Err(err.into()),
            }
        }
        ORDER_COMPLETED => {
            events.emit(OrderEvent::Completed {
                order_id,
                resource: notification.resource.clone(),
            });
        }
        PAYMENT_APPROVAL_REVERSED => {
            events.emit(OrderEvent::PaymentApprovalReversed {
                order_id,
                resource: notification.resource.clone(),
            });
        }
        other => {
            return Err(WebhookError::MalformedPayload(format!(
                "unrecognized event type {other}"
            )));
        }
    }

    Ok(())
}

/// Registers the order event types at `url` with the provider and persists
/// the subscription. When the provider reports the URL as already
/// registered under these credentials, the existing webhook is adopted
/// instead of failing.
pub async fn register_subscription(
    client: &PaypalClient,
    pool: &SqlitePool,
    url: &str,
) -> Result<WebhookSubscription, WebhookError> {
    let auth_hash = client.auth_hash();
    if store::find_subscription_by_listener(pool, url, &auth_hash)
        .await?
        .is_some()
    {
        return Err(WebhookError::AlreadyExists {
            url: url.to_string(),
        });
    }

    let request = RegisterWebhookRequest {
        url: url.to_string(),
        event_types: ORDER_EVENT_TYPES
            .iter()
            .map(|name| EventTypeName {
                name: (*name).to_string(),
            })
            .collect(),
    };

    let webhooks_path = client.config().webhooks_path.clone();
    let resource = match client
        .call(&webhooks_path, Method::POST, Some(&serde_json::to_value(&request)?))
        .await
    {
        Ok(result) => serde_json::from_value::<WebhookResource>(result.into_json())?,
        Err(err) if err.has_name("WEBHOOK_URL_ALREADY_EXISTS") => {
            adopt_existing_webhook(client, &webhooks_path, url).await?
        }
        Err(err) => return Err(err.into()),
    };

    let subscription = WebhookSubscription {
        webhook_id: resource.id,
        auth_hash,
        url: resource.url,
        event_types: resource
            .event_types
            .into_iter()
            .map(|event_type| event_type.name)
            .collect(),
    };
    store::insert_subscription(pool, &subscription).await?;

    tracing::info!(webhook_id = %subscription.webhook_id, url, "webhook subscription registered");
    Ok(subscription)
}

async fn adopt_existing_webhook(
    client: &PaypalClient,
    webhooks_path: &str,
    url: &str,
) -> Result<WebhookResource, WebhookError> {
    let listing = client
        .call(webhooks_path, Method::GET, None)
        .await?
        .into_json();
    let parsed: WebhookListResponse = serde_json::from_value(listing)?;
    parsed
        .webhooks
        .into_iter()
        .find(|webhook| webhook.url == url)
        .ok_or_else(|| {
            WebhookError::MalformedPayload(format!(
                "provider reported an existing webhook for {url} but the listing has none"
            ))
        })
}

pub async fn update_subscription(
    client: &PaypalClient,
    pool: &SqlitePool,
    webhook_id: &str,
    url: &str,
) -> Result<WebhookSubscription, WebhookError> {
    let patch = serde_json::json!([
        {"op": "replace", "path": "/url", "value": url}
    ]);
    let path = format!("{}/{}", client.config().webhooks_path, webhook_id);
    client.call(&path, Method::PATCH, Some(&patch)).await?;

    store::update_subscription_url(pool, webhook_id, url).await?;
    store::get_subscription(pool, webhook_id).await.map_err(Into::into)
}

/// Removes the remote webhook, then the local record. A failed remote
/// delete leaves the local record untouched.
pub async fn delete_subscription(
    client: &PaypalClient,
    pool: &SqlitePool,
    webhook_id: &str,
) -> Result<(), WebhookError> {
    let path = format!("{}/{}", client.config().webhooks_path, webhook_id);
    match client.call(&path, Method::DELETE, None).await? {
        ApiResult::Deleted | ApiResult::Json(_) => {}
    }
    store::delete_subscription(pool, webhook_id).await?;
    Ok(())
}
