//! Order lifecycle orchestration: create, capture, detail. Every provider
//! call leaves an immutable audit record, including error responses, so a
//! later-failing operation still has a forensic trail.

pub mod store;

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::client::{ClientError, Method, PaypalClient};
use crate::events::{OrderEvent, OrderEvents};
use crate::store::StoreError;
use crate::types::orders_api::{
    ApplicationContext, ExperienceContext, OrderCaptureResponse, OrderCreatedResponse,
    OrderDetailResponse, OrderIntent, PaymentSource, PurchaseUnit,
};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(String),
    /// The provider reported the order as already captured. Callers treat
    /// this as a safe no-op rather than a failure.
    #[error("order {0} is already captured")]
    AlreadyCaptured(String),
    #[error(transparent)]
    Client(ClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("payload encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<ClientError> for OrderError {
    fn from(err: ClientError) -> Self {
        OrderError::Client(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub intent: OrderIntent,
    pub purchase_units: Vec<PurchaseUnit>,
    pub payment_source: PaymentSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_context: Option<ApplicationContext>,
}

pub async fn create_order(
    client: &PaypalClient,
    pool: &SqlitePool,
    events: &OrderEvents,
    mut request: CreateOrderRequest,
) -> Result<OrderCreatedResponse, OrderError> {
    inject_redirect_urls(client, &mut request.payment_source);

    let url = client.config().orders_path.clone();
    let payload = serde_json::to_value(&request)?;
    let response = client
        .call(&url, Method::POST, Some(&payload))
        .await?
        .into_json();

    let parsed: OrderCreatedResponse = serde_json::from_value(response.clone())?;
    store::insert_order(pool, &parsed.id, parsed.status).await?;
    store::record_api_call(pool, &parsed.id, &url, Some(&payload), &response).await?;

    tracing::info!(order_id = %parsed.id, status = parsed.status.as_str(), "paypal order created");
    events.emit(OrderEvent::Created {
        order_id: parsed.id.clone(),
        response,
    });

    Ok(parsed)
}

pub async fn capture_order(
    client: &PaypalClient,
    pool: &SqlitePool,
    events: &OrderEvents,
    order_id: &str,
) -> Result<OrderCaptureResponse, OrderError> {
    let order = store::find_order(pool, order_id)
        .await?
        .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

    let url = format!("{}/{}/capture", client.config().orders_path, order.order_id);
    let response = match client.call(&url, Method::POST, None).await {
        Ok(result) => result.into_json(),
        Err(err) => {
            // keep the error body on record before surfacing the failure
            if let ClientError::Api { body, .. } = &err {
                store::record_api_call(pool, order_id, &url, None, body).await?;
            }
            if err.has_issue("UNPROCESSABLE_ENTITY", "ORDER_ALREADY_CAPTURED") {
                return Err(OrderError::AlreadyCaptured(order_id.to_string()));
            }
            return Err(err.into());
        }
    };

    let parsed: OrderCaptureResponse = serde_json::from_value(response.clone())?;
    store::record_api_call(pool, order_id, &url, None, &response).await?;
    store::update_order_status(pool, order_id, parsed.status).await?;

    tracing::info!(order_id, status = parsed.status.as_str(), "paypal order captured");
    events.emit(OrderEvent::Captured {
        order_id: order_id.to_string(),
        response,
    });

    Ok(parsed)
}

/// Fetches the order resource from the provider. Local state is not
/// mutated; only the audit record is appended.
pub async fn get_order_details(
    client: &PaypalClient,
    pool: &SqlitePool,
    order_id: &str,
) -> Result<OrderDetailResponse, OrderError> {
    let order = store::find_order(pool, order_id)
        .await?
        .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

    let url = format!("{}/{}", client.config().orders_path, order.order_id);
    let response = client.call(&url, Method::GET, None).await?.into_json();

    let parsed: OrderDetailResponse = serde_json::from_value(response.clone())?;
    store::record_api_call(pool, order_id, &url, None, &response).await?;

    Ok(parsed)
}

/// Fills in the configured success/cancellation URLs when the caller's
/// payment source does not carry explicit return/cancel URLs.
fn inject_redirect_urls(client: &PaypalClient, payment_source: &mut PaymentSource) {
    let config = client.config();
    let wallet = payment_source.paypal.get_or_insert_with(Default::default);
    let context = wallet
        .experience_context
        .get_or_insert_with(ExperienceContext::default);
    if context.return_url.is_none() {
        context.return_url = Some(config.full_uri(&config.success_url));
    }
    if context.cancel_url.is_none() {
        context.cancel_url = Some(config.full_uri(&config.cancellation_url));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Credentials, InMemoryTokenCache};
    use crate::config::GatewayConfig;
    use std::sync::Arc;

    fn test_client() -> PaypalClient {
        let mut config = GatewayConfig::default();
        config.root_url = "https://shop.example.com".to_string();
        config.success_url = "/done".to_string();
        config.cancellation_url = "/cancelled".to_string();
        PaypalClient::new(
            config,
            Credentials::new("id", "secret"),
            Arc::new(InMemoryTokenCache::default()),
        )
    }

    #[test]
    fn redirect_urls_injected_when_absent() {
        let client = test_client();
        let mut source = PaymentSource::default();
        inject_redirect_urls(&client, &mut source);

        let context = source
            .paypal
            .as_ref()
            .and_then(|wallet| wallet.experience_context.as_ref())
            .cloned()
            .unwrap_or_default();
        assert_eq!(
            context.return_url.as_deref(),
            Some("https://shop.example.com/done")
        );
        assert_eq!(
            context.cancel_url.as_deref(),
            Some("https://shop.example.com/cancelled")
        );
    }

    #[test]
    fn explicit_redirect_urls_kept() {
        let client = test_client();
        let mut source = PaymentSource {
            paypal: Some(crate::types::PaypalWallet {
                experience_context: Some(ExperienceContext {
                    return_url: Some("https://custom/return".to_string()),
                    cancel_url: Some("https://custom/cancel".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        };
        inject_redirect_urls(&client, &mut source);

        let context = source
            .paypal
            .as_ref()
            .and_then(|wallet| wallet.experience_context.as_ref())
            .cloned()
            .unwrap_or_default();
        assert_eq!(context.return_url.as_deref(), Some("https://custom/return"));
        assert_eq!(context.cancel_url.as_deref(), Some("https://custom/cancel"));
    }
}
