use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::store::StoreError;
use crate::types::{WebhookEvent, WebhookSubscription};

pub async fn insert_subscription(
    pool: &SqlitePool,
    subscription: &WebhookSubscription,
) -> Result<(), StoreError> {
    let event_types = serde_json::to_string(&subscription.event_types)
        .map_err(|err| StoreError::Parse(format!("invalid event type list: {err}")))?;

    sqlx::query(
        r#"
        INSERT INTO webhook_subscriptions (webhook_id, auth_hash, url, event_types)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&subscription.webhook_id)
    .bind(&subscription.auth_hash)
    .bind(&subscription.url)
    .bind(&event_types)
    .execute(pool)
    .await?;

    Ok(())
}

/// Looks up the subscription a notification was delivered to, keyed by the
/// listener URL plus the credential hash of the receiving credentials.
pub async fn find_subscription_by_listener(
    pool: &SqlitePool,
    url: &str,
    auth_hash: &str,
) -> Result<Option<WebhookSubscription>, StoreError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(
        r#"
        SELECT webhook_id, auth_hash, url, event_types
        FROM webhook_subscriptions
        WHERE url = ? AND auth_hash = ?
        "#,
    )
    .bind(url)
    .bind(auth_hash)
    .fetch_optional(pool)
    .await?;

    row.map(SubscriptionRow::try_into).transpose()
}

pub async fn get_subscription(
    pool: &SqlitePool,
    webhook_id: &str,
) -> Result<WebhookSubscription, StoreError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(
        r#"
        SELECT webhook_id, auth_hash, url, event_types
        FROM webhook_subscriptions
        WHERE webhook_id = ?
        "#,
    )
    .bind(webhook_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("subscription {webhook_id} not found")))?;

    row.try_into()
}

pub async fn update_subscription_url(
    pool: &SqlitePool,
    webhook_id: &str,
    url: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE webhook_subscriptions
        SET url = ?
        WHERE webhook_id = ?
        "#,
    )
    .bind(url)
    .bind(webhook_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!(
            "subscription {webhook_id} not found"
        )));
    }
    Ok(())
}

pub async fn delete_subscription(pool: &SqlitePool, webhook_id: &str) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE webhook_id = ?")
        .bind(webhook_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!(
            "subscription {webhook_id} not found"
        )));
    }
    Ok(())
}

/// Appends a verified notification. Insert-only; re-delivery produces
/// another row, it never rewrites an existing one.
pub async fn insert_webhook_event(
    pool: &SqlitePool,
    subscription_id: Option<&str>,
    order_id: Option<&str>,
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<WebhookEvent, StoreError> {
    let id = Uuid::new_v4();
    let now = format_utc();
    let payload = payload.to_string();

    sqlx::query(
        r#"
        INSERT INTO webhook_events (id, subscription_id, order_id, event_type, payload, received_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(subscription_id)
    .bind(order_id)
    .bind(event_type)
    .bind(&payload)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(WebhookEvent {
        id,
        subscription_id: subscription_id.map(str::to_string),
        order_id: order_id.map(str::to_string),
        event_type: event_type.to_string(),
        payload,
        received_at: now,
    })
}

pub async fn list_webhook_events(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Vec<WebhookEvent>, StoreError> {
    let rows = sqlx::query_as::<_, WebhookEventRow>(
        r#"
        SELECT id, subscription_id, order_id, event_type, payload, received_at
        FROM webhook_events
        WHERE order_id = ?
        ORDER BY received_at ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WebhookEventRow::try_into).collect()
}

pub async fn count_webhook_events(pool: &SqlitePool) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    webhook_id: String,
    auth_hash: String,
    url: String,
    event_types: String,
}

impl TryFrom<SubscriptionRow> for WebhookSubscription {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let event_types: Vec<String> = serde_json::from_str(&row.event_types)
            .map_err(|err| StoreError::Parse(format!("invalid event type list: {err}")))?;
        Ok(WebhookSubscription {
            webhook_id: row.webhook_id,
            auth_hash: row.auth_hash,
            url: row.url,
            event_types,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WebhookEventRow {
    id: String,
    subscription_id: Option<String>,
    order_id: Option<String>,
    event_type: String,
    payload: String,
    received_at: String,
}

impl TryFrom<WebhookEventRow> for WebhookEvent {
    type Error = StoreError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEvent {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| StoreError::Parse(format!("invalid event id: {err}")))?,
            subscription_id: row.subscription_id,
            order_id: row.order_id,
            event_type: row.event_type,
            payload: row.payload,
            received_at: row.received_at,
        })
    }
}

fn format_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
