use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::store::StoreError;
use crate::types::orders_api::Capture;
use crate::types::{ApiCallRecord, OrderRecord, OrderStatus};

pub async fn insert_order(
    pool: &SqlitePool,
    order_id: &str,
    status: OrderStatus,
) -> Result<OrderRecord, StoreError> {
    let now = format_utc();
    sqlx::query(
        r#"
        INSERT INTO orders (order_id, status, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(order_id)
    .bind(status.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(OrderRecord {
        order_id: order_id.to_string(),
        status,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub async fn find_order(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Option<OrderRecord>, StoreError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT order_id, status, created_at, updated_at
        FROM orders
        WHERE order_id = ?
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    row.map(OrderRow::try_into).transpose()
}

pub async fn get_order(pool: &SqlitePool, order_id: &str) -> Result<OrderRecord, StoreError> {
    find_order(pool, order_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("order {order_id} not found")))
}

/// Moves an order's status forward. Same-status writes are accepted as
/// no-ops; backward or out-of-terminal transitions are refused so the
/// lifecycle invariant is enforced in exactly one place.
pub async fn update_order_status(
    pool: &SqlitePool,
    order_id: &str,
    status: OrderStatus,
) -> Result<OrderRecord, StoreError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT order_id, status, created_at, updated_at
        FROM orders
        WHERE order_id = ?
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("order {order_id} not found")))?;

    let current: OrderRecord = row.try_into()?;
    if !current.status.can_transition_to(status) {
        return Err(StoreError::Conflict(format!(
            "order {order_id} cannot move from {} to {}",
            current.status.as_str(),
            status.as_str()
        )));
    }

    let now = format_utc();
    sqlx::query(
        r#"
        UPDATE orders
        SET status = ?, updated_at = ?
        WHERE order_id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(&now)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(OrderRecord {
        order_id: current.order_id,
        status,
        created_at: current.created_at,
        updated_at: now,
    })
}

/// Appends one immutable request/response audit pair for an order.
pub async fn record_api_call(
    pool: &SqlitePool,
    order_id: &str,
    url: &str,
    request_body: Option<&serde_json::Value>,
    response_body: &serde_json::Value,
) -> Result<ApiCallRecord, StoreError> {
    let id = Uuid::new_v4();
    let now = format_utc();
    let request_body = request_body.map(|value| value.to_string());
    let response_body = response_body.to_string();

    sqlx::query(
        r#"
        INSERT INTO api_call_records (id, order_id, url, request_body, response_body, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(order_id)
    .bind(url)
    .bind(request_body.as_deref())
    .bind(&response_body)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(ApiCallRecord {
        id,
        order_id: order_id.to_string(),
        url: url.to_string(),
        request_body,
        response_body,
        created_at: now,
    })
}

pub async fn list_api_calls(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Vec<ApiCallRecord>, StoreError> {
    let rows = sqlx::query_as::<_, ApiCallRow>(
        r#"
        SELECT id, order_id, url, request_body, response_body, created_at
        FROM api_call_records
        WHERE order_id = ?
        ORDER BY created_at ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ApiCallRow::try_into).collect()
}

/// Re-derives capture objects from the stored capture responses, so capture
/// identifiers remain recoverable from the audit trail alone.
pub async fn captures_for_order(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Vec<Capture>, StoreError> {
    let records = list_api_calls(pool, order_id).await?;
    let mut captures = Vec::new();

    for record in records {
        if !record.url.contains("/capture") {
            continue;
        }
        let body: serde_json::Value = serde_json::from_str(&record.response_body)
            .map_err(|err| StoreError::Parse(format!("invalid stored response body: {err}")))?;
        let Some(units) = body.get("purchase_units").and_then(|units| units.as_array()) else {
            continue;
        };
        for unit in units {
            let Some(raw) = unit
                .get("payments")
                .and_then(|payments| payments.get("captures"))
                .and_then(|captures| captures.as_array())
            else {
                continue;
            };
            for value in raw {
                let capture: Capture = serde_json::from_value(value.clone())
                    .map_err(|err| StoreError::Parse(format!("invalid capture object: {err}")))?;
                captures.push(capture);
            }
        }
    }

    Ok(captures)
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Parse(format!("unknown order status: {}", row.status)))?;
        Ok(OrderRecord {
            order_id: row.order_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApiCallRow {
    id: String,
    order_id: String,
    url: String,
    request_body: Option<String>,
    response_body: String,
    created_at: String,
}

impl TryFrom<ApiCallRow> for ApiCallRecord {
    type Error = StoreError;

    fn try_from(row: ApiCallRow) -> Result<Self, Self::Error> {
        Ok(ApiCallRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| StoreError::Parse(format!("invalid record id: {err}")))?,
            order_id: row.order_id,
            url: row.url,
            request_body: row.request_body,
            response_body: row.response_body,
            created_at: row.created_at,
        })
    }
}

fn format_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
