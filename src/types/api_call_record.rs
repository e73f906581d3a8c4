use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record of one provider call: request URL, the payload
/// we sent (absent for GET) and the payload we got back. Never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCallRecord {
    pub id: Uuid,
    pub order_id: String,
    pub url: String,
    pub request_body: Option<String>,
    pub response_body: String,
    pub created_at: String,
}
