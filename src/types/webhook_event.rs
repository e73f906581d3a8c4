use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A verified, stored notification. Written only after signature
/// verification passed (or in relaxed mode) and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub subscription_id: Option<String>,
    pub order_id: Option<String>,
    pub event_type: String,
    pub payload: String,
    pub received_at: String,
}
