use serde::{Deserialize, Serialize};

/// A registered listener URL together with the credential hash that
/// registered it, so distinct credential pairs can listen at the same URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Provider-assigned webhook id.
    pub webhook_id: String,
    pub auth_hash: String,
    pub url: String,
    pub event_types: Vec<String>,
}
