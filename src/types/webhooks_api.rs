//! Wire shapes for inbound webhook notifications, the remote
//! signature-verification endpoint and the webhooks management collection.

use serde::{Deserialize, Serialize};

use super::orders_api::Link;

/// Inbound notification body. `event_type` and `resource` must be present;
/// everything else is carried through for the audit payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub event_type: String,
    pub resource: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl WebhookNotification {
    /// Order id embedded in the resource object, when present.
    pub fn resource_order_id(&self) -> Option<&str> {
        self.resource.get("id").and_then(|id| id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySignatureRequest {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
    pub webhook_id: String,
    pub webhook_event: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Success,
    Failure,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySignatureResponse {
    pub verification_status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventTypeName {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWebhookRequest {
    pub url: String,
    pub event_types: Vec<EventTypeName>,
}

/// A webhook as the provider's notifications collection reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResource {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<EventTypeName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookListResponse {
    #[serde(default)]
    pub webhooks: Vec<WebhookResource>,
}
