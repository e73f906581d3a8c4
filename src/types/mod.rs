pub mod api_call_record;
pub mod order;
pub mod orders_api;
pub mod webhook_event;
pub mod webhook_subscription;
pub mod webhooks_api;

#[allow(unused_imports)]
pub use api_call_record::ApiCallRecord;
#[allow(unused_imports)]
pub use order::{OrderRecord, OrderStatus};
#[allow(unused_imports)]
pub use orders_api::{
    Amount, ApplicationContext, Breakdown, Capture, ExperienceContext, Link, OAuthTokenResponse,
    OrderCaptureResponse, OrderCreatedResponse, OrderDetailResponse, OrderIntent, PaymentSource,
    PaypalWallet, PurchaseItem, PurchaseUnit, PurchaseUnitAmount,
};
#[allow(unused_imports)]
pub use webhook_event::WebhookEvent;
#[allow(unused_imports)]
pub use webhook_subscription::WebhookSubscription;
#[allow(unused_imports)]
pub use webhooks_api::{
    EventTypeName, RegisterWebhookRequest, VerificationStatus, VerifySignatureRequest,
    VerifySignatureResponse, WebhookListResponse, WebhookNotification, WebhookResource,
};
