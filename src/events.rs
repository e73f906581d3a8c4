//! Outbound order lifecycle notifications. Emission is synchronous and
//! in-order within one request; subscribers that lag simply miss events
//! (broadcast semantics), and emitting with no subscribers is a no-op.

use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum OrderEvent {
    Created {
        order_id: String,
        response: serde_json::Value,
    },
    Captured {
        order_id: String,
        response: serde_json::Value,
    },
    Approved {
        order_id: Option<String>,
        resource: serde_json::Value,
    },
    Completed {
        order_id: Option<String>,
        resource: serde_json::Value,
    },
    PaymentApprovalReversed {
        order_id: Option<String>,
        resource: serde_json::Value,
    },
}

#[derive(Debug, Clone)]
pub struct OrderEvents {
    sender: broadcast::Sender<OrderEvent>,
}

impl OrderEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: OrderEvent) {
        // send only fails when nobody is subscribed
        let _ = self.sender.send(event);
    }
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
