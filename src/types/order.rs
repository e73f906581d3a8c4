use serde::{Deserialize, Serialize};

/// Provider-side order lifecycle. Status only moves forward:
/// CREATED -> APPROVED -> COMPLETED, with VOIDED/REVERSED terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Saved,
    PayerActionRequired,
    Approved,
    Completed,
    Voided,
    Reversed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Saved => "SAVED",
            OrderStatus::PayerActionRequired => "PAYER_ACTION_REQUIRED",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Voided => "VOIDED",
            OrderStatus::Reversed => "REVERSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(OrderStatus::Created),
            "SAVED" => Some(OrderStatus::Saved),
            "PAYER_ACTION_REQUIRED" => Some(OrderStatus::PayerActionRequired),
            "APPROVED" => Some(OrderStatus::Approved),
            "COMPLETED" => Some(OrderStatus::Completed),
            "VOIDED" => Some(OrderStatus::Voided),
            "REVERSED" => Some(OrderStatus::Reversed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Voided | OrderStatus::Reversed
        )
    }

    fn rank(self) -> u8 {
        match self {
            OrderStatus::Created | OrderStatus::Saved => 0,
            OrderStatus::PayerActionRequired => 1,
            OrderStatus::Approved => 2,
            OrderStatus::Completed | OrderStatus::Voided | OrderStatus::Reversed => 3,
        }
    }

    /// Whether a stored order may move to `next`. Same-status updates are
    /// allowed so re-deliveries stay no-ops.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub status: OrderStatus,
    pub created_at: String,
    pub updated_at: String,
}
