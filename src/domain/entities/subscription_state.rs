use serde::{Deserialize, Serialize};

/// Local view of a user's position in the subscription lifecycle.
///
/// - `Free`: no external subscription.
/// - `Pending`: checkout session created, not yet confirmed. Any previously
///   recorded subscription stays in force until the new one is confirmed.
/// - `Active`: one confirmed external subscription is recorded.
/// - `Cancelling`: cancellation requested, waiting for the ledger to end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    #[default]
    Free,
    Pending,
    Active,
    Cancelling,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Free => "free",
            SubscriptionState::Pending => "pending",
            SubscriptionState::Active => "active",
            SubscriptionState::Cancelling => "cancelling",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => SubscriptionState::Pending,
            "active" => SubscriptionState::Active,
            "cancelling" | "canceling" => SubscriptionState::Cancelling,
            _ => SubscriptionState::Free,
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
