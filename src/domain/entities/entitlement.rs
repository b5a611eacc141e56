use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    plan::{Plan, UNLIMITED_CREDITS},
    subscription_state::SubscriptionState,
};

/// Opaque identity-provider key of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's plan and remaining analysis credits.
///
/// `credits` is `-1` for unlimited plans, otherwise the remaining count
/// (never negative).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntitlement {
    pub user_id: UserId,
    pub plan: Plan,
    pub credits: i32,
    pub last_reset: Option<DateTime<Utc>>,
    pub subscription_ref: Option<String>,
    pub customer_ref: Option<String>,
    pub state: SubscriptionState,
    /// Checkout session awaiting confirmation while `state == Pending`.
    pub pending_checkout: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserEntitlement {
    /// Record provisioned on first sign-in.
    pub fn new_free(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan: Plan::Free,
            credits: Plan::Free.allotment(),
            last_reset: Some(now),
            subscription_ref: None,
            customer_ref: None,
            state: SubscriptionState::Free,
            pending_checkout: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn has_unlimited_credits(&self) -> bool {
        self.credits == UNLIMITED_CREDITS
    }

    /// Whether one more analysis may start.
    pub fn can_spend(&self) -> bool {
        self.has_unlimited_credits() || self.credits >= 1
    }

    /// Confirmed subscription for `plan`. Credits refill only when the plan
    /// or subscription actually changes, so replayed confirmations don't mint
    /// credits. Returns whether credits were refilled.
    pub fn activate(&mut self, plan: Plan, subscription_ref: &str, customer_ref: &str) -> bool {
        let plan_changed = self.plan != plan;
        let subscription_changed = self.subscription_ref.as_deref() != Some(subscription_ref);
        let refill = plan_changed || subscription_changed;
        if refill {
            self.credits = plan.allotment();
        }
        self.plan = plan;
        self.subscription_ref = Some(subscription_ref.to_string());
        self.customer_ref = Some(customer_ref.to_string());
        self.state = SubscriptionState::Active;
        self.pending_checkout = None;
        refill
    }

    /// Plan reported by the ledger for the recorded subscription. Returns
    /// whether credits were refilled.
    pub fn change_plan(&mut self, plan: Plan) -> bool {
        if self.plan == plan {
            return false;
        }
        self.plan = plan;
        self.credits = plan.allotment();
        true
    }

    /// Back to the free tier with no external subscription.
    pub fn reset_to_free(&mut self) {
        self.plan = Plan::Free;
        self.credits = Plan::Free.allotment();
        self.subscription_ref = None;
        self.state = SubscriptionState::Free;
        self.pending_checkout = None;
    }

    /// Checkout started for a new plan; current coverage is untouched.
    pub fn begin_checkout(&mut self, session_id: &str) {
        self.state = SubscriptionState::Pending;
        self.pending_checkout = Some(session_id.to_string());
    }

    /// Abandoned checkout: fall back to whatever was in force before.
    pub fn abandon_checkout(&mut self) {
        self.pending_checkout = None;
        self.state = if self.subscription_ref.is_some() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Free
        };
    }
}
