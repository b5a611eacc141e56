//! Test data factories.
//!
//! Each factory creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    application::{
        ports::payment_ledger::{CustomerId, SubscriptionId, SubscriptionInfo},
        use_cases::subscription::PlanPrices,
    },
    domain::entities::{
        entitlement::{UserEntitlement, UserId},
        plan::Plan,
        subscription_state::SubscriptionState,
        resume_analysis::ResumeAnalysis,
        subscription_status::SubscriptionStatus,
    },
};

/// Free-tier entitlement, reset this month, no external references.
pub fn create_test_entitlement(overrides: impl FnOnce(&mut UserEntitlement)) -> UserEntitlement {
    let now = Utc::now();
    let mut entitlement = UserEntitlement {
        user_id: UserId::new(format!("user_{}", Uuid::new_v4().simple())),
        plan: Plan::Free,
        credits: Plan::Free.allotment(),
        last_reset: Some(now),
        subscription_ref: None,
        customer_ref: None,
        state: SubscriptionState::Free,
        pending_checkout: None,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut entitlement);
    entitlement
}

/// Ledger subscription on the Pro price.
/// Stored analysis owned by `user_id`, created now.
pub fn create_test_analysis(
    user_id: &str,
    overrides: impl FnOnce(&mut ResumeAnalysis),
) -> ResumeAnalysis {
    let mut analysis = ResumeAnalysis::new(
        UserId::new(user_id),
        "Jane Doe\nSoftware Engineer",
        json!({ "score": 78, "title": "Software Engineer" }),
        Utc::now(),
    );
    overrides(&mut analysis);
    analysis
}

pub fn create_test_subscription(
    id: &str,
    customer: &str,
    status: SubscriptionStatus,
) -> SubscriptionInfo {
    SubscriptionInfo {
        subscription_id: SubscriptionId::new(id),
        customer_id: CustomerId::new(customer),
        status,
        price_id: Some("price_pro".to_string()),
        cancel_at_period_end: false,
        plan_metadata: None,
        uploads_metadata: None,
        created_at: Some(Utc::now()),
    }
}

pub fn test_plan_prices() -> PlanPrices {
    PlanPrices {
        pro: "price_pro".to_string(),
        enterprise: "price_enterprise".to_string(),
    }
}
