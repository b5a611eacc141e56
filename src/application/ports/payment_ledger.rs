use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    app_error::AppResult,
    domain::entities::{
        entitlement::UserId, plan::Plan, subscription_status::SubscriptionStatus,
    },
};

/// Billing-customer record in the external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URLs for checkout redirects
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Everything the ledger needs to open a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer: CustomerId,
    pub user_id: UserId,
    pub plan: Plan,
    pub price_id: String,
    pub urls: CheckoutUrls,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

/// A checkout session as the ledger currently sees it.
#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub session_id: String,
    pub customer_id: Option<CustomerId>,
    pub subscription_id: Option<SubscriptionId>,
    pub client_reference_id: Option<String>,
    /// True once payment went through and the subscription exists.
    pub complete: bool,
    pub plan_metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub subscription_id: SubscriptionId,
    pub customer_id: CustomerId,
    pub status: SubscriptionStatus,
    /// External price ID to identify the plan
    pub price_id: Option<String>,
    pub cancel_at_period_end: bool,
    /// `plan` metadata attached at checkout, if any.
    pub plan_metadata: Option<String>,
    /// `uploads` metadata attached at checkout, if any.
    pub uploads_metadata: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Port to the external subscription ledger.
///
/// Implementations surface transport failures and ledger-side 5xx as
/// `AppError::LedgerUnavailable`, and a missing object as `AppError::NotFound`
/// (or `Ok(None)` where the signature allows it).
#[async_trait]
pub trait PaymentLedgerPort: Send + Sync {
    async fn create_customer(&self, user_id: &UserId) -> AppResult<CustomerId>;

    /// False if the customer was deleted in the ledger or never existed there.
    async fn customer_exists(&self, customer: &CustomerId) -> AppResult<bool>;

    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<CheckoutResult>;

    async fn get_checkout_session(&self, session_id: &str)
    -> AppResult<Option<CheckoutSessionInfo>>;

    /// List a customer's subscriptions. `None` lists every status.
    async fn list_subscriptions(
        &self,
        customer: &CustomerId,
        status: Option<SubscriptionStatus>,
    ) -> AppResult<Vec<SubscriptionInfo>>;

    /// Cancel immediately. Cancelling an already-cancelled subscription is Ok.
    async fn cancel_subscription(&self, subscription_id: &SubscriptionId) -> AppResult<()>;

    async fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<Option<SubscriptionInfo>>;
}
