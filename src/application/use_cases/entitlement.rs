use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    app_error::AppResult,
    domain::entities::{
        entitlement::{UserEntitlement, UserId},
        plan::Plan,
        subscription_state::SubscriptionState,
    },
};

use super::monthly_reset::MonthlyResetPolicy;

/// Result of a conditional credit decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One credit was taken; `remaining` is the stored value afterwards.
    Consumed { remaining: i32 },
    /// Unlimited plan, counter untouched.
    Unlimited,
    /// Counter was already zero, nothing written.
    Exhausted,
    /// No record for the user.
    Missing,
}

/// How `save` treats the stored credit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditWrite {
    /// Leave the stored counter as it is, so spends committed since the read survive.
    Keep,
    /// Overwrite the counter with the record's `credits`.
    Refill,
}

impl CreditWrite {
    pub fn refill_if(refilled: bool) -> Self {
        if refilled {
            CreditWrite::Refill
        } else {
            CreditWrite::Keep
        }
    }
}

#[async_trait]
pub trait EntitlementRepoTrait: Send + Sync {
    async fn get(&self, user_id: &UserId) -> AppResult<Option<UserEntitlement>>;

    /// Insert `initial` unless a record for the same user exists. Returns the
    /// stored record either way.
    async fn create_default(&self, initial: &UserEntitlement) -> AppResult<UserEntitlement>;

    async fn find_by_customer_ref(&self, customer_ref: &str)
    -> AppResult<Option<UserEntitlement>>;

    async fn set_customer_ref(&self, user_id: &UserId, customer_ref: &str) -> AppResult<()>;

    /// Write plan, references and state in one statement. On an existing row
    /// `credits` is only written with `CreditWrite::Refill` and `last_reset`
    /// is left alone. Returns the stored record.
    async fn save(
        &self,
        entitlement: &UserEntitlement,
        credits: CreditWrite,
    ) -> AppResult<UserEntitlement>;

    /// Decrement-if-positive as a single conditional write.
    async fn consume_credit(&self, user_id: &UserId) -> AppResult<ConsumeOutcome>;

    /// Set `credits` and `last_reset = now` only if `last_reset` still equals
    /// `expected_last_reset` and the plan is still `expected_plan`. Returns
    /// false when another writer got there first.
    async fn reset_credits(
        &self,
        user_id: &UserId,
        expected_last_reset: Option<DateTime<Utc>>,
        expected_plan: Plan,
        credits: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// Load a user's record, provisioning the free tier if it doesn't exist yet.
pub async fn load_or_provision(
    repo: &dyn EntitlementRepoTrait,
    user_id: &UserId,
) -> AppResult<UserEntitlement> {
    if let Some(existing) = repo.get(user_id).await? {
        return Ok(existing);
    }
    tracing::info!(user_id = %user_id, "Provisioning free entitlement");
    repo.create_default(&UserEntitlement::new_free(user_id.clone(), Utc::now()))
        .await
}

/// Read model polled by the UI.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntitlementView {
    pub plan: Plan,
    pub credits: i32,
    pub unlimited: bool,
    pub state: SubscriptionState,
    pub has_subscription: bool,
}

impl From<&UserEntitlement> for EntitlementView {
    fn from(e: &UserEntitlement) -> Self {
        Self {
            plan: e.plan,
            credits: e.credits,
            unlimited: e.has_unlimited_credits(),
            state: e.state,
            has_subscription: e.subscription_ref.is_some(),
        }
    }
}

#[derive(Clone)]
pub struct EntitlementUseCases {
    repo: Arc<dyn EntitlementRepoTrait>,
    reset: MonthlyResetPolicy,
}

impl EntitlementUseCases {
    pub fn new(repo: Arc<dyn EntitlementRepoTrait>) -> Self {
        let reset = MonthlyResetPolicy::new(repo.clone());
        Self { repo, reset }
    }

    /// Session start: provision on first sign-in, then apply the lazy
    /// monthly reset.
    #[instrument(skip(self))]
    pub async fn start_session(&self, user_id: &UserId) -> AppResult<EntitlementView> {
        load_or_provision(self.repo.as_ref(), user_id).await?;
        let entitlement = self.reset.maybe_reset(user_id).await?;
        Ok(EntitlementView::from(&entitlement))
    }

    /// Current read model. A user without a record reads as the default free
    /// tier with zero credits.
    pub async fn view(&self, user_id: &UserId) -> AppResult<EntitlementView> {
        match self.repo.get(user_id).await? {
            Some(e) => Ok(EntitlementView::from(&e)),
            None => Ok(EntitlementView {
                plan: Plan::Free,
                credits: 0,
                unlimited: false,
                state: SubscriptionState::Free,
                has_subscription: false,
            }),
        }
    }
}
