use std::sync::Arc;
use tracing::instrument;

use crate::{app_error::AppResult, domain::entities::entitlement::UserId};

use super::entitlement::{ConsumeOutcome, EntitlementRepoTrait};

/// Reads and spends a user's analysis credits.
#[derive(Clone)]
pub struct CreditLedger {
    repo: Arc<dyn EntitlementRepoTrait>,
}

impl CreditLedger {
    pub fn new(repo: Arc<dyn EntitlementRepoTrait>) -> Self {
        Self { repo }
    }

    /// Allowed iff unlimited or at least one credit left. A user without a
    /// record has zero credits.
    pub async fn check_allowance(&self, user_id: &UserId) -> AppResult<bool> {
        Ok(self
            .repo
            .get(user_id)
            .await?
            .is_some_and(|e| e.can_spend()))
    }

    /// Spend one credit after a successful analysis. Unlimited plans are a
    /// no-op and the counter never goes below zero.
    #[instrument(skip(self))]
    pub async fn consume(&self, user_id: &UserId) -> AppResult<ConsumeOutcome> {
        let outcome = self.repo.consume_credit(user_id).await?;
        match outcome {
            ConsumeOutcome::Consumed { remaining } => {
                tracing::debug!(user_id = %user_id, remaining, "Credit consumed");
            }
            ConsumeOutcome::Unlimited => {}
            ConsumeOutcome::Exhausted => {
                // Two admissions raced on the last credit; the analysis already ran.
                tracing::warn!(user_id = %user_id, "Consume found no credits left");
            }
            ConsumeOutcome::Missing => {
                tracing::warn!(user_id = %user_id, "Consume for user without entitlement");
            }
        }
        Ok(outcome)
    }
}
