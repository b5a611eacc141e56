use async_trait::async_trait;

use crate::app_error::AppResult;

/// Webhook delivery ids that were fully applied.
#[async_trait]
pub trait StripeEventRepoTrait: Send + Sync {
    async fn is_processed(&self, event_id: &str) -> AppResult<bool>;

    /// Record an applied event. Recording the same id twice is Ok.
    async fn mark_processed(&self, event_id: &str, event_type: &str) -> AppResult<()>;
}
