use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;
use tracing::instrument;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::entitlement::{UserEntitlement, UserId},
};

use super::entitlement::EntitlementRepoTrait;

/// True when `now` falls in a later calendar month (UTC) than `last_reset`.
/// A record that was never reset counts as reset at the Unix epoch. A
/// `last_reset` in the future (clock skew between writers) is not a new
/// month; the counter waits until `now` passes that month.
pub fn is_new_month(last_reset: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let last = last_reset.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    (now.year(), now.month()) > (last.year(), last.month())
}

/// Compare-and-swap attempts before settling for the stored record.
const RESET_ATTEMPTS: usize = 3;

/// Lazy replenishment of the credit counter on calendar-month boundaries.
#[derive(Clone)]
pub struct MonthlyResetPolicy {
    repo: Arc<dyn EntitlementRepoTrait>,
}

impl MonthlyResetPolicy {
    pub fn new(repo: Arc<dyn EntitlementRepoTrait>) -> Self {
        Self { repo }
    }

    pub async fn maybe_reset(&self, user_id: &UserId) -> AppResult<UserEntitlement> {
        self.maybe_reset_at(user_id, Utc::now()).await
    }

    /// Returns the record as it stands after the check.
    ///
    /// The reset only lands if neither `last_reset` nor the plan moved since
    /// the read, so a plan change committed in between is never refilled
    /// with the old plan's allotment.
    #[instrument(skip(self))]
    pub async fn maybe_reset_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AppResult<UserEntitlement> {
        let mut entitlement = self.load(user_id).await?;

        for _ in 0..RESET_ATTEMPTS {
            if !is_new_month(entitlement.last_reset, now) {
                return Ok(entitlement);
            }

            let allotment = entitlement.plan.allotment();
            let applied = self
                .repo
                .reset_credits(
                    user_id,
                    entitlement.last_reset,
                    entitlement.plan,
                    allotment,
                    now,
                )
                .await?;

            if applied {
                tracing::info!(
                    user_id = %user_id,
                    plan = %entitlement.plan,
                    credits = allotment,
                    "Monthly credits replenished"
                );
                entitlement.credits = allotment;
                entitlement.last_reset = Some(now);
                return Ok(entitlement);
            }

            // Another writer got in first: either a concurrent reset or a
            // plan change. Re-read and decide again.
            tracing::debug!(user_id = %user_id, "Monthly reset lost a race, re-reading");
            entitlement = self.load(user_id).await?;
        }

        tracing::warn!(
            user_id = %user_id,
            attempts = RESET_ATTEMPTS,
            "Monthly reset kept losing races, returning stored record"
        );
        Ok(entitlement)
    }

    async fn load(&self, user_id: &UserId) -> AppResult<UserEntitlement> {
        self.repo
            .get(user_id)
            .await?
            .ok_or(AppError::EntitlementNotFound)
    }
}
