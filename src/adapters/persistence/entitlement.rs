use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::entitlement::{ConsumeOutcome, CreditWrite, EntitlementRepoTrait},
    domain::entities::{
        entitlement::{UserEntitlement, UserId},
        plan::{Plan, UNLIMITED_CREDITS},
        subscription_state::SubscriptionState,
    },
};

fn row_to_entitlement(row: &sqlx::postgres::PgRow) -> UserEntitlement {
    let user_id: String = row.get("user_id");
    let raw_plan: String = row.get("plan");
    let plan = Plan::parse(&raw_plan).unwrap_or_else(|| {
        tracing::warn!(
            user_id = %user_id,
            plan = %raw_plan,
            "Unknown stored plan, treating as free"
        );
        Plan::Free
    });
    let state: String = row.get("subscription_state");

    UserEntitlement {
        user_id: UserId::new(user_id),
        plan,
        credits: row.get("credits"),
        last_reset: row.get("last_reset"),
        subscription_ref: row.get("subscription_ref"),
        customer_ref: row.get("customer_ref"),
        state: SubscriptionState::from_str(&state),
        pending_checkout: row.get("pending_checkout"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    user_id, plan, credits, last_reset, subscription_ref, customer_ref,
    subscription_state, pending_checkout, created_at, updated_at
"#;

#[async_trait]
impl EntitlementRepoTrait for PostgresPersistence {
    async fn get(&self, user_id: &UserId) -> AppResult<Option<UserEntitlement>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_entitlements WHERE user_id = $1",
            SELECT_COLS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_entitlement))
    }

    async fn create_default(&self, initial: &UserEntitlement) -> AppResult<UserEntitlement> {
        sqlx::query(
            r#"
            INSERT INTO user_entitlements
                (user_id, plan, credits, last_reset, subscription_state)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(initial.user_id.as_str())
        .bind(initial.plan.as_str())
        .bind(initial.credits)
        .bind(initial.last_reset)
        .bind(initial.state.as_str())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        // Concurrent first sign-ins converge on whichever insert won.
        self.get(&initial.user_id)
            .await?
            .ok_or(AppError::EntitlementNotFound)
    }

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> AppResult<Option<UserEntitlement>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_entitlements WHERE customer_ref = $1",
            SELECT_COLS
        ))
        .bind(customer_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_entitlement))
    }

    async fn set_customer_ref(&self, user_id: &UserId, customer_ref: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE user_entitlements SET customer_ref = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .bind(customer_ref)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::EntitlementNotFound);
        }
        Ok(())
    }

    async fn save(
        &self,
        entitlement: &UserEntitlement,
        credits: CreditWrite,
    ) -> AppResult<UserEntitlement> {
        // On conflict the stored counter and last_reset belong to
        // consume_credit/reset_credits unless the caller asks for a refill.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO user_entitlements
                (user_id, plan, credits, last_reset, subscription_ref, customer_ref,
                 subscription_state, pending_checkout)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                credits = CASE WHEN $9 THEN EXCLUDED.credits ELSE user_entitlements.credits END,
                subscription_ref = EXCLUDED.subscription_ref,
                customer_ref = EXCLUDED.customer_ref,
                subscription_state = EXCLUDED.subscription_state,
                pending_checkout = EXCLUDED.pending_checkout,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(entitlement.user_id.as_str())
        .bind(entitlement.plan.as_str())
        .bind(entitlement.credits)
        .bind(entitlement.last_reset)
        .bind(&entitlement.subscription_ref)
        .bind(&entitlement.customer_ref)
        .bind(entitlement.state.as_str())
        .bind(&entitlement.pending_checkout)
        .bind(credits == CreditWrite::Refill)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_entitlement(&row))
    }

    async fn consume_credit(&self, user_id: &UserId) -> AppResult<ConsumeOutcome> {
        // The UPDATE re-evaluates `credits > 0` against the latest committed
        // row, so two callers racing for the last credit cannot both win.
        let row = sqlx::query(
            r#"
            WITH target AS (
                SELECT credits FROM user_entitlements WHERE user_id = $1
            ),
            updated AS (
                UPDATE user_entitlements
                SET credits = credits - 1, updated_at = NOW()
                WHERE user_id = $1 AND credits > 0
                RETURNING credits
            )
            SELECT
                (SELECT credits FROM target) AS before,
                (SELECT credits FROM updated) AS remaining
            "#,
        )
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        let before: Option<i32> = row.get("before");
        let remaining: Option<i32> = row.get("remaining");

        Ok(match (before, remaining) {
            (None, _) => ConsumeOutcome::Missing,
            (_, Some(remaining)) => ConsumeOutcome::Consumed { remaining },
            (Some(UNLIMITED_CREDITS), None) => ConsumeOutcome::Unlimited,
            (Some(_), None) => ConsumeOutcome::Exhausted,
        })
    }

    async fn reset_credits(
        &self,
        user_id: &UserId,
        expected_last_reset: Option<DateTime<Utc>>,
        expected_plan: Plan,
        credits: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        // Stored plans may use any accepted spelling.
        let plan_spellings: Vec<String> = expected_plan
            .spellings()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = sqlx::query(
            r#"
            UPDATE user_entitlements
            SET credits = $2, last_reset = $3, updated_at = NOW()
            WHERE user_id = $1
              AND last_reset IS NOT DISTINCT FROM $4
              AND lower(trim(plan)) = ANY($5)
            "#,
        )
        .bind(user_id.as_str())
        .bind(credits)
        .bind(now)
        .bind(expected_last_reset)
        .bind(plan_spellings)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
