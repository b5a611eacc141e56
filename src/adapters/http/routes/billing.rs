use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::{app_state::AppState, auth::AuthUser},
    app_error::{AppError, AppResult},
    application::{
        ports::payment_ledger::CheckoutResult,
        use_cases::{
            entitlement::EntitlementView,
            subscription::{CancellationReport, ReconcileOutcome, SubscriptionOverview},
        },
    },
    domain::entities::plan::Plan,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/billing/checkout", post(create_checkout))
        .route("/billing/checkout/confirm", post(confirm_checkout))
        .route("/billing/cancel", post(cancel_subscription))
        .route("/billing/subscriptions", get(list_subscriptions))
}

#[derive(Deserialize)]
struct CheckoutPayload {
    plan: String,
}

#[derive(Deserialize)]
struct ConfirmPayload {
    session_id: String,
}

/// Body returned for reconciler transitions.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReconcileResponse {
    Applied {
        entitlement: EntitlementView,
        cancellation: CancellationReport,
    },
    Ignored {
        reason: &'static str,
    },
}

impl From<ReconcileOutcome> for ReconcileResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Applied {
                entitlement,
                report,
            } => ReconcileResponse::Applied {
                entitlement: EntitlementView::from(&entitlement),
                cancellation: report,
            },
            ReconcileOutcome::Ignored(reason) => ReconcileResponse::Ignored { reason },
        }
    }
}

#[derive(Debug, Serialize)]
struct DowngradeResponse {
    entitlement: EntitlementView,
    cancellation: CancellationReport,
}

/// POST /api/billing/checkout
async fn create_checkout(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<Json<CheckoutResult>> {
    let plan = Plan::parse(&payload.plan)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown plan: {}", payload.plan)))?;

    let checkout = app_state
        .reconciler
        .initiate_checkout(&user_id, plan)
        .await?;
    Ok(Json(checkout))
}

/// POST /api/billing/checkout/confirm
/// Success-page confirmation; idempotent with the completion webhook.
async fn confirm_checkout(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ConfirmPayload>,
) -> AppResult<Json<ReconcileResponse>> {
    let outcome = app_state
        .reconciler
        .confirm_checkout(&user_id, &payload.session_id)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /api/billing/cancel
async fn cancel_subscription(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<DowngradeResponse>> {
    let (entitlement, cancellation) = app_state.reconciler.downgrade_to_free(&user_id).await?;
    Ok(Json(DowngradeResponse {
        entitlement: EntitlementView::from(&entitlement),
        cancellation,
    }))
}

/// GET /api/billing/subscriptions
async fn list_subscriptions(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<SubscriptionOverview>> {
    let overview = app_state
        .reconciler
        .subscription_overview(&user_id)
        .await?;
    Ok(Json(overview))
}
