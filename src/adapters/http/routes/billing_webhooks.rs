//! Stripe webhook handler.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::ReconcileOutcome,
    infra::{
        stripe_client::StripeWebhookEvent,
        stripe_payment_adapter::{checkout_session_info, subscription_info},
        stripe_signature::{SIGNATURE_HEADER, verify_webhook_signature},
    },
};

pub fn router() -> Router<AppState> {
    Router::new().route("/billing/webhook", post(handle_webhook))
}

/// POST /api/billing/webhook
///
/// Every event is verified, then applied at most once. Errors that a retry
/// could fix answer 500 and leave the event unrecorded so Stripe redelivers
/// it. Anything else is recorded and acknowledged.
async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::WebhookUnauthenticated("Missing Stripe signature".into()))?;

    verify_webhook_signature(
        &body,
        signature,
        app_state.config.stripe_webhook_secret.expose_secret(),
        app_state.config.webhook_tolerance_secs,
        Utc::now().timestamp(),
    )?;

    let event: StripeWebhookEvent = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;
    let event_id = event.id.as_str();
    let event_type = event.event_type.as_str();

    if app_state.stripe_events.is_processed(event_id).await? {
        debug!(event_id, event_type, "Webhook event already processed");
        return Ok(StatusCode::OK);
    }

    match dispatch(&app_state, &event).await {
        Ok(Some(ReconcileOutcome::Ignored(reason))) => {
            info!(event_id, event_type, reason, "Webhook event ignored");
        }
        Ok(_) => {}
        Err(e) if e.is_retryable() => {
            error!(
                error = %e,
                event_id,
                event_type,
                retryable = true,
                "Webhook processing failed, returning 500 for Stripe retry"
            );
            return Ok(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(e) => {
            warn!(
                error = %e,
                event_id,
                event_type,
                retryable = false,
                "Webhook processing failed, acknowledging"
            );
        }
    }

    app_state
        .stripe_events
        .mark_processed(event_id, event_type)
        .await?;
    Ok(StatusCode::OK)
}

/// Route one event to its reconciler transition. `None` when the type is not
/// handled or the object doesn't parse.
async fn dispatch(
    app_state: &AppState,
    event: &StripeWebhookEvent,
) -> AppResult<Option<ReconcileOutcome>> {
    let reconciler = &app_state.reconciler;

    let outcome = match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.expired" => {
            let Some(session) = event.get_checkout_session() else {
                warn!(event_id = %event.id, "Unreadable checkout session in webhook");
                return Ok(None);
            };
            let session = checkout_session_info(session);
            if event.event_type == "checkout.session.completed" {
                reconciler.complete_checkout(&session).await?
            } else {
                reconciler.abandon_checkout(&session).await?
            }
        }
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            let Some(subscription) = event.get_subscription() else {
                warn!(event_id = %event.id, "Unreadable subscription in webhook");
                return Ok(None);
            };
            let subscription = subscription_info(subscription);
            if event.event_type == "customer.subscription.updated" {
                reconciler.apply_subscription_updated(&subscription).await?
            } else {
                reconciler.apply_subscription_deleted(&subscription).await?
            }
        }
        other => {
            debug!(event_type = other, "Unhandled webhook event type");
            return Ok(None);
        }
    };

    Ok(Some(outcome))
}
