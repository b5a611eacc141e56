pub mod analysis;
pub mod billing;
pub mod billing_webhooks;
pub mod entitlement;
pub mod health;

use axum::Router;

use crate::adapters::http::app_state::AppState;

/// Routes that act on behalf of a signed-in user. These sit behind the rate limiter.
pub fn user_router() -> Router<AppState> {
    Router::new()
        .merge(entitlement::router())
        .merge(analysis::router())
        .merge(billing::router())
}

/// Routes called by machines: liveness probes and the payment ledger.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(billing_webhooks::router())
}
