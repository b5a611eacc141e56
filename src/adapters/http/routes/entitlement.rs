use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    adapters::http::{app_state::AppState, auth::AuthUser},
    app_error::AppResult,
    application::use_cases::entitlement::EntitlementView,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entitlement", get(get_entitlement))
        .route("/entitlement/session", post(start_session))
}

/// POST /api/entitlement/session
/// Called right after sign-in: provisions the free tier for new users and
/// applies the monthly refill when due.
async fn start_session(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<EntitlementView>> {
    let view = app_state
        .entitlement_use_cases
        .start_session(&user_id)
        .await?;
    Ok(Json(view))
}

/// GET /api/entitlement
async fn get_entitlement(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<EntitlementView>> {
    let view = app_state.entitlement_use_cases.view(&user_id).await?;
    Ok(Json(view))
}
