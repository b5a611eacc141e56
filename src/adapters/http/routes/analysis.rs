use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::AuthUser},
    app_error::AppResult,
    application::use_cases::{analysis::AnalysisOutput, resume_history::ResumeAnalysisView},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analysis", post(analyze))
        .route("/analyses", get(list_analyses))
        .route("/analyses/{id}", get(get_analysis).delete(delete_analysis))
}

#[derive(Deserialize)]
struct AnalyzePayload {
    text: String,
}

#[derive(Serialize)]
struct AnalysesResponse {
    items: Vec<ResumeAnalysisView>,
}

/// POST /api/analysis
/// Runs one gated analysis, stores it and spends a credit on success.
async fn analyze(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AnalyzePayload>,
) -> AppResult<Json<AnalysisOutput>> {
    let output = app_state
        .analysis_use_cases
        .analyze(&user_id, &payload.text)
        .await?;
    Ok(Json(output))
}

/// GET /api/analyses
async fn list_analyses(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<impl IntoResponse> {
    let items = app_state.resume_history.list(&user_id).await?;
    Ok(Json(AnalysesResponse { items }))
}

/// GET /api/analyses/{id}
async fn get_analysis(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ResumeAnalysisView>> {
    let analysis = app_state.resume_history.get(&user_id, id).await?;
    Ok(Json(analysis))
}

/// DELETE /api/analyses/{id}
async fn delete_analysis(
    State(app_state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    app_state.resume_history.delete(&user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
