use async_trait::async_trait;
use sqlx::{Row, types::Json};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::resume_history::ResumeAnalysisRepoTrait,
    domain::entities::{entitlement::UserId, resume_analysis::ResumeAnalysis},
};

fn row_to_analysis(row: &sqlx::postgres::PgRow) -> ResumeAnalysis {
    let user_id: String = row.get("user_id");
    let analysis: Json<serde_json::Value> = row.get("analysis");
    ResumeAnalysis {
        id: row.get("id"),
        user_id: UserId::new(user_id),
        resume: row.get("resume"),
        analysis: analysis.0,
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ResumeAnalysisRepoTrait for PostgresPersistence {
    async fn create(&self, analysis: &ResumeAnalysis) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO resume_analyses (id, user_id, resume, analysis, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.user_id.as_str())
        .bind(&analysis.resume)
        .bind(Json(&analysis.analysis))
        .bind(analysis.created_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> AppResult<Vec<ResumeAnalysis>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, resume, analysis, created_at
            FROM resume_analyses
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_analysis).collect())
    }

    async fn get(&self, user_id: &UserId, id: Uuid) -> AppResult<Option<ResumeAnalysis>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, resume, analysis, created_at
            FROM resume_analyses
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_analysis))
    }

    async fn delete(&self, user_id: &UserId, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM resume_analyses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
