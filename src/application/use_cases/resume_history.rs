use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{entitlement::UserId, resume_analysis::ResumeAnalysis},
};

/// Stored analyses. Every read and delete is scoped to the owning user.
#[async_trait]
pub trait ResumeAnalysisRepoTrait: Send + Sync {
    async fn create(&self, analysis: &ResumeAnalysis) -> AppResult<()>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &UserId) -> AppResult<Vec<ResumeAnalysis>>;

    async fn get(&self, user_id: &UserId, id: Uuid) -> AppResult<Option<ResumeAnalysis>>;

    /// Returns false when no analysis with `id` belongs to `user_id`.
    async fn delete(&self, user_id: &UserId, id: Uuid) -> AppResult<bool>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeAnalysisView {
    pub id: Uuid,
    pub resume: String,
    pub analysis: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ResumeAnalysis> for ResumeAnalysisView {
    fn from(a: ResumeAnalysis) -> Self {
        Self {
            id: a.id,
            resume: a.resume,
            analysis: a.analysis,
            created_at: a.created_at,
        }
    }
}

#[derive(Clone)]
pub struct ResumeHistoryUseCases {
    repo: Arc<dyn ResumeAnalysisRepoTrait>,
}

impl ResumeHistoryUseCases {
    pub fn new(repo: Arc<dyn ResumeAnalysisRepoTrait>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, user_id: &UserId) -> AppResult<Vec<ResumeAnalysisView>> {
        let analyses = self.repo.list_for_user(user_id).await?;
        Ok(analyses.into_iter().map(ResumeAnalysisView::from).collect())
    }

    /// Another user's analysis is indistinguishable from a missing one.
    pub async fn get(&self, user_id: &UserId, id: Uuid) -> AppResult<ResumeAnalysisView> {
        self.repo
            .get(user_id, id)
            .await?
            .map(ResumeAnalysisView::from)
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: &UserId, id: Uuid) -> AppResult<()> {
        if !self.repo.delete(user_id, id).await? {
            return Err(AppError::NotFound);
        }
        tracing::info!(user_id = %user_id, analysis_id = %id, "Analysis deleted");
        Ok(())
    }
}
