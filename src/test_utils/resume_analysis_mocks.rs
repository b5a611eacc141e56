//! In-memory analysis history.

use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::resume_history::ResumeAnalysisRepoTrait,
    domain::entities::{entitlement::UserId, resume_analysis::ResumeAnalysis},
};

#[derive(Default)]
pub struct InMemoryResumeAnalysisRepo {
    pub analyses: Mutex<Vec<ResumeAnalysis>>,
    /// Every call fails with a database error.
    pub broken: bool,
}

impl InMemoryResumeAnalysisRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analyses(analyses: Vec<ResumeAnalysis>) -> Self {
        Self {
            analyses: Mutex::new(analyses),
            broken: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.analyses.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<ResumeAnalysis> {
        self.analyses.lock().unwrap().clone()
    }

    fn check(&self) -> AppResult<()> {
        if self.broken {
            return Err(AppError::Database("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResumeAnalysisRepoTrait for InMemoryResumeAnalysisRepo {
    async fn create(&self, analysis: &ResumeAnalysis) -> AppResult<()> {
        self.check()?;
        self.analyses.lock().unwrap().push(analysis.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> AppResult<Vec<ResumeAnalysis>> {
        self.check()?;
        let mut own: Vec<ResumeAnalysis> = self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .filter(|a| &a.user_id == user_id)
            .cloned()
            .collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(own)
    }

    async fn get(&self, user_id: &UserId, id: Uuid) -> AppResult<Option<ResumeAnalysis>> {
        self.check()?;
        Ok(self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id && &a.user_id == user_id)
            .cloned())
    }

    async fn delete(&self, user_id: &UserId, id: Uuid) -> AppResult<bool> {
        self.check()?;
        let mut analyses = self.analyses.lock().unwrap();
        let before = analyses.len();
        analyses.retain(|a| !(a.id == id && &a.user_id == user_id));
        Ok(analyses.len() < before)
    }
}
