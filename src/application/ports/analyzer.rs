use async_trait::async_trait;

use crate::app_error::AppResult;

/// Generative resume analysis. The result is the model's JSON object,
/// passed through untouched.
#[async_trait]
pub trait ResumeAnalyzer: Send + Sync {
    async fn analyze(&self, resume_text: &str) -> AppResult<serde_json::Value>;
}
