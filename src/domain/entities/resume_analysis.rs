use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::entitlement::UserId;

/// A finished analysis together with the resume text it was run on.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeAnalysis {
    pub id: Uuid,
    pub user_id: UserId,
    pub resume: String,
    pub analysis: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ResumeAnalysis {
    pub fn new(
        user_id: UserId,
        resume: impl Into<String>,
        analysis: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            resume: resume.into(),
            analysis,
            created_at: now,
        }
    }
}
