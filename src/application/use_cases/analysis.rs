use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::analyzer::ResumeAnalyzer,
    domain::entities::{entitlement::UserId, resume_analysis::ResumeAnalysis},
};

use super::{
    credit_ledger::CreditLedger,
    entitlement::{ConsumeOutcome, EntitlementRepoTrait},
    gate::{Admission, Gate},
    resume_history::ResumeAnalysisRepoTrait,
};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    /// Id of the stored analysis.
    pub id: Uuid,
    pub analysis: serde_json::Value,
    /// Credits left after this run, `-1` when unlimited.
    pub credits_remaining: i32,
}

/// Gated analysis: admit, run the analyzer, store the result, then spend
/// exactly one credit. A result that could not be stored is not charged.
#[derive(Clone)]
pub struct AnalysisUseCases {
    gate: Gate,
    ledger: CreditLedger,
    history: Arc<dyn ResumeAnalysisRepoTrait>,
    analyzer: Arc<dyn ResumeAnalyzer>,
}

impl AnalysisUseCases {
    pub fn new(
        repo: Arc<dyn EntitlementRepoTrait>,
        history: Arc<dyn ResumeAnalysisRepoTrait>,
        analyzer: Arc<dyn ResumeAnalyzer>,
    ) -> Self {
        Self {
            gate: Gate::new(repo.clone()),
            ledger: CreditLedger::new(repo),
            history,
            analyzer,
        }
    }

    #[instrument(skip(self, resume_text), fields(text_len = resume_text.len()))]
    pub async fn analyze(&self, user_id: &UserId, resume_text: &str) -> AppResult<AnalysisOutput> {
        if resume_text.trim().is_empty() {
            return Err(AppError::InvalidInput("Resume text is empty".into()));
        }

        if let Admission::Denied(reason) = self.gate.admit(user_id).await? {
            tracing::info!(user_id = %user_id, ?reason, "Analysis denied");
            return Err(AppError::InsufficientCredits);
        }

        let analysis = self.analyzer.analyze(resume_text).await?;

        let record = ResumeAnalysis::new(user_id.clone(), resume_text, analysis, Utc::now());
        self.history.create(&record).await?;

        let credits_remaining = match self.ledger.consume(user_id).await? {
            ConsumeOutcome::Consumed { remaining } => remaining,
            ConsumeOutcome::Unlimited => -1,
            ConsumeOutcome::Exhausted | ConsumeOutcome::Missing => 0,
        };

        tracing::info!(
            user_id = %user_id,
            analysis_id = %record.id,
            credits_remaining,
            "Analysis stored"
        );
        Ok(AnalysisOutput {
            id: record.id,
            analysis: record.analysis,
            credits_remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        InMemoryEntitlementRepo, InMemoryResumeAnalysisRepo, StubAnalyzer,
        create_test_entitlement,
    };

    fn setup(credits: i32, analyzer: StubAnalyzer) -> (AnalysisUseCases, UserId, Arc<InMemoryEntitlementRepo>, Arc<StubAnalyzer>) {
        let (uc, user, repo, analyzer, _) =
            setup_with_history(credits, analyzer, InMemoryResumeAnalysisRepo::new());
        (uc, user, repo, analyzer)
    }

    fn setup_with_history(
        credits: i32,
        analyzer: StubAnalyzer,
        history: InMemoryResumeAnalysisRepo,
    ) -> (
        AnalysisUseCases,
        UserId,
        Arc<InMemoryEntitlementRepo>,
        Arc<StubAnalyzer>,
        Arc<InMemoryResumeAnalysisRepo>,
    ) {
        let e = create_test_entitlement(|e| e.credits = credits);
        let user = e.user_id.clone();
        let repo = Arc::new(InMemoryEntitlementRepo::with_entitlements(vec![e]));
        let analyzer = Arc::new(analyzer);
        let history = Arc::new(history);
        (
            AnalysisUseCases::new(repo.clone(), history.clone(), analyzer.clone()),
            user,
            repo,
            analyzer,
            history,
        )
    }

    #[tokio::test]
    async fn successful_analysis_is_stored_with_returned_id() {
        let (uc, user, _, _, history) =
            setup_with_history(3, StubAnalyzer::ok(), InMemoryResumeAnalysisRepo::new());

        let out = uc.analyze(&user, "Jane Doe, engineer").await.unwrap();

        let stored = history.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, out.id);
        assert_eq!(stored[0].user_id, user);
        assert_eq!(stored[0].resume, "Jane Doe, engineer");
        assert_eq!(stored[0].analysis, out.analysis);
    }

    #[tokio::test]
    async fn unstorable_analysis_is_not_charged() {
        let (uc, user, repo, _, _) =
            setup_with_history(3, StubAnalyzer::ok(), InMemoryResumeAnalysisRepo::broken());

        let err = uc.analyze(&user, "Jane Doe").await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(repo.get(&user).await.unwrap().unwrap().credits, 3);
    }

    #[tokio::test]
    async fn denied_or_failed_analysis_stores_nothing() {
        let (uc, user, _, _, history) =
            setup_with_history(0, StubAnalyzer::ok(), InMemoryResumeAnalysisRepo::new());
        uc.analyze(&user, "resume").await.unwrap_err();
        assert_eq!(history.count(), 0);

        let (uc, user, _, _, history) =
            setup_with_history(2, StubAnalyzer::failing(), InMemoryResumeAnalysisRepo::new());
        uc.analyze(&user, "resume").await.unwrap_err();
        assert_eq!(history.count(), 0);
    }

    #[tokio::test]
    async fn successful_analysis_spends_one_credit() {
        let (uc, user, repo, _) = setup(3, StubAnalyzer::ok());
        let out = uc.analyze(&user, "Jane Doe, engineer").await.unwrap();
        assert_eq!(out.credits_remaining, 2);
        assert_eq!(repo.get(&user).await.unwrap().unwrap().credits, 2);
    }

    #[tokio::test]
    async fn denied_user_never_reaches_analyzer() {
        let (uc, user, repo, analyzer) = setup(0, StubAnalyzer::ok());
        let err = uc.analyze(&user, "resume").await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientCredits));
        assert_eq!(analyzer.call_count(), 0);
        assert_eq!(repo.get(&user).await.unwrap().unwrap().credits, 0);
    }

    #[tokio::test]
    async fn failed_analysis_does_not_spend() {
        let (uc, user, repo, _) = setup(2, StubAnalyzer::failing());
        let err = uc.analyze(&user, "resume").await.unwrap_err();
        assert!(matches!(err, AppError::AnalysisFailed(_)));
        assert_eq!(repo.get(&user).await.unwrap().unwrap().credits, 2);
    }

    #[tokio::test]
    async fn unlimited_user_keeps_unlimited() {
        let (uc, user, repo, _) = setup(-1, StubAnalyzer::ok());
        let out = uc.analyze(&user, "resume").await.unwrap();
        assert_eq!(out.credits_remaining, -1);
        assert_eq!(repo.get(&user).await.unwrap().unwrap().credits, -1);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_gate() {
        let (uc, user, repo, analyzer) = setup(1, StubAnalyzer::ok());
        let err = uc.analyze(&user, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(analyzer.call_count(), 0);
        assert_eq!(repo.get(&user).await.unwrap().unwrap().credits, 1);
    }
}
