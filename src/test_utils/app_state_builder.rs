//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` assembles a full `AppState` from in-memory mocks.
//! Tests that need to inspect state afterwards pass in their own `Arc`s.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt,
        use_cases::{
            analysis::AnalysisUseCases, entitlement::EntitlementUseCases,
            resume_history::ResumeHistoryUseCases, subscription::SubscriptionReconciler,
        },
    },
    domain::entities::entitlement::UserEntitlement,
    infra::config::AppConfig,
    test_utils::{
        InMemoryEntitlementRepo, InMemoryPaymentLedger, InMemoryRateLimiter,
        InMemoryResumeAnalysisRepo, InMemoryStripeEventRepo, StubAnalyzer, test_plan_prices,
    },
};

pub const TEST_JWT_SECRET: &str = "test_identity_secret";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_APP_ORIGIN: &str = "https://app.test";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/test".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        app_origin: Url::parse(TEST_APP_ORIGIN).unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        identity_jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
        stripe_secret_key: SecretString::new("sk_test".into()),
        stripe_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        plan_prices: test_plan_prices(),
        webhook_tolerance_secs: 300,
        gemini_api_key: SecretString::new("gemini_test".into()),
        gemini_model: "gemini-test".to_string(),
        redis_url: "redis://localhost".to_string(),
        rate_limit_window_secs: 60,
        rate_limit_per_ip: 60,
        rate_limit_per_user: 30,
        trust_proxy: false,
    }
}

/// Valid one-hour session token for `user_id`.
pub fn test_token(user_id: &str) -> String {
    jwt::issue(
        user_id,
        &SecretString::new(TEST_JWT_SECRET.into()),
        time::Duration::hours(1),
    )
}

#[derive(Default)]
pub struct TestAppStateBuilder {
    entitlements: Vec<UserEntitlement>,
    entitlement_repo: Option<Arc<InMemoryEntitlementRepo>>,
    ledger: Option<Arc<InMemoryPaymentLedger>>,
    stripe_events: Option<Arc<InMemoryStripeEventRepo>>,
    analyzer: Option<Arc<StubAnalyzer>>,
    resume_history: Option<Arc<InMemoryResumeAnalysisRepo>>,
    rate_limiter: Option<Arc<InMemoryRateLimiter>>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the default repo. Ignored when `with_entitlement_repo` is used.
    pub fn with_entitlement(mut self, entitlement: UserEntitlement) -> Self {
        self.entitlements.push(entitlement);
        self
    }

    pub fn with_entitlement_repo(mut self, repo: Arc<InMemoryEntitlementRepo>) -> Self {
        self.entitlement_repo = Some(repo);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<InMemoryPaymentLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_stripe_events(mut self, events: Arc<InMemoryStripeEventRepo>) -> Self {
        self.stripe_events = Some(events);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<StubAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_resume_history(mut self, history: Arc<InMemoryResumeAnalysisRepo>) -> Self {
        self.resume_history = Some(history);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<InMemoryRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn build(self) -> AppState {
        let repo = self.entitlement_repo.unwrap_or_else(|| {
            Arc::new(InMemoryEntitlementRepo::with_entitlements(self.entitlements))
        });
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(InMemoryPaymentLedger::new()));
        let stripe_events = self
            .stripe_events
            .unwrap_or_else(|| Arc::new(InMemoryStripeEventRepo::new()));
        let analyzer = self
            .analyzer
            .unwrap_or_else(|| Arc::new(StubAnalyzer::ok()));
        let resume_history = self
            .resume_history
            .unwrap_or_else(|| Arc::new(InMemoryResumeAnalysisRepo::new()));
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(InMemoryRateLimiter::permissive()));

        let config = test_config();

        let reconciler = SubscriptionReconciler::new(
            repo.clone(),
            ledger,
            config.plan_prices.clone(),
            config.app_origin.to_string(),
        );

        AppState {
            entitlement_use_cases: Arc::new(EntitlementUseCases::new(repo.clone())),
            analysis_use_cases: Arc::new(AnalysisUseCases::new(
                repo,
                resume_history.clone(),
                analyzer,
            )),
            resume_history: Arc::new(ResumeHistoryUseCases::new(resume_history)),
            reconciler: Arc::new(reconciler),
            stripe_events,
            rate_limiter,
            config: Arc::new(config),
        }
    }
}
