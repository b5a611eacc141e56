use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::{analyzer::ResumeAnalyzer, payment_ledger::PaymentLedgerPort},
        use_cases::{
            analysis::AnalysisUseCases,
            entitlement::{EntitlementRepoTrait, EntitlementUseCases},
            resume_history::{ResumeAnalysisRepoTrait, ResumeHistoryUseCases},
            stripe_events::StripeEventRepoTrait,
            subscription::SubscriptionReconciler,
        },
    },
    infra::{
        config::AppConfig, gemini_client::GeminiAnalyzer, postgres_persistence,
        rate_limit::RedisRateLimiter, stripe_payment_adapter::StripePaymentAdapter,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres = Arc::new(postgres_persistence(&config.database_url).await?);
    let entitlement_repo = postgres.clone() as Arc<dyn EntitlementRepoTrait>;
    let stripe_events = postgres.clone() as Arc<dyn StripeEventRepoTrait>;
    let analysis_repo = postgres.clone() as Arc<dyn ResumeAnalysisRepoTrait>;

    let rate_limiter = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            config.rate_limit_window_secs,
            config.rate_limit_per_ip,
            config.rate_limit_per_user,
        )
        .await?,
    );

    let ledger: Arc<dyn PaymentLedgerPort> =
        Arc::new(StripePaymentAdapter::new(config.stripe_secret_key.clone())?);
    let analyzer: Arc<dyn ResumeAnalyzer> = Arc::new(GeminiAnalyzer::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    )?);

    let entitlement_use_cases = EntitlementUseCases::new(entitlement_repo.clone());
    let analysis_use_cases =
        AnalysisUseCases::new(entitlement_repo.clone(), analysis_repo.clone(), analyzer);
    let resume_history = ResumeHistoryUseCases::new(analysis_repo);
    let reconciler = SubscriptionReconciler::new(
        entitlement_repo,
        ledger,
        config.plan_prices.clone(),
        config.app_origin.to_string(),
    );

    Ok(AppState {
        config: Arc::new(config),
        entitlement_use_cases: Arc::new(entitlement_use_cases),
        analysis_use_cases: Arc::new(analysis_use_cases),
        resume_history: Arc::new(resume_history),
        reconciler: Arc::new(reconciler),
        stripe_events,
        rate_limiter,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "resumind_api=debug,tower_http=debug".into());

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer);

    // JSON file logs are best-effort; a read-only working dir still gets console output.
    match File::create("app.log") {
        Ok(file) => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true);
            registry.with(json_layer).try_init().ok();
        }
        Err(_) => {
            registry.try_init().ok();
        }
    }
}
