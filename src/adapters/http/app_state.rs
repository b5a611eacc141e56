use std::sync::Arc;

use crate::{
    application::use_cases::{
        analysis::AnalysisUseCases, entitlement::EntitlementUseCases,
        resume_history::ResumeHistoryUseCases, stripe_events::StripeEventRepoTrait,
        subscription::SubscriptionReconciler,
    },
    infra::{RateLimiterTrait, config::AppConfig},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub entitlement_use_cases: Arc<EntitlementUseCases>,
    pub analysis_use_cases: Arc<AnalysisUseCases>,
    pub resume_history: Arc<ResumeHistoryUseCases>,
    pub reconciler: Arc<SubscriptionReconciler>,
    pub stripe_events: Arc<dyn StripeEventRepoTrait>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
