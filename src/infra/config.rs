use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::application::use_cases::subscription::PlanPrices;

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Public web origin; checkout redirects land here.
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    /// HS256 secret shared with the identity provider.
    pub identity_jwt_secret: SecretString,
    pub stripe_secret_key: SecretString,
    pub stripe_webhook_secret: SecretString,
    pub plan_prices: PlanPrices,
    pub webhook_tolerance_secs: i64,
    pub gemini_api_key: SecretString,
    pub gemini_model: String,
    pub redis_url: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    pub rate_limit_per_user: u64,
    /// Whether to trust X-Forwarded-For headers. Only enable behind a reverse proxy.
    pub trust_proxy: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let app_origin: Url = get_env("APP_ORIGIN");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let identity_jwt_secret = SecretString::new(get_env::<String>("IDENTITY_JWT_SECRET").into());
        let stripe_secret_key = SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_webhook_secret =
            SecretString::new(get_env::<String>("STRIPE_WEBHOOK_SECRET").into());
        let plan_prices = PlanPrices {
            pro: get_env("STRIPE_PRO_PRICE_ID"),
            enterprise: get_env("STRIPE_ENTERPRISE_PRICE_ID"),
        };
        let webhook_tolerance_secs: i64 = get_env_default("WEBHOOK_TOLERANCE_SECS", 300);

        let gemini_api_key = SecretString::new(get_env::<String>("GEMINI_API_KEY").into());
        let gemini_model: String =
            get_env_default("GEMINI_MODEL", "gemini-1.5-flash-latest".to_string());

        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_per_ip: u64 = get_env_default("RATE_LIMIT_PER_IP", 60);
        let rate_limit_per_user: u64 = get_env_default("RATE_LIMIT_PER_USER", 30);
        // Off unless explicitly enabled behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);

        Self {
            database_url,
            bind_addr,
            app_origin,
            cors_origin,
            identity_jwt_secret,
            stripe_secret_key,
            stripe_webhook_secret,
            plan_prices,
            webhook_tolerance_secs,
            gemini_api_key,
            gemini_model,
            redis_url,
            rate_limit_window_secs,
            rate_limit_per_ip,
            rate_limit_per_user,
            trust_proxy,
        }
    }
}
