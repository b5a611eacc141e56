use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod gemini_client;
pub mod http_client;
pub mod rate_limit;
pub mod setup;
pub mod stripe_client;
pub mod stripe_payment_adapter;
pub mod stripe_signature;

pub use error::InfraError;
pub use rate_limit::{RateLimiterTrait, RedisRateLimiter};

pub async fn postgres_persistence(database_url: &str) -> Result<PostgresPersistence, InfraError> {
    let pool = init_db(database_url).await?;
    Ok(PostgresPersistence::new(pool))
}
