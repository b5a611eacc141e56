pub mod analysis;
pub mod credit_ledger;
pub mod entitlement;
pub mod gate;
pub mod monthly_reset;
pub mod resume_history;
pub mod stripe_events;
pub mod subscription;
