pub mod entitlement;
pub mod plan;
pub mod subscription_state;
pub mod subscription_status;
pub mod resume_analysis;
