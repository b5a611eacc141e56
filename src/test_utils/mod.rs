//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid fixtures
//! - In-memory implementations of the repository and port traits
//! - `TestAppStateBuilder` for exercising routes with `axum-test`

mod app_state_builder;
mod entitlement_mocks;
mod factories;
mod ledger_mocks;
mod resume_analysis_mocks;

pub use app_state_builder::*;
pub use entitlement_mocks::*;
pub use factories::*;
pub use ledger_mocks::*;
pub use resume_analysis_mocks::*;
