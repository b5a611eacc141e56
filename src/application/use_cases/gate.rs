use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::entitlement::UserId,
};

use super::{
    credit_ledger::CreditLedger, entitlement::EntitlementRepoTrait,
    monthly_reset::MonthlyResetPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    InsufficientCredits,
    NoEntitlement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied(DenialReason),
}

/// Admission check run before an analysis starts.
#[derive(Clone)]
pub struct Gate {
    reset: MonthlyResetPolicy,
    ledger: CreditLedger,
}

impl Gate {
    pub fn new(repo: Arc<dyn EntitlementRepoTrait>) -> Self {
        Self {
            reset: MonthlyResetPolicy::new(repo.clone()),
            ledger: CreditLedger::new(repo),
        }
    }

    #[instrument(skip(self))]
    pub async fn admit(&self, user_id: &UserId) -> AppResult<Admission> {
        match self.reset.maybe_reset(user_id).await {
            Ok(_) => {}
            Err(AppError::EntitlementNotFound) => {
                return Ok(Admission::Denied(DenialReason::NoEntitlement));
            }
            Err(e) => return Err(e),
        }

        if self.ledger.check_allowance(user_id).await? {
            Ok(Admission::Allowed)
        } else {
            Ok(Admission::Denied(DenialReason::InsufficientCredits))
        }
    }
}
