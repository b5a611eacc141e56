use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_ledger::{
        CheckoutRequest, CheckoutResult, CheckoutSessionInfo, CheckoutUrls, CustomerId,
        PaymentLedgerPort, SubscriptionId, SubscriptionInfo,
    },
    domain::entities::{
        entitlement::{UserEntitlement, UserId},
        plan::Plan,
        subscription_state::SubscriptionState,
    },
};

use super::entitlement::{
    CreditWrite, EntitlementRepoTrait, EntitlementView, load_or_provision,
};

// ============================================================================
// Plan <-> price mapping
// ============================================================================

/// Configured ledger price for each paid plan.
#[derive(Debug, Clone)]
pub struct PlanPrices {
    pub pro: String,
    pub enterprise: String,
}

impl PlanPrices {
    pub fn price_for(&self, plan: Plan) -> Option<&str> {
        match plan {
            Plan::Free => None,
            Plan::Pro => Some(&self.pro),
            Plan::Enterprise => Some(&self.enterprise),
        }
    }

    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        if price_id == self.pro {
            Some(Plan::Pro)
        } else if price_id == self.enterprise {
            Some(Plan::Enterprise)
        } else {
            None
        }
    }

    /// Price id wins; the `plan` metadata is the fallback. Only paid plans
    /// resolve.
    pub fn resolve(&self, price_id: Option<&str>, plan_metadata: Option<&str>) -> Option<Plan> {
        price_id
            .and_then(|p| self.plan_for_price(p))
            .or_else(|| plan_metadata.and_then(Plan::parse).filter(Plan::is_paid))
    }
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CancellationOutcome {
    pub subscription_id: String,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-subscription results of a cancellation fan-out.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CancellationReport {
    pub outcomes: Vec<CancellationOutcome>,
}

impl CancellationReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.cancelled)
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.cancelled)
            .map(|o| o.subscription_id.as_str())
            .collect()
    }

    pub fn cancelled_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.cancelled)
            .map(|o| o.subscription_id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    Applied {
        entitlement: UserEntitlement,
        report: CancellationReport,
    },
    /// Nothing changed; the reason is logged and returned for diagnostics.
    Ignored(&'static str),
}

impl ReconcileOutcome {
    fn applied(entitlement: UserEntitlement) -> Self {
        ReconcileOutcome::Applied {
            entitlement,
            report: CancellationReport::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionOverview {
    pub entitlement: EntitlementView,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    pub subscriptions: Vec<SubscriptionInfo>,
}

/// Subscriptions to cancel so that at most `keep` stays alive: every
/// non-terminal listed subscription other than `keep`, plus a locally
/// recorded reference the ledger didn't list.
pub fn stale_subscriptions(
    listed: &[SubscriptionInfo],
    keep: Option<&SubscriptionId>,
    local_ref: Option<&str>,
) -> Vec<SubscriptionId> {
    let mut targets: Vec<SubscriptionId> = listed
        .iter()
        .filter(|s| Some(&s.subscription_id) != keep && !s.status.is_terminal())
        .map(|s| s.subscription_id.clone())
        .collect();

    if let Some(local) = local_ref {
        let is_kept = keep.is_some_and(|k| k.as_str() == local);
        let is_listed = listed.iter().any(|s| s.subscription_id.as_str() == local);
        if !is_kept && !is_listed {
            targets.push(SubscriptionId::new(local));
        }
    }
    targets
}

// ============================================================================
// Reconciler
// ============================================================================

/// Keeps local entitlements consistent with the external subscription ledger.
#[derive(Clone)]
pub struct SubscriptionReconciler {
    repo: Arc<dyn EntitlementRepoTrait>,
    ledger: Arc<dyn PaymentLedgerPort>,
    prices: PlanPrices,
    app_origin: String,
}

impl SubscriptionReconciler {
    pub fn new(
        repo: Arc<dyn EntitlementRepoTrait>,
        ledger: Arc<dyn PaymentLedgerPort>,
        prices: PlanPrices,
        app_origin: String,
    ) -> Self {
        Self {
            repo,
            ledger,
            prices,
            app_origin: app_origin.trim_end_matches('/').to_string(),
        }
    }

    fn checkout_urls(&self) -> CheckoutUrls {
        CheckoutUrls {
            success_url: format!(
                "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.app_origin
            ),
            cancel_url: format!("{}/cancel", self.app_origin),
        }
    }

    /// Reuse the stored customer if the ledger still has it, otherwise create
    /// and persist a new one.
    async fn ensure_customer(&self, entitlement: &UserEntitlement) -> AppResult<CustomerId> {
        if let Some(existing) = entitlement.customer_ref.as_deref() {
            let customer = CustomerId::new(existing);
            if self.ledger.customer_exists(&customer).await? {
                return Ok(customer);
            }
            tracing::warn!(
                user_id = %entitlement.user_id,
                customer_id = %customer,
                "Stored customer missing from ledger, creating a new one"
            );
        }
        self.create_customer(&entitlement.user_id).await
    }

    async fn create_customer(&self, user_id: &UserId) -> AppResult<CustomerId> {
        let customer = self.ledger.create_customer(user_id).await?;
        self.repo
            .set_customer_ref(user_id, customer.as_str())
            .await?;
        tracing::info!(user_id = %user_id, customer_id = %customer, "Customer created");
        Ok(customer)
    }

    /// Cancel every target concurrently and collect the individual results.
    async fn cancel_all(&self, targets: Vec<SubscriptionId>) -> CancellationReport {
        if targets.is_empty() {
            return CancellationReport::default();
        }

        let ledger = &self.ledger;
        let outcomes = join_all(targets.into_iter().map(|id| async move {
            match ledger.cancel_subscription(&id).await {
                Ok(()) => {
                    tracing::info!(subscription_id = %id, "Subscription cancelled");
                    CancellationOutcome {
                        subscription_id: id.0,
                        cancelled: true,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(subscription_id = %id, error = %e, "Subscription cancel failed");
                    CancellationOutcome {
                        subscription_id: id.0,
                        cancelled: false,
                        error: Some(e.to_string()),
                    }
                }
            }
        }))
        .await;

        let report = CancellationReport { outcomes };
        if report.has_failures() {
            tracing::warn!(
                failed = ?report.failed_ids(),
                cancelled = ?report.cancelled_ids(),
                "PartialCancellationFailure: some subscriptions could not be cancelled"
            );
        }
        report
    }

    async fn reload(&self, user_id: &UserId) -> AppResult<UserEntitlement> {
        self.repo
            .get(user_id)
            .await?
            .ok_or(AppError::EntitlementNotFound)
    }

    async fn find_for_session(
        &self,
        session: &CheckoutSessionInfo,
    ) -> AppResult<Option<UserEntitlement>> {
        if let Some(user_ref) = session.client_reference_id.as_deref() {
            if let Some(found) = self.repo.get(&UserId::new(user_ref)).await? {
                return Ok(Some(found));
            }
        }
        match &session.customer_id {
            Some(customer) => self.repo.find_by_customer_ref(customer.as_str()).await,
            None => Ok(None),
        }
    }

    fn warn_on_declared_uploads(&self, plan: Plan, subscription: &SubscriptionInfo) {
        let Some(declared) = subscription.uploads_metadata.as_deref() else {
            return;
        };
        if declared.trim().parse::<i32>().ok() != Some(plan.allotment()) {
            tracing::warn!(
                subscription_id = %subscription.subscription_id,
                plan = %plan,
                declared,
                allotment = plan.allotment(),
                "Declared uploads disagree with plan allotment, using allotment"
            );
        }
    }

    // ------------------------------------------------------------------------
    // Initiate checkout: Free|Active -> Pending
    // ------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn initiate_checkout(
        &self,
        user_id: &UserId,
        plan: Plan,
    ) -> AppResult<CheckoutResult> {
        let price_id = self
            .prices
            .price_for(plan)
            .ok_or_else(|| AppError::InvalidInput("Free plan needs no checkout".into()))?
            .to_string();

        let entitlement = load_or_provision(self.repo.as_ref(), user_id).await?;
        if entitlement.plan == plan
            && entitlement.subscription_ref.is_some()
            && matches!(
                entitlement.state,
                SubscriptionState::Active | SubscriptionState::Pending
            )
        {
            return Err(AppError::InvalidInput(format!(
                "Already subscribed to {}",
                plan
            )));
        }

        let customer = self.ensure_customer(&entitlement).await?;
        let mut request = CheckoutRequest {
            customer,
            user_id: user_id.clone(),
            plan,
            price_id,
            urls: self.checkout_urls(),
        };

        let checkout = match self.ledger.create_checkout(&request).await {
            Ok(c) => c,
            Err(AppError::NotFound) => {
                tracing::warn!(
                    user_id = %user_id,
                    customer_id = %request.customer,
                    "Ledger rejected customer during checkout, retrying with a new one"
                );
                request.customer = self.create_customer(user_id).await?;
                self.ledger.create_checkout(&request).await?
            }
            Err(e) => return Err(e),
        };

        let mut current = self.reload(user_id).await?;
        current.customer_ref = Some(request.customer.0.clone());
        current.begin_checkout(&checkout.session_id);
        self.repo.save(&current, CreditWrite::Keep).await?;

        tracing::info!(
            user_id = %user_id,
            plan = %plan,
            session_id = %checkout.session_id,
            "Checkout initiated"
        );
        Ok(checkout)
    }

    // ------------------------------------------------------------------------
    // Checkout completion: -> Active(new)
    // ------------------------------------------------------------------------

    /// Synchronous confirmation from the success page. Applies the same
    /// transition as the webhook.
    #[instrument(skip(self))]
    pub async fn confirm_checkout(
        &self,
        user_id: &UserId,
        session_id: &str,
    ) -> AppResult<ReconcileOutcome> {
        let session = self
            .ledger
            .get_checkout_session(session_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if session.client_reference_id.as_deref() != Some(user_id.as_str()) {
            return Err(AppError::NotFound);
        }
        if !session.complete {
            return Err(AppError::InvalidInput("Checkout is not complete".into()));
        }

        self.complete_checkout(&session).await
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn complete_checkout(
        &self,
        session: &CheckoutSessionInfo,
    ) -> AppResult<ReconcileOutcome> {
        let Some(subscription_id) = session.subscription_id.clone() else {
            return Ok(ReconcileOutcome::Ignored("checkout without subscription"));
        };

        let Some(entitlement) = self.find_for_session(session).await? else {
            tracing::warn!(
                client_reference_id = ?session.client_reference_id,
                customer_id = ?session.customer_id,
                "Completed checkout matches no user"
            );
            return Ok(ReconcileOutcome::Ignored("no matching user"));
        };
        let user_id = entitlement.user_id.clone();

        let subscription = self
            .ledger
            .get_subscription(&subscription_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if subscription.status.is_terminal() {
            tracing::info!(
                user_id = %user_id,
                subscription_id = %subscription_id,
                status = %subscription.status,
                "Completed checkout refers to an ended subscription"
            );
            return Ok(ReconcileOutcome::Ignored("subscription already ended"));
        }

        let plan_metadata = subscription
            .plan_metadata
            .as_deref()
            .or(session.plan_metadata.as_deref());
        let Some(plan) = self
            .prices
            .resolve(subscription.price_id.as_deref(), plan_metadata)
        else {
            tracing::error!(
                user_id = %user_id,
                subscription_id = %subscription_id,
                price_id = ?subscription.price_id,
                "No plan for subscription price"
            );
            return Ok(ReconcileOutcome::Ignored("unresolvable plan"));
        };
        self.warn_on_declared_uploads(plan, &subscription);

        // Every status, so drift between the local record and the ledger is seen.
        let customer = subscription.customer_id.clone();
        let listed = self.ledger.list_subscriptions(&customer, None).await?;
        let targets = stale_subscriptions(
            &listed,
            Some(&subscription_id),
            entitlement.subscription_ref.as_deref(),
        );

        // Record the new subscription before cancelling the old ones, so their
        // deletion webhooks arrive as stale.
        let mut current = self.reload(&user_id).await?;
        let refilled = current.activate(plan, subscription_id.as_str(), customer.as_str());
        if subscription.cancel_at_period_end {
            current.state = SubscriptionState::Cancelling;
        }
        let saved = self
            .repo
            .save(&current, CreditWrite::refill_if(refilled))
            .await?;

        let report = self.cancel_all(targets).await;

        tracing::info!(
            user_id = %user_id,
            plan = %plan,
            subscription_id = %subscription_id,
            credits = saved.credits,
            "Checkout completed"
        );
        Ok(ReconcileOutcome::Applied {
            entitlement: saved,
            report,
        })
    }

    // ------------------------------------------------------------------------
    // Explicit downgrade: Active -> Free
    // ------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn downgrade_to_free(
        &self,
        user_id: &UserId,
    ) -> AppResult<(UserEntitlement, CancellationReport)> {
        let entitlement = load_or_provision(self.repo.as_ref(), user_id).await?;

        let listed = match entitlement.customer_ref.as_deref() {
            Some(customer) => {
                self.ledger
                    .list_subscriptions(&CustomerId::new(customer), None)
                    .await?
            }
            None => Vec::new(),
        };
        let targets =
            stale_subscriptions(&listed, None, entitlement.subscription_ref.as_deref());

        let mut current = self.reload(user_id).await?;
        let credits = if current.plan.is_paid() || current.subscription_ref.is_some() {
            current.reset_to_free();
            CreditWrite::Refill
        } else {
            // Already free: don't touch the counter.
            current.abandon_checkout();
            CreditWrite::Keep
        };
        let saved = self.repo.save(&current, credits).await?;

        let report = self.cancel_all(targets).await;

        tracing::info!(
            user_id = %user_id,
            cancelled = report.cancelled_ids().len(),
            failed = report.failed_ids().len(),
            "Downgraded to free"
        );
        Ok((saved, report))
    }

    // ------------------------------------------------------------------------
    // Webhook-driven transitions
    // ------------------------------------------------------------------------

    /// Plan change, status change or pending cancellation reported by the ledger.
    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.subscription_id))]
    pub async fn apply_subscription_updated(
        &self,
        subscription: &SubscriptionInfo,
    ) -> AppResult<ReconcileOutcome> {
        if subscription.status.is_terminal() {
            return self.apply_subscription_deleted(subscription).await;
        }

        let Some(mut entitlement) = self
            .repo
            .find_by_customer_ref(subscription.customer_id.as_str())
            .await?
        else {
            tracing::warn!(customer_id = %subscription.customer_id, "Update for unknown customer");
            return Ok(ReconcileOutcome::Ignored("unknown customer"));
        };

        if entitlement.subscription_ref.as_deref() != Some(subscription.subscription_id.as_str())
        {
            tracing::debug!(
                user_id = %entitlement.user_id,
                recorded = ?entitlement.subscription_ref,
                "Update for a subscription that is not the recorded one"
            );
            return Ok(ReconcileOutcome::Ignored("stale subscription"));
        }

        if !subscription.status.grants_access() {
            tracing::info!(
                user_id = %entitlement.user_id,
                status = %subscription.status,
                "Subscription status without access, waiting for deletion"
            );
            return Ok(ReconcileOutcome::Ignored("status without access"));
        }

        let Some(plan) = self.prices.resolve(
            subscription.price_id.as_deref(),
            subscription.plan_metadata.as_deref(),
        ) else {
            tracing::error!(
                user_id = %entitlement.user_id,
                price_id = ?subscription.price_id,
                "No plan for updated subscription price"
            );
            return Ok(ReconcileOutcome::Ignored("unresolvable plan"));
        };
        self.warn_on_declared_uploads(plan, subscription);

        let refilled = entitlement.change_plan(plan);
        if entitlement.state != SubscriptionState::Pending {
            entitlement.state = if subscription.cancel_at_period_end {
                SubscriptionState::Cancelling
            } else {
                SubscriptionState::Active
            };
        }
        let saved = self
            .repo
            .save(&entitlement, CreditWrite::refill_if(refilled))
            .await?;

        tracing::info!(
            user_id = %saved.user_id,
            plan = %plan,
            state = %saved.state,
            "Subscription update applied"
        );
        Ok(ReconcileOutcome::applied(saved))
    }

    /// Cancellation or expiry reported by the ledger: back to the free tier.
    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.subscription_id))]
    pub async fn apply_subscription_deleted(
        &self,
        subscription: &SubscriptionInfo,
    ) -> AppResult<ReconcileOutcome> {
        let Some(mut entitlement) = self
            .repo
            .find_by_customer_ref(subscription.customer_id.as_str())
            .await?
        else {
            tracing::warn!(customer_id = %subscription.customer_id, "Deletion for unknown customer");
            return Ok(ReconcileOutcome::Ignored("unknown customer"));
        };

        if entitlement.subscription_ref.as_deref() != Some(subscription.subscription_id.as_str())
        {
            return Ok(ReconcileOutcome::Ignored("stale subscription"));
        }

        entitlement.reset_to_free();
        let saved = self.repo.save(&entitlement, CreditWrite::Refill).await?;

        tracing::info!(user_id = %saved.user_id, "Subscription ended, back to free");
        Ok(ReconcileOutcome::applied(saved))
    }

    /// Expired checkout session: leave `Pending` for the prior state.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn abandon_checkout(
        &self,
        session: &CheckoutSessionInfo,
    ) -> AppResult<ReconcileOutcome> {
        let Some(mut entitlement) = self.find_for_session(session).await? else {
            return Ok(ReconcileOutcome::Ignored("no matching user"));
        };

        if entitlement.pending_checkout.as_deref() != Some(session.session_id.as_str()) {
            return Ok(ReconcileOutcome::Ignored("not the pending checkout"));
        }

        entitlement.abandon_checkout();
        let saved = self.repo.save(&entitlement, CreditWrite::Keep).await?;
        tracing::info!(user_id = %saved.user_id, state = %saved.state, "Checkout abandoned");
        Ok(ReconcileOutcome::applied(saved))
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    pub async fn subscription_overview(&self, user_id: &UserId) -> AppResult<SubscriptionOverview> {
        let entitlement = self
            .repo
            .get(user_id)
            .await?
            .ok_or(AppError::EntitlementNotFound)?;

        let subscriptions = match entitlement.customer_ref.as_deref() {
            Some(customer) => {
                self.ledger
                    .list_subscriptions(&CustomerId::new(customer), None)
                    .await?
            }
            None => Vec::new(),
        };

        Ok(SubscriptionOverview {
            entitlement: EntitlementView::from(&entitlement),
            customer_ref: entitlement.customer_ref,
            subscription_ref: entitlement.subscription_ref,
            subscriptions,
        })
    }
}
