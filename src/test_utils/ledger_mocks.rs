//! In-memory payment ledger with failure injection.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_ledger::{
        CheckoutRequest, CheckoutResult, CheckoutSessionInfo, CustomerId, PaymentLedgerPort,
        SubscriptionId, SubscriptionInfo,
    },
    domain::entities::{entitlement::UserId, subscription_status::SubscriptionStatus},
};

#[derive(Default)]
struct LedgerState {
    customers: HashSet<String>,
    /// Listed by `list_subscriptions`, in insertion order.
    subscriptions: Vec<SubscriptionInfo>,
    /// Retrievable and cancellable, but never listed.
    hidden: Vec<SubscriptionInfo>,
    sessions: HashMap<String, CheckoutSessionInfo>,
    checkout_requests: Vec<CheckoutRequest>,
    cancelled: Vec<String>,
    created_customers: usize,
    next_id: usize,
}

#[derive(Default)]
pub struct InMemoryPaymentLedger {
    state: Mutex<LedgerState>,
    unavailable: bool,
    fail_listing: bool,
    fail_cancel: HashSet<String>,
    reject_checkout_for: HashSet<String>,
}

fn timeout_error() -> AppError {
    AppError::LedgerUnavailable("ledger request timed out".into())
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(self, customer: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .customers
            .insert(customer.to_string());
        self
    }

    pub fn with_subscriptions(self, subscriptions: Vec<SubscriptionInfo>) -> Self {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .extend(subscriptions);
        self
    }

    pub fn with_hidden_subscription(self, subscription: SubscriptionInfo) -> Self {
        self.state.lock().unwrap().hidden.push(subscription);
        self
    }

    pub fn with_checkout_session(self, session: CheckoutSessionInfo) -> Self {
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(session.session_id.clone(), session);
        self
    }

    /// Every call fails as if the ledger were unreachable.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn fail_cancel_for(mut self, subscription_id: &str) -> Self {
        self.fail_cancel.insert(subscription_id.to_string());
        self
    }

    /// Checkout creation reports the customer as missing.
    pub fn reject_checkout_for_customer(mut self, customer: &str) -> Self {
        self.reject_checkout_for.insert(customer.to_string());
        self
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.state.lock().unwrap().checkout_requests.clone()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    pub fn created_customer_count(&self) -> usize {
        self.state.lock().unwrap().created_customers
    }

    pub fn subscriptions_for(&self, customer: &str) -> Vec<SubscriptionInfo> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| s.customer_id.as_str() == customer)
            .cloned()
            .collect()
    }

    fn check(&self) -> AppResult<()> {
        if self.unavailable {
            return Err(timeout_error());
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentLedgerPort for InMemoryPaymentLedger {
    async fn create_customer(&self, _user_id: &UserId) -> AppResult<CustomerId> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.created_customers += 1;
        let id = format!("cus_test_{}", state.next_id);
        state.customers.insert(id.clone());
        Ok(CustomerId::new(id))
    }

    async fn customer_exists(&self, customer: &CustomerId) -> AppResult<bool> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .contains(customer.as_str()))
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<CheckoutResult> {
        self.check()?;
        if self.reject_checkout_for.contains(request.customer.as_str()) {
            return Err(AppError::NotFound);
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let session_id = format!("cs_test_{}", state.next_id);
        state.checkout_requests.push(request.clone());
        Ok(CheckoutResult {
            checkout_url: Some(format!("https://checkout.test/{session_id}")),
            session_id,
        })
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> AppResult<Option<CheckoutSessionInfo>> {
        self.check()?;
        Ok(self.state.lock().unwrap().sessions.get(session_id).cloned())
    }

    async fn list_subscriptions(
        &self,
        customer: &CustomerId,
        status: Option<SubscriptionStatus>,
    ) -> AppResult<Vec<SubscriptionInfo>> {
        self.check()?;
        if self.fail_listing {
            return Err(timeout_error());
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| &s.customer_id == customer)
            .filter(|s| status.is_none_or(|st| s.status == st))
            .cloned()
            .collect())
    }

    async fn cancel_subscription(&self, subscription_id: &SubscriptionId) -> AppResult<()> {
        self.check()?;
        if self.fail_cancel.contains(subscription_id.as_str()) {
            return Err(timeout_error());
        }
        let mut state = self.state.lock().unwrap();
        let LedgerState {
            subscriptions,
            hidden,
            cancelled,
            ..
        } = &mut *state;
        for sub in subscriptions.iter_mut().chain(hidden.iter_mut()) {
            if &sub.subscription_id == subscription_id {
                sub.status = SubscriptionStatus::Canceled;
            }
        }
        cancelled.push(subscription_id.0.clone());
        Ok(())
    }

    async fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<Option<SubscriptionInfo>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .chain(state.hidden.iter())
            .find(|s| &s.subscription_id == subscription_id)
            .cloned())
    }
}
