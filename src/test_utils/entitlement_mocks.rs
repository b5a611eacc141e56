//! In-memory implementations for the entitlement store, webhook event log,
//! rate limiter and analyzer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::analyzer::ResumeAnalyzer,
        use_cases::{
            entitlement::{ConsumeOutcome, CreditWrite, EntitlementRepoTrait},
            stripe_events::StripeEventRepoTrait,
        },
    },
    domain::entities::{
        entitlement::{UserEntitlement, UserId},
        plan::{Plan, UNLIMITED_CREDITS},
    },
    infra::RateLimiterTrait,
};

// ============================================================================
// InMemoryEntitlementRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryEntitlementRepo {
    pub entitlements: Mutex<HashMap<String, UserEntitlement>>,
    /// Every call fails with a database error.
    pub broken: bool,
}

impl InMemoryEntitlementRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entitlements(entitlements: Vec<UserEntitlement>) -> Self {
        let map = entitlements
            .into_iter()
            .map(|e| (e.user_id.0.clone(), e))
            .collect();
        Self {
            entitlements: Mutex::new(map),
            broken: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    fn check(&self) -> AppResult<()> {
        if self.broken {
            return Err(AppError::Database("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EntitlementRepoTrait for InMemoryEntitlementRepo {
    async fn get(&self, user_id: &UserId) -> AppResult<Option<UserEntitlement>> {
        self.check()?;
        Ok(self
            .entitlements
            .lock()
            .unwrap()
            .get(user_id.as_str())
            .cloned())
    }

    async fn create_default(&self, initial: &UserEntitlement) -> AppResult<UserEntitlement> {
        self.check()?;
        Ok(self
            .entitlements
            .lock()
            .unwrap()
            .entry(initial.user_id.0.clone())
            .or_insert_with(|| initial.clone())
            .clone())
    }

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> AppResult<Option<UserEntitlement>> {
        self.check()?;
        Ok(self
            .entitlements
            .lock()
            .unwrap()
            .values()
            .find(|e| e.customer_ref.as_deref() == Some(customer_ref))
            .cloned())
    }

    async fn set_customer_ref(&self, user_id: &UserId, customer_ref: &str) -> AppResult<()> {
        self.check()?;
        let mut map = self.entitlements.lock().unwrap();
        let entitlement = map
            .get_mut(user_id.as_str())
            .ok_or(AppError::EntitlementNotFound)?;
        entitlement.customer_ref = Some(customer_ref.to_string());
        Ok(())
    }

    async fn save(
        &self,
        entitlement: &UserEntitlement,
        credits: CreditWrite,
    ) -> AppResult<UserEntitlement> {
        self.check()?;
        let mut map = self.entitlements.lock().unwrap();
        let mut next = entitlement.clone();
        if let Some(stored) = map.get(entitlement.user_id.as_str()) {
            next.last_reset = stored.last_reset;
            if credits == CreditWrite::Keep {
                next.credits = stored.credits;
            }
        }
        map.insert(next.user_id.0.clone(), next.clone());
        Ok(next)
    }

    async fn consume_credit(&self, user_id: &UserId) -> AppResult<ConsumeOutcome> {
        self.check()?;
        let mut map = self.entitlements.lock().unwrap();
        let Some(entitlement) = map.get_mut(user_id.as_str()) else {
            return Ok(ConsumeOutcome::Missing);
        };
        Ok(match entitlement.credits {
            UNLIMITED_CREDITS => ConsumeOutcome::Unlimited,
            c if c > 0 => {
                entitlement.credits -= 1;
                ConsumeOutcome::Consumed {
                    remaining: entitlement.credits,
                }
            }
            _ => ConsumeOutcome::Exhausted,
        })
    }

    async fn reset_credits(
        &self,
        user_id: &UserId,
        expected_last_reset: Option<DateTime<Utc>>,
        expected_plan: Plan,
        credits: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.check()?;
        let mut map = self.entitlements.lock().unwrap();
        match map.get_mut(user_id.as_str()) {
            Some(e) if e.last_reset == expected_last_reset && e.plan == expected_plan => {
                e.credits = credits;
                e.last_reset = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// InterleavingEntitlementRepo
// ============================================================================

type StoredEdit = Box<dyn FnOnce(&mut UserEntitlement) + Send>;

/// Wraps an `InMemoryEntitlementRepo` and lets a test commit a competing
/// write between a caller's read and its next `save` or `reset_credits`.
pub struct InterleavingEntitlementRepo {
    pub inner: Arc<InMemoryEntitlementRepo>,
    before_save: Mutex<Option<(UserId, StoredEdit)>>,
    before_reset: Mutex<Option<(UserId, StoredEdit)>>,
}

impl InterleavingEntitlementRepo {
    pub fn new(inner: Arc<InMemoryEntitlementRepo>) -> Self {
        Self {
            inner,
            before_save: Mutex::new(None),
            before_reset: Mutex::new(None),
        }
    }

    /// Apply `edit` to the stored record right before the next `save`.
    pub fn before_next_save(
        &self,
        user_id: &UserId,
        edit: impl FnOnce(&mut UserEntitlement) + Send + 'static,
    ) {
        *self.before_save.lock().unwrap() = Some((user_id.clone(), Box::new(edit)));
    }

    /// Apply `edit` to the stored record right before the next `reset_credits`.
    pub fn before_next_reset(
        &self,
        user_id: &UserId,
        edit: impl FnOnce(&mut UserEntitlement) + Send + 'static,
    ) {
        *self.before_reset.lock().unwrap() = Some((user_id.clone(), Box::new(edit)));
    }

    fn run(&self, slot: &Mutex<Option<(UserId, StoredEdit)>>) {
        let Some((user_id, edit)) = slot.lock().unwrap().take() else {
            return;
        };
        let mut map = self.inner.entitlements.lock().unwrap();
        if let Some(stored) = map.get_mut(user_id.as_str()) {
            edit(stored);
        }
    }
}

#[async_trait]
impl EntitlementRepoTrait for InterleavingEntitlementRepo {
    async fn get(&self, user_id: &UserId) -> AppResult<Option<UserEntitlement>> {
        self.inner.get(user_id).await
    }

    async fn create_default(&self, initial: &UserEntitlement) -> AppResult<UserEntitlement> {
        self.inner.create_default(initial).await
    }

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> AppResult<Option<UserEntitlement>> {
        self.inner.find_by_customer_ref(customer_ref).await
    }

    async fn set_customer_ref(&self, user_id: &UserId, customer_ref: &str) -> AppResult<()> {
        self.inner.set_customer_ref(user_id, customer_ref).await
    }

    async fn save(
        &self,
        entitlement: &UserEntitlement,
        credits: CreditWrite,
    ) -> AppResult<UserEntitlement> {
        self.run(&self.before_save);
        self.inner.save(entitlement, credits).await
    }

    async fn consume_credit(&self, user_id: &UserId) -> AppResult<ConsumeOutcome> {
        self.inner.consume_credit(user_id).await
    }

    async fn reset_credits(
        &self,
        user_id: &UserId,
        expected_last_reset: Option<DateTime<Utc>>,
        expected_plan: Plan,
        credits: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.run(&self.before_reset);
        self.inner
            .reset_credits(user_id, expected_last_reset, expected_plan, credits, now)
            .await
    }
}

// ============================================================================
// InMemoryStripeEventRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryStripeEventRepo {
    pub events: Mutex<HashSet<String>>,
}

impl InMemoryStripeEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processed(ids: &[&str]) -> Self {
        Self {
            events: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.events.lock().unwrap().contains(event_id)
    }
}

#[async_trait]
impl StripeEventRepoTrait for InMemoryStripeEventRepo {
    async fn is_processed(&self, event_id: &str) -> AppResult<bool> {
        Ok(self.contains(event_id))
    }

    async fn mark_processed(&self, event_id: &str, _event_type: &str) -> AppResult<()> {
        self.events.lock().unwrap().insert(event_id.to_string());
        Ok(())
    }
}

// ============================================================================
// InMemoryRateLimiter
// ============================================================================

pub struct InMemoryRateLimiter {
    limit: u64,
    counts: Mutex<HashMap<String, u64>>,
}

impl InMemoryRateLimiter {
    pub fn permissive() -> Self {
        Self::with_limit(u64::MAX)
    }

    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit,
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn bump(&self, key: String) -> AppResult<()> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        if *count > self.limit {
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, ip: &str, user_id: Option<&str>) -> AppResult<()> {
        self.bump(format!("rate:ip:{ip}"))?;
        if let Some(user) = user_id {
            self.bump(format!("rate:user:{user}"))?;
        }
        Ok(())
    }
}

// ============================================================================
// StubAnalyzer
// ============================================================================

pub struct StubAnalyzer {
    fail: bool,
    calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResumeAnalyzer for StubAnalyzer {
    async fn analyze(&self, _resume_text: &str) -> AppResult<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::AnalysisFailed("model returned no content".into()));
        }
        Ok(json!({
            "score": 78,
            "title": "Software Engineer",
            "summary": "Solid resume.",
        }))
    }
}
