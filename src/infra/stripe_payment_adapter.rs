use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;

use crate::{
    app_error::AppResult,
    application::ports::payment_ledger::{
        CheckoutRequest, CheckoutResult, CheckoutSessionInfo, CustomerId, PaymentLedgerPort,
        SubscriptionId, SubscriptionInfo,
    },
    domain::entities::{entitlement::UserId, subscription_status::SubscriptionStatus},
    infra::{
        InfraError,
        stripe_client::{
            CheckoutSessionParams, StripeCheckoutSession, StripeClient, StripeSubscription,
        },
    },
};

/// `PaymentLedgerPort` backed by the Stripe REST API.
#[derive(Clone)]
pub struct StripePaymentAdapter {
    client: StripeClient,
}

impl StripePaymentAdapter {
    pub fn new(secret_key: SecretString) -> Result<Self, InfraError> {
        Ok(Self {
            client: StripeClient::new(secret_key)?,
        })
    }

    fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(ts, 0).single()
    }
}

pub fn subscription_info(sub: StripeSubscription) -> SubscriptionInfo {
    let price_id = sub.price_id();
    let mut metadata = sub.metadata;
    SubscriptionInfo {
        subscription_id: SubscriptionId::new(sub.id),
        customer_id: CustomerId::new(sub.customer),
        status: SubscriptionStatus::from_stripe(&sub.status),
        price_id,
        cancel_at_period_end: sub.cancel_at_period_end,
        plan_metadata: metadata.remove("plan"),
        uploads_metadata: metadata.remove("uploads"),
        created_at: sub
            .created
            .and_then(StripePaymentAdapter::timestamp_to_datetime),
    }
}

pub fn checkout_session_info(session: StripeCheckoutSession) -> CheckoutSessionInfo {
    let complete = session.is_complete();
    let mut metadata = session.metadata;
    CheckoutSessionInfo {
        session_id: session.id,
        customer_id: session.customer.map(CustomerId::new),
        subscription_id: session.subscription.map(SubscriptionId::new),
        client_reference_id: session.client_reference_id,
        complete,
        plan_metadata: metadata.remove("plan"),
    }
}

#[async_trait]
impl PaymentLedgerPort for StripePaymentAdapter {
    async fn create_customer(&self, user_id: &UserId) -> AppResult<CustomerId> {
        let customer = self.client.create_customer(user_id.as_str()).await?;
        tracing::info!(user_id = %user_id, customer_id = %customer.id, "Created Stripe customer");
        Ok(CustomerId::new(customer.id))
    }

    async fn customer_exists(&self, customer: &CustomerId) -> AppResult<bool> {
        Ok(self.client.get_customer(customer.as_str()).await?.is_some())
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<CheckoutResult> {
        let metadata = [
            ("plan", request.plan.as_str().to_string()),
            ("uploads", request.plan.allotment().to_string()),
        ];
        let session = self
            .client
            .create_checkout_session(&CheckoutSessionParams {
                customer_id: request.customer.as_str(),
                price_id: &request.price_id,
                success_url: &request.urls.success_url,
                cancel_url: &request.urls.cancel_url,
                client_reference_id: request.user_id.as_str(),
                metadata: &metadata,
            })
            .await?;

        Ok(CheckoutResult {
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> AppResult<Option<CheckoutSessionInfo>> {
        Ok(self
            .client
            .get_checkout_session(session_id)
            .await?
            .map(checkout_session_info))
    }

    async fn list_subscriptions(
        &self,
        customer: &CustomerId,
        status: Option<SubscriptionStatus>,
    ) -> AppResult<Vec<SubscriptionInfo>> {
        let filter = status.map_or("all", |s| s.as_str());
        let subs = self
            .client
            .list_subscriptions(customer.as_str(), filter)
            .await?;
        Ok(subs.into_iter().map(subscription_info).collect())
    }

    async fn cancel_subscription(&self, subscription_id: &SubscriptionId) -> AppResult<()> {
        self.client
            .cancel_subscription(subscription_id.as_str())
            .await
    }

    async fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<Option<SubscriptionInfo>> {
        Ok(self
            .client
            .get_subscription(subscription_id.as_str())
            .await?
            .map(subscription_info))
    }
}
