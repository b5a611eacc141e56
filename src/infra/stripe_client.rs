use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use super::{InfraError, http_client::build_client};
use crate::app_error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Page size for subscription listings. A customer with more live
/// subscriptions than this is already far outside normal operation.
const LIST_LIMIT: &str = "100";

/// Stripe object ids are prefixed alphanumerics like `cs_test_a1B2`.
fn is_valid_object_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// `{STRIPE_API_BASE}/{segments..}/{id}`, with `id` checked before it
/// becomes a path segment.
fn object_url(segments: &[&str], id: &str) -> AppResult<Url> {
    if !is_valid_object_id(id) {
        return Err(AppError::InvalidInput(format!("Malformed Stripe id: {:?}", id)));
    }
    let mut url = Url::parse(STRIPE_API_BASE)
        .map_err(|e| AppError::Internal(format!("Invalid Stripe base URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Internal("Stripe base URL cannot hold a path".into()))?
        .extend(segments)
        .push(id);
    Ok(url)
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
}

impl StripeClient {
    pub fn new(secret_key: SecretString) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client()?,
            secret_key,
        })
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        request
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Stripe request failed");
                AppError::LedgerUnavailable(format!("Stripe request failed: {}", e))
            })
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(&self, user_id: &str) -> AppResult<StripeCustomer> {
        let params = [("metadata[user_id]", user_id)];
        let response = self
            .send(
                self.client
                    .post(format!("{}/customers", STRIPE_API_BASE))
                    .form(&params),
            )
            .await?;
        self.handle_response(response).await
    }

    /// `None` for unknown ids and for customers deleted in the dashboard.
    pub async fn get_customer(&self, customer_id: &str) -> AppResult<Option<StripeCustomer>> {
        let response = self
            .send(
                self.client.get(object_url(&["customers"], customer_id)?),
            )
            .await?;
        let customer: Option<StripeCustomer> = optional(self.handle_response(response).await)?;
        Ok(customer.filter(|c| !c.deleted))
    }

    // ========================================================================
    // Checkout Sessions
    // ========================================================================

    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams<'_>,
    ) -> AppResult<StripeCheckoutSession> {
        let mut form: Vec<(String, String)> = vec![
            ("customer".to_string(), params.customer_id.to_string()),
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), params.price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), params.success_url.to_string()),
            ("cancel_url".to_string(), params.cancel_url.to_string()),
            (
                "client_reference_id".to_string(),
                params.client_reference_id.to_string(),
            ),
        ];

        // Declared on both objects so later subscription events carry them too.
        for (key, value) in params.metadata {
            form.push((format!("metadata[{}]", key), value.to_string()));
            form.push((
                format!("subscription_data[metadata][{}]", key),
                value.to_string(),
            ));
        }

        let response = self
            .send(
                self.client
                    .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
                    .form(&form),
            )
            .await?;
        self.handle_response(response).await
    }

    pub async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> AppResult<Option<StripeCheckoutSession>> {
        let response = self
            .send(
                self.client
                    .get(object_url(&["checkout", "sessions"], session_id)?),
            )
            .await?;
        optional(self.handle_response(response).await)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// `status` is a Stripe status filter; `"all"` includes ended ones.
    pub async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: &str,
    ) -> AppResult<Vec<StripeSubscription>> {
        let query = [
            ("customer", customer_id),
            ("status", status),
            ("limit", LIST_LIMIT),
        ];
        let response = self
            .send(
                self.client
                    .get(format!("{}/subscriptions", STRIPE_API_BASE))
                    .query(&query),
            )
            .await?;

        let list: StripeSubscriptionList = self.handle_response(response).await?;
        if list.has_more {
            tracing::warn!(
                customer_id = %customer_id,
                "Subscription listing truncated at page limit"
            );
        }
        Ok(list.data)
    }

    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> AppResult<Option<StripeSubscription>> {
        let response = self
            .send(
                self.client
                    .get(object_url(&["subscriptions"], subscription_id)?),
            )
            .await?;
        optional(self.handle_response(response).await)
    }

    /// Cancel immediately. Unknown or already-cancelled subscriptions are Ok.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()> {
        let response = self
            .send(
                self.client
                    .delete(object_url(&["subscriptions"], subscription_id)?),
            )
            .await?;

        match self.handle_response::<StripeSubscription>(response).await {
            Ok(_) | Err(AppError::NotFound) => Ok(()),
            Err(AppError::InvalidInput(msg)) if msg.contains("canceled") => {
                tracing::debug!(subscription_id = %subscription_id, "Subscription already cancelled");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::LedgerUnavailable(format!("Failed to read Stripe response: {}", e))
        })?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Stripe response");
            AppError::Internal(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

/// Map a non-2xx Stripe response onto the ledger error contract.
fn classify_error(status: StatusCode, body: &str) -> AppError {
    let parsed = serde_json::from_str::<StripeErrorResponse>(body).ok();
    let code = parsed.as_ref().and_then(|e| e.error.code.as_deref());

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(status = %status, "Stripe unavailable");
        return AppError::LedgerUnavailable(format!("Stripe returned {}", status));
    }

    if status == StatusCode::NOT_FOUND || code == Some("resource_missing") {
        return AppError::NotFound;
    }

    tracing::error!(status = %status, body = %body, "Stripe API error");
    match parsed {
        Some(error) => AppError::InvalidInput(format!(
            "Stripe error: {}",
            error.error.message.unwrap_or(error.error.error_type)
        )),
        None => AppError::Internal(format!("Stripe API error: {}", status)),
    }
}

fn optional<T>(result: AppResult<T>) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

pub struct CheckoutSessionParams<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub client_reference_id: &'a str,
    pub metadata: &'a [(&'a str, String)],
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub client_reference_id: Option<String>,
    /// `open`, `complete` or `expired`.
    pub status: Option<String>,
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
            || self.payment_status.as_deref() == Some("paid")
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub created: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

impl StripeSubscription {
    /// First price on the subscription.
    pub fn price_id(&self) -> Option<String> {
        self.items.data.first().map(|item| item.price.id.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: StripePrice,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionList {
    pub data: Vec<StripeSubscription>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub code: Option<String>,
}

// ============================================================================
// Webhook Event Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeWebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEventData {
    pub object: serde_json::Value,
}

impl StripeWebhookEvent {
    pub fn get_checkout_session(&self) -> Option<StripeCheckoutSession> {
        serde_json::from_value(self.data.object.clone()).ok()
    }

    pub fn get_subscription(&self) -> Option<StripeSubscription> {
        serde_json::from_value(self.data.object.clone()).ok()
    }
}
