//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` is HMAC-SHA256 over `"{t}.{raw body}"` keyed by the endpoint
//! secret. Any matching `v1` within the timestamp tolerance passes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn verify_webhook_signature(
    payload: &str,
    signature_header: &str,
    webhook_secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        AppError::WebhookUnauthenticated("Missing timestamp in signature".into())
    })?;
    if signatures.is_empty() {
        return Err(AppError::WebhookUnauthenticated("Missing signature".into()));
    }

    let expected = compute_signature(timestamp, payload, webhook_secret)?;
    if !signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        return Err(AppError::WebhookUnauthenticated("Invalid signature".into()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::WebhookUnauthenticated("Invalid timestamp".into()))?;
    if (now - ts).abs() > tolerance_secs {
        return Err(AppError::WebhookUnauthenticated(
            "Timestamp outside tolerance".into(),
        ));
    }

    Ok(())
}

fn compute_signature(timestamp: &str, payload: &str, secret: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Header value Stripe would send for `payload` at `timestamp`.
#[cfg(test)]
pub fn sign_webhook_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let ts = timestamp.to_string();
    let sig = compute_signature(&ts, payload, secret).unwrap();
    format!("t={ts},v1={sig}")
}
