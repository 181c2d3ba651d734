//! Payment gateway client
//!
//! The core only needs three outcomes from the provider: charge, confirm
//! and cancel. Webhook callbacks are authenticated with an HMAC-SHA256
//! signature over the raw body.

use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Payment gateway client
#[derive(Clone)]
pub struct PaymentClient {
    client: Client,
    base_url: String,
    api_key: String,
    webhook_secret: String,
}

/// Status of a payment as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

/// A charge initiated at the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub reference: String,
    pub status: PaymentStatus,
    /// URL the customer completes payment at
    pub checkout_url: Option<String>,
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    order_id: Uuid,
    amount: Decimal,
    currency: &'a str,
}

#[derive(Deserialize)]
struct GatewayPaymentResponse {
    reference: String,
    status: PaymentStatus,
    checkout_url: Option<String>,
}

impl PaymentClient {
    /// Create a new PaymentClient from configuration
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Initiate a charge for an order
    pub async fn charge(&self, order_id: Uuid, amount: Decimal) -> AppResult<PaymentIntent> {
        let response = self
            .client
            .post(format!("{}/v1/charges", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChargeRequest {
                order_id,
                amount,
                currency: "THB",
            })
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::PaymentGateway(format!(
                "charge failed with status {}",
                response.status()
            )));
        }

        let body: GatewayPaymentResponse = response
            .json()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

        Ok(PaymentIntent {
            reference: body.reference,
            status: body.status,
            checkout_url: body.checkout_url,
        })
    }

    /// Look up the current status of a charge
    pub async fn confirm(&self, reference: &str) -> AppResult<PaymentStatus> {
        let response = self
            .client
            .get(format!("{}/v1/charges/{}", self.base_url, reference))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::PaymentGateway(format!(
                "status lookup failed with status {}",
                response.status()
            )));
        }

        let body: GatewayPaymentResponse = response
            .json()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

        Ok(body.status)
    }

    /// Cancel a pending charge
    pub async fn cancel(&self, reference: &str) -> AppResult<()> {
        let response = self
            .client
            .post(format!("{}/v1/charges/{}/cancel", self.base_url, reference))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::PaymentGateway(format!(
                "cancel failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Verify a webhook signature (base64 HMAC-SHA256 over the raw body)
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature) else {
            return false;
        };
        mac.verify_slice(&expected).is_ok()
    }
}

/// Webhook payload sent by the gateway on payment state changes
#[derive(Debug, Deserialize)]
pub struct PaymentWebhookEvent {
    pub reference: String,
    pub order_id: Uuid,
    pub status: PaymentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PaymentClient {
        PaymentClient::new(&PaymentConfig {
            base_url: "https://pay.example.com".to_string(),
            api_key: "test-key".to_string(),
            webhook_secret: "topsecret".to_string(),
        })
    }

    #[test]
    fn webhook_signature_round_trip() {
        let body = br#"{"reference":"ch_123","status":"succeeded"}"#;
        let mut mac = HmacSha256::new_from_slice(b"topsecret").unwrap();
        mac.update(body);
        let signature =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        assert!(client().verify_webhook_signature(body, &signature));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let mut mac = HmacSha256::new_from_slice(b"topsecret").unwrap();
        mac.update(b"original");
        let signature =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        assert!(!client().verify_webhook_signature(b"tampered", &signature));
        assert!(!client().verify_webhook_signature(b"original", "not-base64!!"));
    }
}
