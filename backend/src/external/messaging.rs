//! Messaging gateway client for customer notifications (SMS/WhatsApp)
//!
//! Delivery is best-effort: order processing never fails because a text
//! could not be sent. The client is optional and disabled when no API token
//! is configured.

use reqwest::Client;
use serde::Serialize;

use crate::config::MessagingConfig;
use crate::error::{AppError, AppResult};

/// Messaging gateway client
#[derive(Clone)]
pub struct MessagingClient {
    client: Client,
    base_url: String,
    api_token: String,
    sender_id: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    body: &'a str,
}

impl MessagingClient {
    /// Build a client from configuration; returns None when disabled
    pub fn from_config(config: &MessagingConfig) -> Option<Self> {
        if config.api_token.is_empty() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            sender_id: config.sender_id.clone(),
        })
    }

    /// Send a text message to a customer phone number
    pub async fn send_text(&self, to: &str, body: &str) -> AppResult<()> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&SendMessageRequest {
                from: &self.sender_id,
                to,
                body,
            })
            .send()
            .await
            .map_err(|e| AppError::MessagingGateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::MessagingGateway(format!(
                "send failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Order confirmation text sent after successful payment
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order_short_id: &str,
        total_weight_kg: &str,
    ) -> AppResult<()> {
        let body = format!(
            "Your order {} is confirmed: {} kg of fresh produce is on its way. Thank you!",
            order_short_id, total_weight_kg
        );
        self.send_text(to, &body).await
    }
}
