//! SMS and WhatsApp delivery of invitation links.
//!
//! Supports two providers:
//! - `console`: logs the message and reports it delivered (development)
//! - `http`: posts to a messaging gateway with a bearer API key
//!
//! Dispatchers never return errors to the caller. Every failure is folded
//! into the [`DeliveryReceipt`] so that a failed send can never undo an
//! invitation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::models::DeliveryChannel;
use domain::services::{DeliveryReceipt, MessageDispatcher};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MessagingConfig;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Unknown messaging provider: {0}")]
    UnknownProvider(String),

    #[error("Messaging provider not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Builds the dispatcher selected by `messaging.provider`.
///
/// A disabled messaging section falls back to the console provider.
pub fn build_dispatcher(config: &MessagingConfig) -> Result<Arc<dyn MessageDispatcher>, MessagingError> {
    if !config.enabled {
        info!("Messaging disabled, invitation links will only be logged");
        return Ok(Arc::new(ConsoleMessageDispatcher));
    }

    match config.provider.as_str() {
        "console" => Ok(Arc::new(ConsoleMessageDispatcher)),
        "http" => Ok(Arc::new(HttpMessageDispatcher::new(config)?)),
        other => Err(MessagingError::UnknownProvider(other.to_string())),
    }
}

/// Keeps the last four digits only.
fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let visible: String = digits.iter().skip(digits.len().saturating_sub(4)).collect();
    format!("***{}", visible)
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMessageDispatcher;

impl ConsoleMessageDispatcher {
    fn log(&self, channel: DeliveryChannel, phone: &str, text: &str) -> DeliveryReceipt {
        let message_id = format!("console-{}", Uuid::new_v4());
        info!(
            channel = %channel,
            to = %mask_phone(phone),
            message_id = %message_id,
            length = text.chars().count(),
            "Invitation message (console provider)"
        );
        debug!(text = %text, "Console message body");
        DeliveryReceipt::delivered(message_id)
    }
}

#[async_trait]
impl MessageDispatcher for ConsoleMessageDispatcher {
    async fn send_sms(&self, phone: &str, text: &str) -> DeliveryReceipt {
        self.log(DeliveryChannel::Sms, phone, text)
    }

    async fn send_whatsapp(&self, phone: &str, text: &str) -> DeliveryReceipt {
        self.log(DeliveryChannel::WhatsApp, phone, text)
    }
}

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    channel: DeliveryChannel,
    to: &'a str,
    from: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Sends through an HTTP messaging gateway.
pub struct HttpMessageDispatcher {
    client: Client,
    endpoint: String,
    api_key: String,
    sender_id: String,
}

impl HttpMessageDispatcher {
    pub fn new(config: &MessagingConfig) -> Result<Self, MessagingError> {
        if config.api_url.trim().is_empty() {
            return Err(MessagingError::NotConfigured(
                "messaging.api_url is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/messages", config.api_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
        })
    }

    async fn post(&self, channel: DeliveryChannel, phone: &str, text: &str) -> DeliveryReceipt {
        let body = GatewayRequest {
            channel,
            to: phone,
            from: &self.sender_id,
            text,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    "Messaging gateway timed out".to_string()
                } else {
                    format!("Messaging gateway unreachable: {}", e)
                };
                warn!(channel = %channel, to = %mask_phone(phone), error = %error, "Message not sent");
                return DeliveryReceipt::failed(error);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(
                channel = %channel,
                to = %mask_phone(phone),
                status = status.as_u16(),
                "Messaging gateway rejected message"
            );
            return DeliveryReceipt::failed(format!("Gateway returned {}: {}", status, detail));
        }

        match response.json::<GatewayResponse>().await {
            Ok(GatewayResponse {
                message_id: Some(id),
                ..
            }) => {
                debug!(channel = %channel, message_id = %id, "Message accepted by gateway");
                DeliveryReceipt::delivered(id)
            }
            Ok(GatewayResponse { error, .. }) => DeliveryReceipt::failed(
                error.unwrap_or_else(|| "Gateway response missing message_id".to_string()),
            ),
            Err(e) => DeliveryReceipt::failed(format!("Invalid gateway response: {}", e)),
        }
    }
}

#[async_trait]
impl MessageDispatcher for HttpMessageDispatcher {
    async fn send_sms(&self, phone: &str, text: &str) -> DeliveryReceipt {
        self.post(DeliveryChannel::Sms, phone, text).await
    }

    async fn send_whatsapp(&self, phone: &str, text: &str) -> DeliveryReceipt {
        self.post(DeliveryChannel::WhatsApp, phone, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, provider: &str, api_url: &str) -> MessagingConfig {
        MessagingConfig {
            enabled,
            provider: provider.to_string(),
            api_url: api_url.to_string(),
            ..MessagingConfig::default()
        }
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+90 555 686 6386"), "***6386");
        assert_eq!(mask_phone("12"), "***12");
    }

    #[tokio::test]
    async fn test_console_dispatcher_reports_delivered() {
        let receipt = ConsoleMessageDispatcher
            .send(DeliveryChannel::WhatsApp, "05556866386", "hello")
            .await;
        assert!(receipt.success);
        assert!(receipt
            .provider_message_id
            .as_deref()
            .is_some_and(|id| id.starts_with("console-")));
    }

    #[test]
    fn test_build_dispatcher_selects_provider() {
        assert!(build_dispatcher(&config(false, "http", "")).is_ok());
        assert!(build_dispatcher(&config(true, "console", "")).is_ok());
        assert!(build_dispatcher(&config(true, "http", "http://localhost:9000")).is_ok());
        assert!(matches!(
            build_dispatcher(&config(true, "http", "")),
            Err(MessagingError::NotConfigured(_))
        ));
        assert!(matches!(
            build_dispatcher(&config(true, "pigeon", "")),
            Err(MessagingError::UnknownProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_yields_failed_receipt() {
        let dispatcher = HttpMessageDispatcher::new(&MessagingConfig {
            timeout_ms: 500,
            ..config(true, "http", "http://127.0.0.1:9")
        })
        .unwrap();
        let receipt = dispatcher.send_sms("05556866386", "hello").await;
        assert!(!receipt.success);
        assert!(receipt.error.is_some());
    }
}
