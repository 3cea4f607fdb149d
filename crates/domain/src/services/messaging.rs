//! Outbound SMS/WhatsApp dispatch for invitation links.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::DeliveryChannel;

/// Result of one dispatch attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryReceipt {
    pub fn delivered(provider_message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_message_id: Some(provider_message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Messaging dispatcher trait. Implementations never fail the caller;
/// errors are reported in the receipt.
#[async_trait::async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn send_sms(&self, phone: &str, text: &str) -> DeliveryReceipt;

    async fn send_whatsapp(&self, phone: &str, text: &str) -> DeliveryReceipt;

    async fn send(&self, channel: DeliveryChannel, phone: &str, text: &str) -> DeliveryReceipt {
        match channel {
            DeliveryChannel::Sms => self.send_sms(phone, text).await,
            DeliveryChannel::WhatsApp => self.send_whatsapp(phone, text).await,
        }
    }
}

/// A message captured by [`MockMessageDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: DeliveryChannel,
    pub phone: String,
    pub text: String,
}

/// Mock dispatcher for testing.
#[derive(Debug, Default)]
pub struct MockMessageDispatcher {
    simulate_failure: bool,
    sent: Mutex<Vec<SentMessage>>,
}

impl MockMessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock dispatcher whose every send fails.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    async fn record(&self, channel: DeliveryChannel, phone: &str, text: &str) -> DeliveryReceipt {
        if self.simulate_failure {
            return DeliveryReceipt::failed("Simulated provider failure");
        }

        let mut sent = self.sent.lock().await;
        sent.push(SentMessage {
            channel,
            phone: phone.to_string(),
            text: text.to_string(),
        });
        DeliveryReceipt::delivered(format!("mock-{}", sent.len()))
    }
}

#[async_trait::async_trait]
impl MessageDispatcher for MockMessageDispatcher {
    async fn send_sms(&self, phone: &str, text: &str) -> DeliveryReceipt {
        self.record(DeliveryChannel::Sms, phone, text).await
    }

    async fn send_whatsapp(&self, phone: &str, text: &str) -> DeliveryReceipt {
        self.record(DeliveryChannel::WhatsApp, phone, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_messages() {
        let dispatcher = MockMessageDispatcher::new();
        let receipt = dispatcher
            .send(DeliveryChannel::WhatsApp, "05556866386", "hello")
            .await;

        assert!(receipt.success);
        assert_eq!(receipt.provider_message_id.as_deref(), Some("mock-1"));
        let sent = dispatcher.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, DeliveryChannel::WhatsApp);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let dispatcher = MockMessageDispatcher::failing();
        let receipt = dispatcher.send_sms("05556866386", "hello").await;
        assert!(!receipt.success);
        assert!(receipt.error.is_some());
        assert!(dispatcher.sent_messages().await.is_empty());
    }
}
