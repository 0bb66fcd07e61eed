use crate::types::SubscriberId;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rejected by recipient endpoint: {0}")]
    Rejected(String),
}

/// Sends one rendered message to one recipient. Retries, if any, live in the sink.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(&self, recipient: SubscriberId, text: &str) -> Result<(), DeliveryError>;
}

/// Logs messages instead of sending them (dry runs).
#[derive(Clone, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    async fn send(&self, recipient: SubscriberId, text: &str) -> Result<(), DeliveryError> {
        tracing::info!(subscriber = %recipient, text, "dry-run delivery");
        Ok(())
    }
}
