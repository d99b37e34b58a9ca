//! Delivery: posts one `OutreachResult` to the batch's callback URL.
//!
//! Best-effort: one POST, short timeout, no retry, no dead-letter queue. The
//! pipeline logs a failed delivery and moves on to the next employee.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::models::OutreachResult;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Callback returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, callback_url: &str, result: &OutreachResult) -> Result<(), DeliveryError>;
}

/// HTTP webhook sink.
#[derive(Clone)]
pub struct WebhookSink {
    client: Client,
}

impl WebhookSink {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl ResultSink for WebhookSink {
    async fn deliver(&self, callback_url: &str, result: &OutreachResult) -> Result<(), DeliveryError> {
        let response = self.client.post(callback_url).json(result).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every delivery; optionally fails for given employee ids.
    #[derive(Default)]
    pub struct RecordingSink {
        delivered: Mutex<Vec<(String, OutreachResult)>>,
        fail_ids: Vec<String>,
    }

    impl RecordingSink {
        pub fn failing_for(ids: &[&str]) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            }
        }

        pub fn results(&self) -> Vec<OutreachResult> {
            self.delivered
                .lock()
                .unwrap()
                .iter()
                .map(|(_, r)| r.clone())
                .collect()
        }

        pub fn urls(&self) -> Vec<String> {
            self.delivered
                .lock()
                .unwrap()
                .iter()
                .map(|(u, _)| u.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        async fn deliver(
            &self,
            callback_url: &str,
            result: &OutreachResult,
        ) -> Result<(), DeliveryError> {
            self.delivered
                .lock()
                .unwrap()
                .push((callback_url.to_string(), result.clone()));
            if self.fail_ids.contains(&result.id) {
                return Err(DeliveryError::Status {
                    status: 500,
                    body: "receiver down".to_string(),
                });
            }
            Ok(())
        }
    }
}
