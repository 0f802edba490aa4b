//! Trade-outcome notifications
//!
//! Fire-and-forget: the executor logs a delivery failure and moves on. A
//! confirmed trade is never rolled back or left unscheduled because the
//! notification could not be sent.

use crate::config::NotifierConfig;
use crate::error::{EngineError, Result};
use alloy::primitives::Address;
use serde::Serialize;
use std::time::Duration;

/// Best-effort notification of a trade outcome.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        recipient: Address,
        title: &str,
        body: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Serialize)]
struct ChannelMessage<'a> {
    channel: &'a str,
    recipients: Vec<String>,
    notification: NotificationPayload<'a>,
}

#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    title: &'a str,
    body: &'a str,
}

/// HTTP notifier posting to a Push-protocol style channel endpoint.
pub struct PushChannelNotifier {
    endpoint: String,
    channel: String,
    client: reqwest::Client,
}

impl PushChannelNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            channel: config.channel.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .use_rustls_tls()
                .build()
                .unwrap(),
        }
    }
}

impl Notifier for PushChannelNotifier {
    async fn notify(&self, recipient: Address, title: &str, body: &str) -> Result<()> {
        let message = ChannelMessage {
            channel: &self.channel,
            recipients: vec![format!("{recipient:?}")],
            notification: NotificationPayload { title, body },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await
            .map_err(|e| EngineError::NotifyFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::NotifyFailed(format!("{status} - {body}")));
        }

        Ok(())
    }
}
