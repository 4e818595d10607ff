// Delivery seam for derived events. The poll loop hands each event's text
// to whichever Notifier the settings selected; send failures are the
// caller's to log, never to propagate into the cycle.

use async_trait::async_trait;
use serde_json::json;

use super::error::WatchError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), WatchError>;
}

/// Prints each message to stdout. Useful piped, or under cron.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, text: &str) -> Result<(), WatchError> {
        println!("{}\n", text);
        Ok(())
    }
}

/// POSTs `{"text": ...}` to a configured webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, WatchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("war-watcher/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), WatchError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WatchError::Status {
                code: response.status().as_u16(),
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}
