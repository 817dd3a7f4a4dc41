use async_trait::async_trait;
use log::{debug, warn};

use crate::config::{WebhookEvents, WebhookSettings};
use crate::messages::NotificationEvent;

const TRIGGER_BASE: &str = "https://maker.ifttt.com/trigger";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook timed out")]
    Timeout,
    #[error("webhook request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else {
            NotifyError::Request(err)
        }
    }
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn get(&self, url: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new(settings: &WebhookSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .build()?;
        Ok(HttpSender { client })
    }
}

#[async_trait]
impl WebhookSender for HttpSender {
    async fn get(&self, url: &str) -> Result<(), NotifyError> {
        // body is ignored, a non-2xx status still counts as delivered
        let response = self.client.get(url).send().await?;
        debug!("Webhook answered {}", response.status());
        Ok(())
    }
}

/// Fires IFTTT Maker events. Never fails: errors are logged and dropped.
pub struct NotificationGate {
    key: Option<String>,
    events: WebhookEvents,
    sender: Box<dyn WebhookSender>,
}

impl NotificationGate {
    pub fn new(settings: &WebhookSettings, sender: Box<dyn WebhookSender>) -> Self {
        NotificationGate {
            key: settings.key.clone(),
            events: settings.events.clone(),
            sender,
        }
    }

    fn event_name(&self, event: NotificationEvent) -> Option<&str> {
        match event {
            NotificationEvent::Boot => self.events.boot.as_deref(),
            NotificationEvent::Play => self.events.play.as_deref(),
            NotificationEvent::Stop => self.events.stop.as_deref(),
        }
    }

    pub async fn notify(&self, event: NotificationEvent) {
        let (Some(key), Some(name)) = (self.key.as_deref(), self.event_name(event)) else {
            return;
        };
        debug!("Triggering webhook {} for {}", name, event);
        if let Err(err) = self.sender.get(&trigger_url(name, key)).await {
            // the url carries the key, keep it out of the log
            warn!(
                "Failed to trigger webhook {} for {}: {}",
                name,
                event,
                err.without_url()
            );
        }
    }
}

impl NotifyError {
    fn without_url(self) -> Self {
        match self {
            NotifyError::Request(err) => NotifyError::Request(err.without_url()),
            other => other,
        }
    }
}

fn trigger_url(event_name: &str, key: &str) -> String {
    format!("{}/{}/with/key/{}", TRIGGER_BASE, event_name, key)
}
