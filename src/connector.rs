use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::time::{Interval, MissedTickBehavior};

/// What came back from one speculative connect attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    Success,
    AlreadyConnected,
    InProgress,
    TransientFailure(Option<String>),
    FatalError {
        name: String,
        detail: Option<String>,
    },
}

impl ConnectOutcome {
    /// Map a bluez D-Bus error name onto an outcome. Anything unrecognised is fatal.
    pub fn from_error_name(name: &str, detail: Option<String>) -> Self {
        match name {
            "org.bluez.Error.AlreadyConnected" => ConnectOutcome::AlreadyConnected,
            "org.bluez.Error.InProgress" => ConnectOutcome::InProgress,
            "org.bluez.Error.Failed" => ConnectOutcome::TransientFailure(detail),
            _ => ConnectOutcome::FatalError {
                name: name.to_string(),
                detail,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("speculative connect failed with {name}: {}", .detail.as_deref().unwrap_or("no detail"))]
pub struct ConnectError {
    pub name: String,
    pub detail: Option<String>,
}

#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn connect(&self) -> ConnectOutcome;
}

/// Fixed-interval retry loop that keeps poking the speaker's audio profile while
/// it is believed to be absent. At most one schedule is live at a time.
pub struct SpeculativeConnector {
    link: Box<dyn LinkConnector>,
    interval: Duration,
    ticker: Option<Interval>,
}

impl SpeculativeConnector {
    pub fn new(link: Box<dyn LinkConnector>, interval: Duration) -> Self {
        SpeculativeConnector {
            link,
            interval,
            ticker: None,
        }
    }

    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        debug!("Starting speculative connect every {:?}", self.interval);
        // first attempt one interval out, not immediately
        let first = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(first, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    pub fn stop(&mut self) {
        if self.ticker.take().is_some() {
            debug!("Stopped speculative connect");
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Resolves at the next scheduled attempt; never resolves while stopped.
    /// Cancel safe, so it can sit in a `select!`.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Run one attempt. Expected stack errors are logged and swallowed; anything
    /// else is handed back to the caller.
    pub async fn attempt(&self) -> Result<(), ConnectError> {
        debug!("Trying speculative audio connect");
        match self.link.connect().await {
            ConnectOutcome::Success => info!("Speculative connect succeeded"),
            ConnectOutcome::AlreadyConnected => debug!("Was already connected"),
            ConnectOutcome::InProgress => debug!("Connect already in progress"),
            ConnectOutcome::TransientFailure(detail) => debug!(
                "Failed to connect (not switched on?): {}",
                detail.as_deref().unwrap_or("no detail")
            ),
            ConnectOutcome::FatalError { name, detail } => {
                return Err(ConnectError { name, detail });
            }
        }
        Ok(())
    }
}
