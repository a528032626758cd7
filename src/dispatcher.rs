//! Throttled prompt dispatch
//!
//! The [`Dispatcher`] is the only component that talks to the completions
//! endpoint. It owns the session's [`Throttle`]; the throttle lock is held for
//! the whole attempt, so one session never has two requests in flight and
//! consecutive sends are always at least `min_interval` apart.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::client::{CompletionClient, LastExchange};
use crate::config::Config;
use crate::error::{DispatchError, SetupError};
use crate::task::TaskKey;
use crate::throttle::Throttle;

pub struct Dispatcher {
    client: CompletionClient,
    throttle: Mutex<Throttle>,
    min_interval: Duration,
}

impl Dispatcher {
    pub fn new(client: CompletionClient, min_interval: Duration) -> Self {
        Self {
            client,
            throttle: Mutex::new(Throttle::new()),
            min_interval,
        }
    }

    /// Build a dispatcher from config. Fails when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let api_key = config.require_api_key()?;
        let client = CompletionClient::new(config, api_key)?;
        Ok(Self::new(client, config.request_interval()))
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_exchange(&self) -> Option<LastExchange> {
        self.client.last_exchange()
    }

    /// How long a dispatch started now would wait. `None` while a dispatch
    /// is already in flight.
    pub fn current_wait(&self) -> Option<Duration> {
        self.throttle
            .try_lock()
            .ok()
            .map(|throttle| throttle.wait_time(self.min_interval, Instant::now()))
    }

    /// `None` while a dispatch is in flight or before the first request.
    pub fn last_request_at(&self) -> Option<DateTime<Local>> {
        self.throttle
            .try_lock()
            .ok()
            .and_then(|throttle| throttle.last_request_at())
    }

    /// Send `prompt` rewritten for `task` and return the reply text.
    ///
    /// Waits out the throttle first. Failures are returned as-is; nothing is
    /// retried.
    pub async fn dispatch(&self, prompt: &str, task: TaskKey) -> Result<String, DispatchError> {
        let mut throttle = self.throttle.lock().await;
        throttle.wait(self.min_interval).await;

        let content = task.resolve_prompt(prompt);
        info!(
            "Dispatching {} prompt ({} chars) to {}",
            task,
            content.chars().count(),
            self.client.model()
        );

        let result = self.client.complete(&content).await;
        // Failed attempts count too, so a quick resubmit still respects the interval.
        throttle.mark_sent(Instant::now());

        match &result {
            Ok(reply) => info!("Received reply ({} chars)", reply.chars().count()),
            Err(e) => warn!("Dispatch failed: {e}"),
        }

        result
    }
}

