// src/model/source.rs

use anyhow::{Context, Result};
use chrono::Local;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument};
use url::Url;

use super::dataset::Dataset;

/// Receives each successfully fetched dataset.
pub type CompletionCallback = Arc<dyn Fn(Dataset) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fetches the dataset from a fixed URL and hands it to one subscriber.
///
/// Only a single completion callback is supported: registering again
/// replaces the previous one. Fan-out to several consumers belongs to the
/// caller.
pub struct DataSource {
    client: Client,
    url: Url,
    delay: Duration,
    callback: Mutex<Option<CompletionCallback>>,
}

impl DataSource {
    /// `delay` is extra simulated latency after the response arrives; zero disables it.
    pub fn new(client: Client, url: Url, delay: Duration) -> Self {
        Self {
            client,
            url,
            delay,
            callback: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Store `callback` as the sole receiver of fetched datasets.
    pub fn register_completion_callback<F, Fut>(&self, callback: F)
    where
        F: Fn(Dataset) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: CompletionCallback = Arc::new(move |ds: Dataset| callback(ds).boxed());
        let mut slot = self.callback.lock().unwrap_or_else(|e| e.into_inner());
        if slot.replace(boxed).is_some() {
            debug!("replaced existing completion callback");
        }
    }

    /// Fetch, stamp and deliver the dataset.
    ///
    /// Failures are logged and end the cycle: the callback is not invoked and
    /// nothing is retried. On success the callback runs exactly once and is
    /// awaited before this returns.
    #[instrument(level = "info", skip(self), fields(url = %self.url))]
    pub async fn fetch_dataset(&self) {
        let start = Instant::now();
        let mut dataset = match self.load().await {
            Ok(ds) => ds,
            Err(e) => {
                error!(error = %format!("{:#}", e), "fetch failed");
                return;
            }
        };
        dataset.last_request = Some(Local::now());
        info!(
            rows = dataset.data.len(),
            elapsed = ?start.elapsed(),
            "dataset ready"
        );

        // Clone out of the slot so the lock is not held across the await.
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match callback {
            Some(cb) => cb(dataset).await,
            None => debug!("no completion callback registered; dataset dropped"),
        }
    }

    async fn load(&self) -> Result<Dataset> {
        debug!("requesting dataset");
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", self.url))?;

        if !self.delay.is_zero() {
            debug!(delay_ms = self.delay.as_millis() as u64, "simulating latency");
            sleep(self.delay).await;
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("Reading text from {}", self.url))?;
        serde_json::from_str(&body).with_context(|| format!("parsing dataset from {}", self.url))
    }
}
