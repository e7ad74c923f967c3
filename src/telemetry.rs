//! Periodic upload of cached metrics.
use crate::{
    ingest::{Ack, IngestClient},
    metric::{MetricKey, MetricStore},
    net::Session,
    scheduler::Timer,
};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown metric {0:?}")]
    UnknownMetric(String),
    #[error("{key} value {value} is not a finite number")]
    InvalidValue { key: MetricKey, value: f32 },
    #[error("failed to serialize batch: {0}")]
    SerializationFailed(#[source] serde_json::Error),
    #[error("ingest request failed: {0:#}")]
    NetworkFailed(anyhow::Error),
    #[error("ingest server rejected batch (HTTP {status}): {body}")]
    ServerRejected { status: u16, body: String },
}

/// Owns the metric cache and uploads what's pending on its own timer.
#[derive(Debug)]
pub struct TelemetryManager {
    store: MetricStore,
    client: IngestClient,
    timer: Timer,
    staleness_limit: Duration,
}

const TARGET: &str = "airnode::telemetry";

// === impl TelemetryManager ===

impl TelemetryManager {
    pub fn new(client: IngestClient, post_every: Duration, staleness_limit: Duration, now: Instant) -> Self {
        Self {
            store: MetricStore::new(),
            client,
            timer: Timer::new(post_every, now),
            staleness_limit,
        }
    }

    pub fn record(&mut self, key: MetricKey, value: f32, now: Instant) -> Result<(), TelemetryError> {
        self.store.update(key, value, now)
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// If a post is due, uploads every pending metric over `session`.
    ///
    /// Metrics are only marked as sent once the server accepts them; if the
    /// upload fails they are retried on the next post, unless they've gone
    /// stale by then. Returns `Ok(None)` if nothing was sent.
    pub fn tick(&mut self, now: Instant, session: &mut impl Session) -> Result<Option<Ack>, TelemetryError> {
        if !self.timer.poll(now) {
            return Ok(None);
        }

        let batch = self.store.build_pending_batch(now, self.staleness_limit);
        if batch.is_empty() {
            log::debug!(target: TARGET, "nothing to send");
            return Ok(None);
        }

        let ack = self.client.post(session, &batch)?;
        self.store.mark_sent(&batch);
        log::info!(
            target: TARGET,
            "sent {} metrics (status {:?}, server ts {:?})",
            ack.metrics,
            ack.status,
            ack.server_ts
        );
        Ok(Some(ack))
    }
}
