//! The signed telemetry upload request.
use crate::{
    metric::Batch,
    net::Session,
    signing::Signer,
    telemetry::TelemetryError,
};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug)]
pub struct IngestClient {
    url: String,
    device_id: String,
    signer: Signer,
    timeout: Duration,
}

/// The server's acknowledgement of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Ack {
    /// The HTTP status, or `None` if nothing was sent.
    pub status: Option<u16>,
    /// The server's timestamp for the batch, if it sent one.
    pub server_ts: Option<f64>,
    pub metrics: usize,
}

// === impl IngestClient ===

impl IngestClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

    pub fn new(url: impl Into<String>, device_id: impl Into<String>, device_secret: &[u8]) -> Self {
        Self {
            url: url.into(),
            device_id: device_id.into(),
            signer: Signer::new(device_secret),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Uploads `batch`. An empty batch is acknowledged without sending
    /// anything.
    pub fn post(&self, session: &mut impl Session, batch: &Batch) -> Result<Ack, TelemetryError> {
        if batch.is_empty() {
            return Ok(Ack {
                status: None,
                server_ts: None,
                metrics: 0,
            });
        }

        let body = serde_json::to_vec(batch).map_err(TelemetryError::SerializationFailed)?;
        let signature = self.signer.sign(&body);
        let headers = [
            ("Content-Type", "application/json"),
            ("X-Device-Id", self.device_id.as_str()),
            ("X-Signature", signature.as_str()),
        ];

        log::debug!(
            target: "airnode::ingest",
            "POST {} ({} metrics, {} bytes)",
            self.url,
            batch.len(),
            body.len()
        );
        let rsp = session
            .post(&self.url, &headers, &body, self.timeout)
            .map_err(TelemetryError::NetworkFailed)?;

        // servers that don't send our JSON ack are judged on status alone.
        // Each field is read on its own, so a malformed `ts` can't hide an
        // explicit `"ok": false`.
        let parsed = serde_json::from_slice::<Value>(&rsp.body).ok();
        let ok = parsed
            .as_ref()
            .and_then(|body| body.get("ok"))
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let server_ts = parsed
            .as_ref()
            .and_then(|body| body.get("ts"))
            .and_then(Value::as_f64);
        if !rsp.is_success() || !ok {
            return Err(TelemetryError::ServerRejected {
                status: rsp.status,
                body: String::from_utf8_lossy(&rsp.body).into_owned(),
            });
        }

        Ok(Ack {
            status: Some(rsp.status),
            server_ts,
            metrics: batch.len(),
        })
    }
}
