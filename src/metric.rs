//! The latest-value metric cache that feeds telemetry.
use crate::telemetry::TelemetryError;
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

/// The fixed set of metrics this node reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum MetricKey {
    Pm25,
    AqiUs,
    Co2,
    VocPpm,
    VocIndex,
    TempC,
    RhPct,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MetricRecord {
    pub key: MetricKey,
    pub value: f32,
    pub observed_at: Instant,
    pub sent_at: Option<Instant>,
}

/// One slot per [`MetricKey`]; a slot is filled on the first observation of
/// that key and overwritten in place afterwards.
#[derive(Debug, Default)]
pub struct MetricStore {
    records: [Option<MetricRecord>; MetricKey::COUNT],
}

/// A set of pending readings selected for transmission.
///
/// Each entry remembers which observation it carries, so that acknowledging
/// the batch only marks *that* observation as sent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    entries: heapless::Vec<BatchEntry, { MetricKey::COUNT }>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatchEntry {
    pub key: MetricKey,
    pub value: f32,
    pub observed_at: Instant,
}

// === impl MetricKey ===

impl MetricKey {
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Pm25,
        Self::AqiUs,
        Self::Co2,
        Self::VocPpm,
        Self::VocIndex,
        Self::TempC,
        Self::RhPct,
    ];

    /// The name used for this metric in the ingest API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pm25 => "pm25_ugm3",
            Self::AqiUs => "aqi_us",
            Self::Co2 => "co2_ppm",
            Self::VocPpm => "voc_ppm",
            Self::VocIndex => "voc_index",
            Self::TempC => "temp_c",
            Self::RhPct => "rh_pct",
        }
    }

    /// Whether this metric is reported as an integer.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::AqiUs | Self::Co2 | Self::VocIndex)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for MetricKey {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| TelemetryError::UnknownMetric(s.to_owned()))
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetricKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// === impl MetricRecord ===

impl MetricRecord {
    /// A record is pending if it has never been sent, or if it has been
    /// observed again since it was last sent.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        match self.sent_at {
            None => true,
            Some(sent_at) => sent_at < self.observed_at,
        }
    }

    #[must_use]
    pub fn is_stale(&self, now: Instant, staleness_limit: Duration) -> bool {
        now.saturating_duration_since(self.observed_at) > staleness_limit
    }
}

// === impl MetricStore ===

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new observation of `key`.
    ///
    /// The value and observation time are overwritten; the last time the key
    /// was sent is left alone.
    pub fn update(
        &mut self,
        key: MetricKey,
        value: f32,
        observed_at: Instant,
    ) -> Result<(), TelemetryError> {
        if !value.is_finite() {
            return Err(TelemetryError::InvalidValue { key, value });
        }

        let slot = &mut self.records[key.index()];
        match slot {
            Some(record) => {
                record.value = value;
                record.observed_at = observed_at;
            }
            None => {
                *slot = Some(MetricRecord {
                    key,
                    value,
                    observed_at,
                    sent_at: None,
                });
            }
        }
        log::trace!(target: "airnode::metric", "{key} = {value}");
        Ok(())
    }

    /// Like [`MetricStore::update`], for a metric named by its ingest API
    /// key.
    pub fn update_by_name(
        &mut self,
        name: &str,
        value: f32,
        observed_at: Instant,
    ) -> Result<(), TelemetryError> {
        let key = name.parse::<MetricKey>()?;
        self.update(key, value, observed_at)
    }

    #[must_use]
    pub fn get(&self, key: MetricKey) -> Option<&MetricRecord> {
        self.records[key.index()].as_ref()
    }

    pub fn records(&self) -> impl Iterator<Item = &MetricRecord> + '_ {
        self.records.iter().filter_map(Option::as_ref)
    }

    /// Returns every record that is both fresh and pending.
    ///
    /// Stale records are skipped whether or not they were ever sent; they are
    /// not queued for later.
    pub fn build_pending_batch(&self, now: Instant, staleness_limit: Duration) -> Batch {
        let mut batch = Batch::default();
        for record in self.records() {
            if record.is_stale(now, staleness_limit) {
                if record.is_pending() {
                    log::debug!(
                        target: "airnode::metric",
                        "dropping stale unsent {} (observed {:?} ago)",
                        record.key,
                        now.saturating_duration_since(record.observed_at),
                    );
                }
                continue;
            }

            if !record.is_pending() {
                continue;
            }

            // there is exactly one slot per key, so this can't overflow.
            let _ = batch.entries.push(BatchEntry {
                key: record.key,
                value: record.value,
                observed_at: record.observed_at,
            });
        }
        batch
    }

    /// Marks the observations carried by `batch` as sent.
    ///
    /// If a key was observed again after the batch was built, it is still
    /// pending afterwards, since the newer value hasn't been sent yet.
    pub fn mark_sent(&mut self, batch: &Batch) {
        for entry in batch.entries() {
            if let Some(record) = self.records[entry.key.index()].as_mut() {
                record.sent_at = Some(entry.observed_at);
            }
        }
    }
}

// === impl Batch ===

impl Batch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries[..]
    }

    pub fn keys(&self) -> impl Iterator<Item = MetricKey> + '_ {
        self.entries.iter().map(|entry| entry.key)
    }
}

impl Serialize for Batch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            if entry.key.is_integer() {
                map.serialize_entry(&entry.key, &(entry.value.round() as i64))?;
            } else {
                map.serialize_entry(&entry.key, &entry.value)?;
            }
        }
        map.end()
    }
}
