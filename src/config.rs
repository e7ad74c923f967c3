//! Device identity, per-device feature profiles, and task timing.
use crate::net;
use chrono::{FixedOffset, Offset, Utc};
use log::LevelFilter;
use std::{fmt, time::Duration};

/// Configuration problems.
///
/// Missing credentials or a missing ingest URL stop the node from starting.
/// An [`InvalidValue`](ConfigError::InvalidValue) for an optional setting is
/// only logged, and the setting falls back to its default.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing device credential {0}")]
    MissingCredential(&'static str),
    #[error("missing ingest URL (API_INGEST_URL)")]
    MissingIngestUrl,
    #[error("invalid {key} {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Clone)]
pub struct Credentials {
    pub device_id: String,
    pub device_secret: Vec<u8>,
}

#[derive(Clone)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub ingest_url: String,
    pub healthcheck_url: Option<String>,
    pub tz_offset: FixedOffset,
    pub wifi: Option<WifiCredentials>,
    pub log_level: Option<LevelFilter>,
    pub profile: DeviceProfile,
    pub intervals: Intervals,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Board {
    TinyS3,
    WaveshareS3Lcd28,
}

/// Which peripherals a particular device has.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceProfile {
    pub board: Board,
    pub display_invert: bool,
    pub pixel_wheel: bool,
    pub sps30: bool,
    pub display: bool,
    pub wifi: bool,
    pub sht4x: bool,
    pub sgp40: bool,
    pub scd4x: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct Intervals {
    pub pm: Duration,
    pub sht4x: Duration,
    pub sht4x_first: Duration,
    pub sgp40: Duration,
    pub sgp40_first: Duration,
    pub scd4x: Duration,
    pub scd4x_first: Duration,
    pub pixel: Duration,
    pub clock: Duration,
    pub loop_quantum: Duration,
    pub time_sync_retry: Duration,
    pub telemetry_post: Duration,
    pub staleness: Duration,
    pub ingest_timeout: Duration,
    pub sps30_timeout: Duration,
    pub net: net::Settings,
}

const PROFILES: &[(&str, DeviceProfile)] = &[
    ("murali-1", DeviceProfile::DEFAULT),
    (
        "murali-living-room",
        DeviceProfile {
            board: Board::WaveshareS3Lcd28,
            display_invert: true,
            pixel_wheel: false,
            sht4x: false,
            sgp40: false,
            ..DeviceProfile::DEFAULT
        },
    ),
];

/// The maximum real-world UTC offsets are -12 and +14 hours.
const TZ_RANGE_HOURS: std::ops::RangeInclusive<f32> = -12.0..=14.0;

// === impl Config ===

impl Config {
    /// Loads the configuration from `lookup`, which maps a key to its value.
    /// Empty values count as missing.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let device_id = get("DEVICE_ID").ok_or(ConfigError::MissingCredential("DEVICE_ID"))?;
        let device_secret = get("DEVICE_SECRET")
            .ok_or(ConfigError::MissingCredential("DEVICE_SECRET"))?
            .into_bytes();
        let ingest_url = get("API_INGEST_URL").ok_or(ConfigError::MissingIngestUrl)?;
        let healthcheck_url = get("API_HEALTHCHECK_URL");

        let tz_offset = get("TZ_OFFSET_HOURS")
            .and_then(|value| or_default(parse_tz_offset(&value), "UTC"))
            .unwrap_or(Utc.fix());

        let log_level = get("LOG_LEVEL").and_then(|value| {
            let level = value.parse::<LevelFilter>().map_err(|_| ConfigError::InvalidValue {
                key: "LOG_LEVEL",
                value,
                reason: "expected one of off, error, warn, info, debug, trace",
            });
            or_default(level, "the build's default level")
        });

        let wifi = get("WIFI_SSID").map(|ssid| WifiCredentials {
            ssid,
            password: get("WIFI_PASSWORD").unwrap_or_default(),
        });

        let profile = DeviceProfile::for_device(&device_id);
        Ok(Self {
            credentials: Credentials {
                device_id,
                device_secret,
            },
            ingest_url,
            healthcheck_url,
            tz_offset,
            wifi,
            log_level,
            profile,
            intervals: Intervals::default(),
        })
    }

    /// Loads the configuration baked in at build time.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::load(build_env)
    }
}

/// Looks up a configuration key in the environment the firmware was built in.
pub fn build_env(key: &str) -> Option<String> {
    let value = match key {
        "DEVICE_ID" => option_env!("DEVICE_ID"),
        "DEVICE_SECRET" => option_env!("DEVICE_SECRET"),
        "API_INGEST_URL" => option_env!("API_INGEST_URL"),
        "API_HEALTHCHECK_URL" => option_env!("API_HEALTHCHECK_URL"),
        "TZ_OFFSET_HOURS" => option_env!("TZ_OFFSET_HOURS"),
        "WIFI_SSID" => option_env!("WIFI_SSID"),
        "WIFI_PASSWORD" => option_env!("WIFI_PASSWORD"),
        "LOG_LEVEL" => option_env!("LOG_LEVEL"),
        _ => None,
    };
    value.map(str::to_owned)
}

fn or_default<T>(result: Result<T, ConfigError>, default: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            log::warn!(target: "airnode::config", "{error}; using {default}");
            None
        }
    }
}

fn parse_tz_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = |reason| ConfigError::InvalidValue {
        key: "TZ_OFFSET_HOURS",
        value: value.to_owned(),
        reason,
    };
    let hours = value
        .trim()
        .parse::<f32>()
        .map_err(|_| invalid("expected a number of hours"))?;
    if !TZ_RANGE_HOURS.contains(&hours) {
        return Err(invalid("offset must be between -12 and +14 hours"));
    }
    let secs = (hours * 3600.0).round() as i32;
    FixedOffset::east_opt(secs).ok_or_else(|| invalid("offset out of range"))
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("device_id", &self.device_id)
            .field("device_secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

// === impl DeviceProfile ===

impl DeviceProfile {
    pub const DEFAULT: Self = Self {
        board: Board::TinyS3,
        display_invert: false,
        pixel_wheel: true,
        sps30: true,
        display: true,
        wifi: true,
        sht4x: true,
        sgp40: true,
        scd4x: true,
    };

    /// Returns the profile for `device_id`, or the default profile if the
    /// device isn't listed.
    pub fn for_device(device_id: &str) -> Self {
        PROFILES
            .iter()
            .find(|(id, _)| *id == device_id)
            .map(|&(_, profile)| profile)
            .unwrap_or(Self::DEFAULT)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// === impl Intervals ===

impl Default for Intervals {
    fn default() -> Self {
        Self {
            pm: Duration::from_secs(5),
            sht4x: Duration::from_secs(60),
            sht4x_first: Duration::from_secs(5),
            sgp40: Duration::from_secs(5),
            sgp40_first: Duration::from_secs(7),
            scd4x: Duration::from_secs(5),
            scd4x_first: Duration::from_secs(10),
            pixel: Duration::from_secs(5),
            clock: Duration::from_secs(1),
            loop_quantum: Duration::from_millis(50),
            time_sync_retry: Duration::from_secs(30),
            telemetry_post: Duration::from_secs(60),
            staleness: Duration::from_secs(300),
            ingest_timeout: Duration::from_secs(6),
            sps30_timeout: Duration::from_secs(1),
            net: net::Settings::default(),
        }
    }
}
