//! Wireless link management.
//!
//! The [`ConnectivityManager`] owns the radio, the HTTP session that rides on
//! top of it, and the periodic health check. It is driven entirely by
//! [`ConnectivityManager::tick`]; no call into it blocks for longer than the
//! radio's association timeout or the health check request timeout.
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::time::{Duration, Instant};

/// A wireless radio that can associate with an access point.
pub trait Radio {
    type Session: Session;

    fn is_associated(&mut self) -> bool;

    /// Attempts to associate, waiting no longer than the radio's own
    /// connection timeout.
    fn associate(&mut self) -> anyhow::Result<()>;

    fn open_session(&mut self) -> anyhow::Result<Self::Session>;

    /// Queries network time, commits it to the real-time clock, and returns
    /// it as seconds since the Unix epoch.
    ///
    /// This must not wait for a time server. If no time is available yet, it
    /// returns an error and the caller tries again later.
    fn sync_time(&mut self) -> anyhow::Result<i64>;
}

/// An HTTP(S) client session.
pub trait Session {
    fn get(&mut self, url: &str, timeout: Duration) -> anyhow::Result<Response>;

    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> anyhow::Result<Response>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    /// Not yet known to be healthy. This is also the initial state.
    Connecting,
    /// The link has failed at least once since it was last established.
    Degraded,
    /// Associated, and the last health check passed.
    Healthy,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("failed to associate: {0:#}")]
    AssociationFailed(anyhow::Error),
    #[error("not connected")]
    NotConnected,
    #[error("time sync failed: {0:#}")]
    TimeSyncFailed(anyhow::Error),
}

#[derive(Copy, Clone, Debug)]
pub struct Settings {
    pub retry_interval: Duration,
    pub healthcheck_interval: Duration,
    pub healthcheck_timeout: Duration,
}

pub struct ConnectivityManager<R: Radio> {
    radio: R,
    session: Option<R::Session>,
    healthcheck_url: Option<String>,
    settings: Settings,

    associated: bool,
    healthy: bool,
    had_failure: bool,
    next_attempt: Instant,
    next_healthcheck: Instant,
    state: State,
}

const TARGET: &str = "airnode::net";

// === impl Response ===

impl Response {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// === impl Settings ===

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
            healthcheck_interval: Duration::from_secs(30),
            healthcheck_timeout: Duration::from_secs(3),
        }
    }
}

// === impl ConnectivityManager ===

impl<R: Radio> ConnectivityManager<R> {
    /// If no health check URL is configured, an associated link is always
    /// considered healthy.
    pub fn new(radio: R, healthcheck_url: Option<String>, settings: Settings, now: Instant) -> Self {
        if healthcheck_url.is_none() {
            log::info!(target: TARGET, "no health check URL configured; association implies health");
        }
        Self {
            radio,
            session: None,
            healthcheck_url,
            settings,
            associated: false,
            healthy: false,
            had_failure: false,
            next_attempt: now,
            next_healthcheck: now,
            state: State::Connecting,
        }
    }

    pub fn tick(&mut self, now: Instant) -> State {
        if !self.radio.is_associated() {
            if self.associated {
                log::warn!(target: TARGET, "lost association");
                self.had_failure = true;
                self.next_attempt = now + self.settings.retry_interval;
            }
            self.associated = false;
            self.session = None;
            self.healthy = false;

            if now < self.next_attempt {
                return self.set_state(self.disassociated_state());
            }

            if let Err(error) = self.associate() {
                log::warn!(target: TARGET, "{error}; retrying in {:?}", self.settings.retry_interval);
                self.had_failure = true;
                self.next_attempt = now + self.settings.retry_interval;
                return self.set_state(State::Degraded);
            }

            self.associated = true;
            self.had_failure = false;
            self.next_healthcheck = now;
        } else if !self.associated {
            log::info!(target: TARGET, "radio associated");
            self.associated = true;
            self.next_healthcheck = now;
        }

        if self.session.is_none() {
            match self.radio.open_session() {
                Ok(session) => {
                    log::debug!(target: TARGET, "opened HTTP session");
                    self.session = Some(session);
                }
                Err(error) => {
                    log::warn!(target: TARGET, "failed to open HTTP session: {error:#}");
                    self.healthy = false;
                    return self.set_state(State::Connecting);
                }
            }
        }

        if now >= self.next_healthcheck {
            self.next_healthcheck = now + self.settings.healthcheck_interval;
            self.healthy = self.check_health();
        }

        let state = if self.healthy {
            State::Healthy
        } else {
            State::Connecting
        };
        self.set_state(state)
    }

    /// Whether the radio was associated as of the last tick.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.associated
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The live session, if the link is up.
    pub fn session_mut(&mut self) -> Option<&mut R::Session> {
        self.session.as_mut()
    }

    /// Synchronizes the real-time clock with network time, returning the
    /// current wall clock time at `offset`.
    pub fn sync_time(&mut self, offset: FixedOffset) -> Result<DateTime<FixedOffset>, ConnectivityError> {
        if !self.associated || !self.radio.is_associated() {
            return Err(ConnectivityError::NotConnected);
        }
        let secs = self
            .radio
            .sync_time()
            .map_err(ConnectivityError::TimeSyncFailed)?;
        let utc = Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
            ConnectivityError::TimeSyncFailed(anyhow::anyhow!("timestamp {secs} out of range"))
        })?;
        let local = utc.with_timezone(&offset);
        log::info!(target: TARGET, "time synchronized: {local}");
        Ok(local)
    }

    fn associate(&mut self) -> Result<(), ConnectivityError> {
        log::info!(target: TARGET, "associating...");
        self.radio
            .associate()
            .map_err(ConnectivityError::AssociationFailed)?;
        log::info!(target: TARGET, "associated");
        Ok(())
    }

    fn check_health(&mut self) -> bool {
        let Some(url) = self.healthcheck_url.as_deref() else {
            return true;
        };
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.get(url, self.settings.healthcheck_timeout) {
            Ok(rsp) if rsp.is_success() => {
                log::debug!(target: TARGET, "health check OK ({})", rsp.status);
                true
            }
            Ok(rsp) => {
                log::warn!(target: TARGET, "health check failed: HTTP {}", rsp.status);
                false
            }
            Err(error) => {
                log::warn!(target: TARGET, "health check failed: {error:#}");
                false
            }
        }
    }

    fn disassociated_state(&self) -> State {
        if self.had_failure {
            State::Degraded
        } else {
            State::Connecting
        }
    }

    fn set_state(&mut self, state: State) -> State {
        if state != self.state {
            log::info!(target: TARGET, "link {:?} -> {:?}", self.state, state);
            self.state = state;
        }
        state
    }
}
