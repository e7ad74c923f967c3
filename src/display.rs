//! The local dashboard.
//!
//! Rendering is up to the [`Display`] implementation; the node only tells it
//! what to show.
use crate::net::State;
use chrono::{DateTime, FixedOffset};
use std::fmt;

pub trait Display {
    /// Called on every scheduler iteration, to keep animations moving.
    fn tick(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_wifi_icon(&mut self, icon: WifiIcon) -> anyhow::Result<()>;

    fn update_readings(&mut self, readings: &Readings) -> anyhow::Result<()>;

    fn update_clock(&mut self, time: &DateTime<FixedOffset>) -> anyhow::Result<()>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WifiIcon {
    /// Blinking, while the link comes up.
    Searching,
    /// Crossed out.
    Error,
    /// Solid.
    Connected,
}

/// The latest value of everything on the dashboard.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Readings {
    pub pm25: Option<f32>,
    pub aqi_us: Option<u16>,
    pub co2_ppm: Option<u16>,
    pub temp_c: Option<f32>,
    pub rh_pct: Option<f32>,
    pub tvoc_ppm: Option<f32>,
    pub voc_index: Option<u16>,
}

/// A [`Display`] for boards without a screen, which writes the dashboard to
/// the log instead.
#[derive(Debug, Default)]
pub struct LogDisplay {
    icon: Option<WifiIcon>,
}

// === impl WifiIcon ===

impl From<State> for WifiIcon {
    fn from(state: State) -> Self {
        match state {
            State::Connecting => WifiIcon::Searching,
            State::Degraded => WifiIcon::Error,
            State::Healthy => WifiIcon::Connected,
        }
    }
}

// === impl Readings ===

struct Field<T>(Option<T>, usize);

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ref value) => write!(f, "{value:.*}", self.1),
            None => f.write_str("--"),
        }
    }
}

impl fmt::Display for Readings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PM2.5 {} \u{00B5}g/m\u{00B3} | AQI {} | CO2 {} ppm | {} \u{00B0}C | {} %RH | TVOC {} ppm (index {})",
            Field(self.pm25, 1),
            Field(self.aqi_us, 0),
            Field(self.co2_ppm, 0),
            Field(self.temp_c, 1),
            Field(self.rh_pct, 0),
            Field(self.tvoc_ppm, 3),
            Field(self.voc_index, 0),
        )
    }
}

// === impl LogDisplay ===

impl Display for LogDisplay {
    fn set_wifi_icon(&mut self, icon: WifiIcon) -> anyhow::Result<()> {
        log::info!(target: "airnode::display", "wifi: {icon:?}");
        self.icon = Some(icon);
        Ok(())
    }

    fn update_readings(&mut self, readings: &Readings) -> anyhow::Result<()> {
        log::info!(target: "airnode::display", "{readings}");
        Ok(())
    }

    fn update_clock(&mut self, time: &DateTime<FixedOffset>) -> anyhow::Result<()> {
        log::trace!(target: "airnode::display", "{}", time.format("%H:%M:%S"));
        Ok(())
    }
}
