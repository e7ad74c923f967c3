//! Sensor driver seams and their bring-up bookkeeping.
//!
//! The node talks to each sensor through one of the small traits here, so the
//! platform layer can plug in whichever driver it has and tests can plug in
//! fakes.
use anyhow::Context;

mod particulate;
mod status;

pub use self::status::Status;

pub trait Sensor {
    /// Prepares the sensor for polling. This is called before the first poll
    /// and again whenever a poll fails.
    fn bringup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A temperature and relative humidity sensor, such as the SHT4x.
pub trait ClimateSensor: Sensor {
    fn measure(&mut self) -> anyhow::Result<Climate>;
}

/// A VOC sensor, such as the SGP40.
pub trait VocSensor: Sensor {
    /// Returns the VOC index, using `compensation` for the sensor's
    /// temperature and humidity compensation.
    fn measure_voc_index(&mut self, compensation: Climate) -> anyhow::Result<u16>;
}

/// A CO2 sensor in periodic measurement mode, such as the SCD4x.
pub trait Co2Sensor: Sensor {
    /// Returns `None` if no new measurement is ready yet.
    fn read_if_ready(&mut self) -> anyhow::Result<Option<Co2Reading>>;
}

/// A particulate matter sensor, such as the SPS30.
pub trait ParticulateSensor: Sensor {
    /// Returns `None` if no new measurement is ready yet.
    fn measure(&mut self) -> anyhow::Result<Option<sps30::Measurement>>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Climate {
    pub temp_c: f32,
    pub rh_pct: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Co2Reading {
    pub co2_ppm: u16,
    pub climate: Climate,
}

/// A sensor along with its status.
pub struct Managed<S: ?Sized> {
    name: &'static str,
    status: Status,
    errors: usize,
    sensor: Box<S>,
}

// === impl Climate ===

impl Climate {
    /// Used for VOC compensation until a real climate reading is available.
    pub const DEFAULT_COMPENSATION: Self = Self {
        temp_c: 25.0,
        rh_pct: 50.0,
    };
}

// === impl Managed ===

impl<S: Sensor + ?Sized> Managed<S> {
    pub fn new(name: &'static str, sensor: Box<S>) -> Self {
        Self {
            name,
            status: Status::Missing,
            errors: 0,
            sensor,
        }
    }

    /// Brings the sensor up if it isn't already, and then polls it with `f`.
    ///
    /// If either step fails, the error is returned and the sensor will be
    /// brought up again next time.
    pub fn poll<T>(&mut self, f: impl FnOnce(&mut S) -> anyhow::Result<T>) -> anyhow::Result<T> {
        if self.status.needs_bringup() {
            if let Err(error) = self.sensor.bringup() {
                self.errors += 1;
                return Err(error).with_context(|| {
                    format!("failed to bring up {} (status: {})", self.name, self.status)
                });
            }
            log::info!(target: self.name, "successfully brought up {}!", self.name);
            self.status = Status::Up;
        }

        match f(&mut *self.sensor) {
            Ok(value) => Ok(value),
            Err(error) => {
                self.errors += 1;
                self.status = Status::Down;
                Err(error).with_context(|| format!("error polling {}", self.name))
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S: ?Sized> std::fmt::Debug for Managed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Managed")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
