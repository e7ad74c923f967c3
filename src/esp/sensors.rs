//! Adapters from the Sensirion I2C driver crates to the node's sensor traits.
use super::I2cRef;
use crate::sensor::{Climate, Sensor};
use anyhow::anyhow;
use esp_idf_hal::delay::FreeRtos;

#[cfg(feature = "sensor-sht4x")]
pub use self::sht4x_sensor::Sht4xSensor;
#[cfg(feature = "sensor-sgp40")]
pub use self::sgp40_sensor::Sgp40Sensor;
#[cfg(feature = "sensor-scd4x")]
pub use self::scd4x_sensor::Scd4xSensor;

#[cfg(feature = "sensor-sht4x")]
mod sht4x_sensor {
    use super::*;
    use crate::sensor::ClimateSensor;
    use sht4x::{Precision, Sht4x};

    pub struct Sht4xSensor {
        sensor: Sht4x<I2cRef, FreeRtos>,
    }

    impl Sht4xSensor {
        pub fn new(i2c: I2cRef) -> Self {
            Self {
                sensor: Sht4x::new(i2c),
            }
        }
    }

    impl Sensor for Sht4xSensor {
        fn bringup(&mut self) -> anyhow::Result<()> {
            let serial = self
                .sensor
                .serial_number(&mut FreeRtos)
                .map_err(|error| anyhow!("failed to read SHT4x serial number: {error:?}"))?;
            log::info!(target: "airnode::sht4x", "SHT4x serial number: {serial:#x}");
            Ok(())
        }
    }

    impl ClimateSensor for Sht4xSensor {
        fn measure(&mut self) -> anyhow::Result<Climate> {
            let measurement = self
                .sensor
                .measure(Precision::High, &mut FreeRtos)
                .map_err(|error| anyhow!("failed to read SHT4x: {error:?}"))?;
            Ok(Climate {
                temp_c: measurement.temperature_celsius().to_num::<f32>(),
                rh_pct: measurement.humidity_percent().to_num::<f32>(),
            })
        }
    }
}

#[cfg(feature = "sensor-sgp40")]
mod sgp40_sensor {
    use super::*;
    use crate::sensor::VocSensor;
    use sgp40::Sgp40;

    const ADDR: u8 = 0x59;

    pub struct Sgp40Sensor {
        sensor: Sgp40<I2cRef, FreeRtos>,
    }

    impl Sgp40Sensor {
        pub fn new(i2c: I2cRef) -> Self {
            Self {
                sensor: Sgp40::new(i2c, ADDR, FreeRtos),
            }
        }
    }

    impl Sensor for Sgp40Sensor {
        fn bringup(&mut self) -> anyhow::Result<()> {
            let serial = self
                .sensor
                .serial()
                .map_err(|error| anyhow!("failed to read SGP40 serial number: {error:?}"))?;
            log::info!(target: "airnode::sgp40", "SGP40 serial number: {serial:#x}");
            Ok(())
        }
    }

    impl VocSensor for Sgp40Sensor {
        fn measure_voc_index(&mut self, compensation: Climate) -> anyhow::Result<u16> {
            // the driver takes milli-percent and milli-degrees.
            let rh = (compensation.rh_pct.clamp(0.0, 100.0) * 1000.0) as u16;
            let temp = (compensation.temp_c.clamp(-32.0, 32.0) * 1000.0) as i16;
            self.sensor
                .measure_voc_index_with_rht(rh, temp)
                .map_err(|error| anyhow!("failed to read SGP40: {error:?}"))
        }
    }
}

#[cfg(feature = "sensor-scd4x")]
mod scd4x_sensor {
    use super::*;
    use crate::sensor::{Co2Reading, Co2Sensor};
    use scd4x::Scd4x;

    pub struct Scd4xSensor {
        sensor: Scd4x<I2cRef, FreeRtos>,
    }

    impl Scd4xSensor {
        pub fn new(i2c: I2cRef) -> Self {
            Self {
                sensor: Scd4x::new(i2c, FreeRtos),
            }
        }
    }

    impl Sensor for Scd4xSensor {
        fn bringup(&mut self) -> anyhow::Result<()> {
            // periodic measurement may still be running from before a reset,
            // and the sensor won't accept most commands until it's stopped.
            self.sensor
                .stop_periodic_measurement()
                .map_err(|error| anyhow!("failed to stop SCD4x measurement: {error:?}"))?;
            let serial = self
                .sensor
                .serial_number()
                .map_err(|error| anyhow!("failed to read SCD4x serial number: {error:?}"))?;
            log::info!(target: "airnode::scd4x", "SCD4x serial number: {serial:#x}");
            self.sensor
                .start_periodic_measurement()
                .map_err(|error| anyhow!("failed to start SCD4x measurement: {error:?}"))
        }
    }

    impl Co2Sensor for Scd4xSensor {
        fn read_if_ready(&mut self) -> anyhow::Result<Option<Co2Reading>> {
            let ready = self
                .sensor
                .data_ready_status()
                .map_err(|error| anyhow!("failed to read SCD4x status: {error:?}"))?;
            if !ready {
                return Ok(None);
            }
            let data = self
                .sensor
                .measurement()
                .map_err(|error| anyhow!("failed to read SCD4x: {error:?}"))?;
            Ok(Some(Co2Reading {
                co2_ppm: data.co2,
                climate: Climate {
                    temp_c: data.temperature,
                    rh_pct: data.humidity,
                },
            }))
        }
    }
}
