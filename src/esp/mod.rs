//! ESP32-S3 board bring-up.
//!
//! This is the only part of the firmware that touches ESP-IDF. It builds the
//! platform implementations of the node's collaborator traits and hands them
//! to a [`Node`], which does everything else.
use crate::{
    config::{Board, Config},
    display::LogDisplay,
    logger,
    node::Node,
};
use anyhow::Context;
use esp_idf_hal::{
    gpio::{AnyIOPin, AnyOutputPin},
    i2c::{I2cConfig, I2cDriver},
    peripherals::Peripherals,
    prelude::*,
};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_sys as _;
use std::time::Instant;

mod http;
#[cfg(any(feature = "sensor-sht4x", feature = "sensor-sgp40", feature = "sensor-scd4x"))]
mod sensors;
mod uart;
mod wifi;
mod ws2812;

pub use self::{http::EspSession, uart::UartTransport, wifi::EspRadio, ws2812::NeoPixel};

pub type I2cRef = shared_bus::I2cProxy<'static, SharedI2c>;
pub type I2cBus = shared_bus::BusManager<SharedI2c>;
pub type SharedI2c = std::sync::Mutex<I2cDriver<'static>>;

/// Pins that differ between the supported boards.
struct BoardPins {
    sda: AnyIOPin,
    scl: AnyIOPin,
    /// The status NeoPixel's data pin and its power enable pin, if the board
    /// has one.
    pixel: Option<(AnyOutputPin, Option<AnyOutputPin>)>,
}

pub fn run() -> anyhow::Result<()> {
    // It is necessary to call this function once. Otherwise, some patches to the
    // runtime implemented by esp-idf-sys might not link properly. See
    // https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_sys::link_patches();

    // the logger comes up before the config is read, so that warnings about
    // ignored config values are printed.
    logger::init(logger::default_level()).context("failed to initialize logger")?;

    // a node that can't identify itself or doesn't know where to send data is
    // useless, so this is the one error that stops startup.
    let config = Config::from_build_env().map_err(|error| {
        log::error!(target: "airnode", "invalid configuration: {error}");
        error
    })?;
    if let Some(level) = config.log_level {
        log::set_max_level(level);
    }
    log::info!(target: "airnode", "airnode {} is go! {config:?}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take().context("failed to take peripherals")?;
    let sysloop = EspSystemEventLoop::take()?;
    let pins = peripherals.pins;

    let board = match config.profile.board {
        Board::TinyS3 => BoardPins {
            sda: pins.gpio8.into(),
            scl: pins.gpio9.into(),
            pixel: Some((pins.gpio18.into(), Some(pins.gpio17.into()))),
        },
        Board::WaveshareS3Lcd28 => BoardPins {
            sda: pins.gpio11.into(),
            scl: pins.gpio10.into(),
            pixel: None,
        },
    };

    let radio = match config.wifi {
        Some(ref creds) if config.profile.wifi => {
            match EspRadio::new(peripherals.modem, sysloop.clone(), creds) {
                Ok(radio) => Some(radio),
                Err(error) => {
                    log::warn!(target: "airnode::net", "failed to bring up WiFi: {error:#}; running offline");
                    None
                }
            }
        }
        _ => {
            log::warn!(target: "airnode::net", "no WiFi configured; running offline");
            None
        }
    };

    let now = Instant::now();
    let mut node = Node::new(&config, radio, now).with_display(Box::new(LogDisplay::default()));

    if let Some((data, power)) = board.pixel {
        match NeoPixel::new(data, power, peripherals.rmt.channel0) {
            Ok(pixel) => node = node.with_pixel(Box::new(pixel)),
            Err(error) => log::warn!(target: "airnode::pixel", "failed to initialize NeoPixel: {error:#}"),
        }
    }

    match UartTransport::new(peripherals.uart1, pins.gpio43, pins.gpio44) {
        Ok(uart) => {
            let sps30 = sps30::Sps30::new(uart).with_timeout(config.intervals.sps30_timeout);
            node = node.with_particulate_sensor(Box::new(sps30));
        }
        Err(error) => log::warn!(target: "airnode::sps30", "failed to initialize SPS30 UART: {error:#}"),
    }

    // Sensirion's I2C sensors all support 100 kHz, and the SHT4x and SGP40
    // support 400 kHz, but the SCD4x datasheet recommends 100 kHz.
    let i2c_config = I2cConfig::new().baudrate(100u32.kHz().into());
    match I2cDriver::new(peripherals.i2c0, board.sda, board.scl, &i2c_config) {
        Ok(i2c) => node = add_i2c_sensors(node, i2c)?,
        Err(error) => log::warn!(target: "airnode", "failed to initialize I2C driver: {error}"),
    }

    let mut scheduler = node.scheduler(now)?;
    scheduler.run(&mut node)
}

#[cfg(any(feature = "sensor-sht4x", feature = "sensor-sgp40", feature = "sensor-scd4x"))]
fn add_i2c_sensors(mut node: Node<EspRadio>, i2c: I2cDriver<'static>) -> anyhow::Result<Node<EspRadio>> {
    let bus: &'static I2cBus = shared_bus::new_std!(I2cDriver = i2c)
        .ok_or_else(|| anyhow::anyhow!("I2C bus manager already initialized"))?;

    #[cfg(feature = "sensor-sht4x")]
    {
        node = node.with_climate_sensor(Box::new(sensors::Sht4xSensor::new(bus.acquire_i2c())));
    }
    #[cfg(feature = "sensor-sgp40")]
    {
        node = node.with_voc_sensor(Box::new(sensors::Sgp40Sensor::new(bus.acquire_i2c())));
    }
    #[cfg(feature = "sensor-scd4x")]
    {
        node = node.with_co2_sensor(Box::new(sensors::Scd4xSensor::new(bus.acquire_i2c())));
    }
    Ok(node)
}

#[cfg(not(any(feature = "sensor-sht4x", feature = "sensor-sgp40", feature = "sensor-scd4x")))]
fn add_i2c_sensors(node: Node<EspRadio>, _: I2cDriver<'static>) -> anyhow::Result<Node<EspRadio>> {
    log::info!(target: "airnode", "built without I2C sensor support");
    Ok(node)
}
