use anyhow::Context;
use esp_idf_hal::{
    delay::TickType,
    gpio::{AnyIOPin, InputPin, OutputPin},
    peripheral::Peripheral,
    uart::{config::Config, Uart, UartDriver},
    units::Hertz,
};
use esp_idf_sys::EspError;
use std::time::Duration;

/// The SPS30's UART runs at 115200 baud, 8N1.
const BAUD: Hertz = Hertz(115_200);

/// A hardware UART, as a byte transport for the SPS30 driver.
pub struct UartTransport {
    uart: UartDriver<'static>,
}

impl UartTransport {
    pub fn new(
        uart: impl Peripheral<P = impl Uart> + 'static,
        tx: impl Peripheral<P = impl OutputPin> + 'static,
        rx: impl Peripheral<P = impl InputPin> + 'static,
    ) -> anyhow::Result<Self> {
        let config = Config::new().baudrate(BAUD);
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )
        .context("failed to initialize UART driver")?;
        Ok(Self { uart })
    }
}

impl sps30::Transport for UartTransport {
    type Error = EspError;

    fn write(&mut self, mut bytes: &[u8]) -> Result<(), Self::Error> {
        while !bytes.is_empty() {
            let written = self.uart.write(bytes)?;
            bytes = &bytes[written..];
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        self.uart.read(buf, TickType::from(timeout).ticks())
    }

    fn delay(&mut self, duration: Duration) {
        esp_idf_hal::delay::FreeRtos::delay_ms(duration.as_millis() as u32);
    }
}
