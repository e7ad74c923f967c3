// A blocking driver for the Sensirion SPS30 particulate matter sensor, talking
// SHDLC over its UART interface.
//
// datasheet:
// https://sensirion.com/media/documents/8600FF88/616542B5/Sensirion_PM_Sensors_Datasheet_SPS30.pdf
//
// the driver doesn't know anything about UARTs. it's generic over a
// `Transport` that can write bytes and read bytes with a timeout, so it can be
// driven by a hardware UART on the device and by a scripted buffer in tests.
use core::fmt;
use std::time::{Duration, Instant};

pub mod shdlc;

pub use shdlc::ProtocolError;

/// A raw byte-stream connection to the sensor.
pub trait Transport {
    type Error: fmt::Debug;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Reads up to `buf.len()` bytes, waiting at most `timeout` for the first
    /// one. Returns `Ok(0)` if nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error>;

    /// Blocks for `duration`. The sensor needs a few fixed pauses during
    /// bring-up.
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

#[derive(Debug)]
pub struct Sps30<T> {
    transport: T,
    timeout: Duration,
}

/// SHDLC command opcodes understood by the SPS30.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Command {
    StartMeasurement = 0x00,
    StopMeasurement = 0x01,
    ReadMeasuredValues = 0x03,
    Sleep = 0x10,
    WakeUp = 0x11,
    StartFanCleaning = 0x56,
    DeviceInformation = 0xD0,
    ReadVersion = 0xD1,
    Reset = 0xD3,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Measurement {
    /// PM1.0 mass concentration in µg/m³.
    pub pm1_0: f32,
    /// PM2.5 mass concentration in µg/m³.
    pub pm2_5: f32,
    /// PM4.0 mass concentration in µg/m³.
    pub pm4_0: f32,
    /// PM10 mass concentration in µg/m³.
    pub pm10_0: f32,
    /// Number concentrations, if the sensor sent the full response.
    pub counts: Option<Counts>,
    /// Typical particle size in µm, if the sensor sent the full response.
    pub typical_particle_size: Option<f32>,
}

/// Number concentrations in #/cm³.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Counts {
    pub pm0_5: f32,
    pub pm1_0: f32,
    pub pm2_5: f32,
    pub pm4_0: f32,
    pub pm10_0: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Version {
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub hardware: u8,
    pub shdlc_major: u8,
    pub shdlc_minor: u8,
}

#[derive(Debug)]
pub enum Error<E> {
    /// The underlying transport failed.
    Serial(E),
    /// The sensor's response didn't make sense.
    Protocol(ProtocolError),
}

pub type Data = heapless::Vec<u8, { shdlc::MAX_DATA_LEN }>;

impl<T> Sps30<T>
where
    T: Transport,
{
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the overall deadline for receiving one response frame.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Puts the sensor into a known, measuring state: wakes it up if it was
    /// asleep, resets it, and starts measuring with float output.
    ///
    /// The wake-up and reset responses are ignored, since a sensor that wasn't
    /// asleep may reject the wake-up command.
    pub fn bringup(&mut self) -> Result<(), Error<T::Error>> {
        if let Err(error) = self.wake_up() {
            log::debug!(target: "sps30", "wake-up not acknowledged: {error}");
        }
        if let Err(error) = self.reset() {
            log::debug!(target: "sps30", "reset not acknowledged: {error}");
        }
        self.transport.delay(Duration::from_millis(500));

        self.start_measurement()?;
        // the first measurement takes about a second to show up.
        self.transport.delay(Duration::from_millis(1200));
        Ok(())
    }

    /// Wakes the sensor from sleep mode.
    pub fn wake_up(&mut self) -> Result<(), Error<T::Error>> {
        // a low pulse on RX re-enables the UART interface while the sensor is
        // sleeping; the wake-up command then has to follow within 100 ms.
        self.transport.write(&[0xFF]).map_err(Error::Serial)?;
        self.transport.delay(Duration::from_millis(10));
        self.execute(Command::WakeUp, &[]).map(|_| ())
    }

    pub fn reset(&mut self) -> Result<(), Error<T::Error>> {
        self.execute(Command::Reset, &[]).map(|_| ())
    }

    /// Starts continuous measurement with big-endian IEEE754 float output.
    pub fn start_measurement(&mut self) -> Result<(), Error<T::Error>> {
        const SUBCOMMAND: u8 = 0x01;
        const FLOAT_FORMAT: u8 = 0x03;
        self.execute(Command::StartMeasurement, &[SUBCOMMAND, FLOAT_FORMAT])
            .map(|_| ())
    }

    pub fn stop_measurement(&mut self) -> Result<(), Error<T::Error>> {
        self.execute(Command::StopMeasurement, &[]).map(|_| ())
    }

    pub fn sleep(&mut self) -> Result<(), Error<T::Error>> {
        self.execute(Command::Sleep, &[]).map(|_| ())
    }

    pub fn start_fan_cleaning(&mut self) -> Result<(), Error<T::Error>> {
        self.execute(Command::StartFanCleaning, &[]).map(|_| ())
    }

    /// Reads the latest measurement. Returns `Ok(None)` if the sensor has no
    /// new values since the last read (it answers with an empty data field).
    pub fn read_measurement(&mut self) -> Result<Option<Measurement>, Error<T::Error>> {
        let data = self.execute(Command::ReadMeasuredValues, &[])?;
        if data.is_empty() {
            return Ok(None);
        }
        Measurement::parse(&data)
            .map(Some)
            .map_err(Error::Protocol)
    }

    pub fn serial_number(&mut self) -> Result<heapless::String<32>, Error<T::Error>> {
        const SERIAL_NUMBER: u8 = 0x03;
        let data = self.execute(Command::DeviceInformation, &[SERIAL_NUMBER])?;
        let mut serial = heapless::String::new();
        for &byte in data.iter().take_while(|&&byte| byte != 0) {
            if serial.push(byte as char).is_err() {
                break;
            }
        }
        Ok(serial)
    }

    pub fn version(&mut self) -> Result<Version, Error<T::Error>> {
        let data = self.execute(Command::ReadVersion, &[])?;
        match data[..] {
            [firmware_major, firmware_minor, _, hardware, _, shdlc_major, shdlc_minor, ..] => {
                Ok(Version {
                    firmware_major,
                    firmware_minor,
                    hardware,
                    shdlc_major,
                    shdlc_minor,
                })
            }
            _ => Err(Error::Protocol(ProtocolError::ShortFrame { len: data.len() })),
        }
    }

    /// Sends one command and waits for the matching response, returning its
    /// data field.
    pub fn execute(&mut self, command: Command, data: &[u8]) -> Result<Data, Error<T::Error>> {
        let cmd = command as u8;
        let request = shdlc::encode_command(cmd, data)?;
        log::trace!(target: "sps30", "-> {command:?} {:02x?}", &request[..]);
        self.transport.write(&request).map_err(Error::Serial)?;

        let frame = self.read_frame()?;
        log::trace!(target: "sps30", "<- {:02x?}", &frame[..]);
        let data = shdlc::decode_response(&frame, cmd)?;
        // the data field of a decoded frame always fits.
        Ok(Data::from_slice(data).unwrap_or_default())
    }

    fn read_frame(&mut self) -> Result<shdlc::Frame, Error<T::Error>> {
        let deadline = Instant::now() + self.timeout;
        let mut reader = shdlc::FrameReader::new();
        let mut byte = [0u8; 1];

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Protocol(ProtocolError::NoResponse));
            }

            let n = self
                .transport
                .read(&mut byte, deadline - now)
                .map_err(Error::Serial)?;
            if n == 0 {
                continue;
            }

            if let Some(frame) = reader.push(byte[0]) {
                return frame.map_err(Error::Protocol);
            }
        }
    }
}

// === impl Measurement ===

impl Measurement {
    /// Parses the float-format measurement response: four mass
    /// concentrations, optionally followed by five number concentrations and
    /// the typical particle size.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let float = |idx: usize| -> Option<f32> {
            let bytes = data.get(idx * 4..idx * 4 + 4)?;
            Some(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        };
        let short = || ProtocolError::ShortFrame { len: data.len() };

        let counts = match (float(4), float(5), float(6), float(7), float(8)) {
            (Some(pm0_5), Some(pm1_0), Some(pm2_5), Some(pm4_0), Some(pm10_0)) => Some(Counts {
                pm0_5,
                pm1_0,
                pm2_5,
                pm4_0,
                pm10_0,
            }),
            _ => None,
        };

        Ok(Self {
            pm1_0: float(0).ok_or_else(short)?,
            pm2_5: float(1).ok_or_else(short)?,
            pm4_0: float(2).ok_or_else(short)?,
            pm10_0: float(3).ok_or_else(short)?,
            counts,
            typical_particle_size: float(9),
        })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = f.width().unwrap_or(0);
        let prec = f.precision().unwrap_or(1);
        write!(
            f,
            "PM1.0={:>width$.prec$} PM2.5={:>width$.prec$} PM4.0={:>width$.prec$} PM10={:>width$.prec$} µg/m³",
            self.pm1_0, self.pm2_5, self.pm4_0, self.pm10_0
        )
    }
}

// === impl Error ===

impl<E> From<ProtocolError> for Error<E> {
    fn from(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(error) => write!(f, "serial error: {error:?}"),
            Self::Protocol(error) => fmt::Display::fmt(error, f),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for Error<E> {}
