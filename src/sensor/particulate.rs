use super::{ParticulateSensor, Sensor};
use crate::retry::Retry;
use anyhow::anyhow;
use sps30::{ProtocolError, Sps30, Transport};

impl<T: Transport> Sensor for Sps30<T> {
    /// Checks for the sensor with a wake-up before running the full start
    /// sequence, so that a sensor that isn't there costs one response timeout
    /// per poll rather than one per command.
    fn bringup(&mut self) -> anyhow::Result<()> {
        // the first answer after the wake-up pulse is sometimes mangled, which
        // is worth one more try. silence is left for the next poll.
        let retry = Retry::<sps30::Error<T::Error>>::new(1)
            .with_target("airnode::sps30")
            .with_predicate(|error: &sps30::Error<T::Error>| {
                matches!(error, sps30::Error::Protocol(error) if is_garbled(error))
            });

        match retry.run(|| self.wake_up()) {
            // an awake sensor may refuse the wake-up, but it's there.
            Ok(()) | Err(sps30::Error::Protocol(ProtocolError::DeviceError(_))) => {}
            Err(error) => return Err(anyhow!("SPS30 not responding: {error:?}")),
        }

        Sps30::bringup(self)
            .map_err(|error| anyhow!("failed to start SPS30 measurement: {error:?}"))?;

        match self.serial_number() {
            Ok(serial) => log::info!(target: "airnode::sps30", "SPS30 serial number: {serial}"),
            Err(error) => log::debug!(target: "airnode::sps30", "failed to read SPS30 serial number: {error:?}"),
        }
        Ok(())
    }
}

fn is_garbled(error: &ProtocolError) -> bool {
    matches!(
        error,
        ProtocolError::ShortFrame { .. }
            | ProtocolError::LengthMismatch { .. }
            | ProtocolError::BadChecksum { .. }
            | ProtocolError::BadEscape(_)
            | ProtocolError::FrameTooLong
    )
}

impl<T: Transport> ParticulateSensor for Sps30<T> {
    fn measure(&mut self) -> anyhow::Result<Option<sps30::Measurement>> {
        self.read_measurement()
            .map_err(|error| anyhow!("failed to read SPS30 measurement: {error:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::VecDeque, convert::Infallible, time::Duration};

    /// Answers every command it's sent from a fixed script of raw frames.
    #[derive(Default)]
    struct Responder {
        frames: VecDeque<Vec<u8>>,
        rx: VecDeque<u8>,
        writes: usize,
    }

    impl Responder {
        fn respond(&mut self, cmd: sps30::Command, state: u8, data: &[u8]) {
            let mut payload = vec![0x00, cmd as u8, state, data.len() as u8];
            payload.extend_from_slice(data);
            payload.push(sps30::shdlc::checksum(&payload));
            let mut stuffed = heapless::Vec::<u8, 256>::new();
            sps30::shdlc::stuff(&payload, &mut stuffed).unwrap();
            let mut frame = vec![sps30::shdlc::START];
            frame.extend_from_slice(&stuffed);
            frame.push(sps30::shdlc::START);
            self.frames.push_back(frame);
        }
    }

    impl Transport for Responder {
        type Error = Infallible;

        fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
            self.writes += 1;
            // the wake-up pulse isn't a command, so it gets no response.
            if bytes != [0xFF].as_slice() {
                if let Some(frame) = self.frames.pop_front() {
                    self.rx.extend(frame);
                }
            }
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8], _: Duration) -> Result<usize, Self::Error> {
            let mut n = 0;
            while n < buf.len() {
                match self.rx.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }

        fn delay(&mut self, _: Duration) {}
    }

    fn sensor(responder: Responder) -> Sps30<Responder> {
        Sps30::new(responder).with_timeout(Duration::from_millis(10))
    }

    #[test]
    fn bringup_gives_up_on_silent_sensor() {
        let mut sensor = sensor(Responder::default());
        let error = Sensor::bringup(&mut sensor).unwrap_err();
        assert!(format!("{error}").contains("NoResponse"), "{error}");
        // just the wake-up pulse and one wake-up command; nothing else waits
        // out a timeout.
        assert_eq!(sensor.into_inner().writes, 2);
    }

    #[test]
    fn bringup_succeeds() {
        use sps30::Command::*;
        let mut responder = Responder::default();
        // the first wake-up, then the start sequence.
        responder.respond(WakeUp, 0, &[]);
        responder.respond(WakeUp, 0, &[]);
        responder.respond(Reset, 0, &[]);
        responder.respond(StartMeasurement, 0, &[]);
        let mut serial = b"ABCD1234".to_vec();
        serial.push(0);
        responder.respond(DeviceInformation, 0, &serial);

        let mut sensor = sensor(responder);
        Sensor::bringup(&mut sensor).unwrap();
        assert_eq!(sensor.into_inner().writes, 7);
    }

    #[test]
    fn bringup_retries_garbled_wake_up() {
        use sps30::Command::*;
        let mut responder = Responder::default();
        responder.respond(WakeUp, 0, &[]);
        // corrupt the checksum byte, just before the closing delimiter.
        let frame = responder.frames.back_mut().unwrap();
        let chk = frame.len() - 2;
        frame[chk] ^= 0x01;
        responder.respond(WakeUp, 0, &[]);
        responder.respond(WakeUp, 0, &[]);
        responder.respond(Reset, 0, &[]);
        responder.respond(StartMeasurement, 0, &[]);
        responder.respond(DeviceInformation, 0, &[0]);

        let mut sensor = sensor(responder);
        Sensor::bringup(&mut sensor).unwrap();
        assert_eq!(sensor.into_inner().writes, 9);
    }

    #[test]
    fn bringup_accepts_refused_wake_up() {
        use sps30::Command::*;
        let mut responder = Responder::default();
        // already awake, so the wake-up command is rejected.
        responder.respond(WakeUp, 0x43, &[]);
        responder.respond(WakeUp, 0x43, &[]);
        responder.respond(Reset, 0, &[]);
        responder.respond(StartMeasurement, 0, &[]);
        responder.respond(DeviceInformation, 0, &[0]);

        let mut sensor = sensor(responder);
        Sensor::bringup(&mut sensor).unwrap();
    }

    #[test]
    fn measure_reads_mass_concentrations() {
        let mut responder = Responder::default();
        let mut data = Vec::new();
        for value in [1.0f32, 40.0, 45.0, 50.0] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        responder.respond(sps30::Command::ReadMeasuredValues, 0, &data);

        let mut sensor = sensor(responder);
        let measurement = sensor.measure().unwrap().unwrap();
        assert_eq!(measurement.pm2_5, 40.0);
        assert_eq!(measurement.pm10_0, 50.0);
    }

    #[test]
    fn measure_reports_device_errors() {
        let mut responder = Responder::default();
        responder.respond(sps30::Command::ReadMeasuredValues, 0x43, &[]);
        let mut sensor = sensor(responder);
        let error = sensor.measure().unwrap_err();
        assert!(format!("{error}").contains("DeviceError"), "{error}");
    }
}
