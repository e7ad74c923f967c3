//! The node: every sensor, output, and network component, owned in one place
//! and driven by the scheduler.
use crate::{
    config::{Config, DeviceProfile, Intervals},
    display::{Display, Readings, WifiIcon},
    ingest::IngestClient,
    metric::MetricKey,
    net::{ConnectivityManager, Radio, State},
    scheduler::{Scheduler, Timer},
    sensor::{Climate, ClimateSensor, Co2Sensor, Managed, ParticulateSensor, VocSensor},
    telemetry::TelemetryManager,
    units,
    wheel::{Indicator, PixelWheel},
};
use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use std::time::Instant;

pub struct Node<R: Radio> {
    profile: DeviceProfile,
    intervals: Intervals,
    tz_offset: FixedOffset,

    net: Option<ConnectivityManager<R>>,
    telemetry: TelemetryManager,
    display: Option<Box<dyn Display>>,
    pixel: Option<PixelWheel<Box<dyn Indicator>>>,

    pm: Option<Managed<dyn ParticulateSensor>>,
    climate: Option<Managed<dyn ClimateSensor>>,
    voc: Option<Managed<dyn VocSensor>>,
    co2: Option<Managed<dyn Co2Sensor>>,

    readings: Readings,
    last_link_state: Option<State>,
    clock: WallClock,
}

/// Wall clock time, once it's been set from the network.
#[derive(Debug)]
struct WallClock {
    synced: Option<(Instant, DateTime<FixedOffset>)>,
    next_sync: Instant,
}

// === impl Node ===

impl<R: Radio> Node<R> {
    pub fn new(config: &Config, radio: Option<R>, now: Instant) -> Self {
        let intervals = config.intervals;
        let net = radio
            .filter(|_| config.profile.wifi)
            .map(|radio| {
                ConnectivityManager::new(radio, config.healthcheck_url.clone(), intervals.net, now)
            });
        let client = IngestClient::new(
            config.ingest_url.clone(),
            config.credentials.device_id.clone(),
            &config.credentials.device_secret,
        )
        .with_timeout(intervals.ingest_timeout);

        Self {
            profile: config.profile,
            intervals,
            tz_offset: config.tz_offset,
            net,
            telemetry: TelemetryManager::new(client, intervals.telemetry_post, intervals.staleness, now),
            display: None,
            pixel: None,
            pm: None,
            climate: None,
            voc: None,
            co2: None,
            readings: Readings::default(),
            last_link_state: None,
            clock: WallClock {
                synced: None,
                next_sync: now,
            },
        }
    }

    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        if self.enabled(self.profile.display, "display") {
            self.display = Some(display);
        }
        self
    }

    pub fn with_pixel(mut self, pixel: Box<dyn Indicator>) -> Self {
        if self.enabled(self.profile.pixel_wheel, "pixel wheel") {
            self.pixel = Some(PixelWheel::new(pixel));
        }
        self
    }

    pub fn with_particulate_sensor(mut self, sensor: Box<dyn ParticulateSensor>) -> Self {
        if self.enabled(self.profile.sps30, "SPS30") {
            self.pm = Some(Managed::new("airnode::sps30", sensor));
        }
        self
    }

    pub fn with_climate_sensor(mut self, sensor: Box<dyn ClimateSensor>) -> Self {
        if self.enabled(self.profile.sht4x, "SHT4x") {
            self.climate = Some(Managed::new("airnode::sht4x", sensor));
        }
        self
    }

    pub fn with_voc_sensor(mut self, sensor: Box<dyn VocSensor>) -> Self {
        if self.enabled(self.profile.sgp40, "SGP40") {
            self.voc = Some(Managed::new("airnode::sgp40", sensor));
        }
        self
    }

    pub fn with_co2_sensor(mut self, sensor: Box<dyn Co2Sensor>) -> Self {
        if self.enabled(self.profile.scd4x, "SCD4x") {
            self.co2 = Some(Managed::new("airnode::scd4x", sensor));
        }
        self
    }

    fn enabled(&self, enabled: bool, what: &str) -> bool {
        if !enabled {
            log::info!(target: "airnode", "{what} disabled for this device");
        }
        enabled
    }

    /// Returns a scheduler with a task for each component this node has.
    ///
    /// Tasks run in a fixed order within an iteration, so that the display
    /// and link state are up to date before the sensors and telemetry use
    /// them.
    pub fn scheduler(&self, now: Instant) -> anyhow::Result<Scheduler<Self>> {
        let every_tick = std::time::Duration::ZERO;
        let i = &self.intervals;
        let mut sched = Scheduler::new(i.loop_quantum);

        if self.display.is_some() {
            sched.add("display", Timer::new(every_tick, now), Self::tick_display)?;
        }
        if self.net.is_some() {
            sched.add("net", Timer::new(every_tick, now), Self::tick_net)?;
        }
        if self.pixel.is_some() {
            sched.add("pixel", Timer::new(i.pixel, now), Self::step_pixel)?;
        }
        if self.pm.is_some() {
            sched.add("sps30", Timer::new(i.pm, now), Self::read_pm)?;
        }
        if self.climate.is_some() {
            sched.add("sht4x", Timer::with_first_delay(i.sht4x, i.sht4x_first, now), Self::read_climate)?;
        }
        if self.voc.is_some() {
            sched.add("sgp40", Timer::with_first_delay(i.sgp40, i.sgp40_first, now), Self::read_voc)?;
        }
        if self.co2.is_some() {
            sched.add("scd4x", Timer::with_first_delay(i.scd4x, i.scd4x_first, now), Self::read_co2)?;
        }
        if self.net.is_some() {
            sched.add("telemetry", Timer::new(every_tick, now), Self::tick_telemetry)?;
        }
        if self.display.is_some() {
            sched.add("clock", Timer::new(i.clock, now), Self::update_clock)?;
        }
        Ok(sched)
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn telemetry(&self) -> &TelemetryManager {
        &self.telemetry
    }

    pub fn link_state(&self) -> Option<State> {
        self.net.as_ref().map(ConnectivityManager::state)
    }

    /// The current wall clock time, if it's been synchronized.
    pub fn wall_clock(&self, now: Instant) -> Option<DateTime<FixedOffset>> {
        self.clock.now(now)
    }

    // === tasks ===

    fn tick_display(&mut self, _: Instant) -> anyhow::Result<()> {
        match self.display.as_mut() {
            Some(display) => display.tick(),
            None => Ok(()),
        }
    }

    fn tick_net(&mut self, now: Instant) -> anyhow::Result<()> {
        let Some(net) = self.net.as_mut() else {
            return Ok(());
        };
        let state = net.tick(now);

        // only touch the icon on changes, so that a blinking icon keeps
        // blinking. A failed update is tried again on the next tick.
        if self.last_link_state != Some(state) {
            let updated = match self.display.as_mut() {
                Some(display) => display.set_wifi_icon(WifiIcon::from(state)),
                None => Ok(()),
            };
            match updated {
                Ok(()) => self.last_link_state = Some(state),
                Err(error) => {
                    log::warn!(target: "airnode::display", "failed to update wifi icon: {error:#}")
                }
            }
        }

        if !net.is_connected() {
            if self.clock.synced.take().is_some() {
                log::info!(target: "airnode::clock", "link lost; will resync time when it's back");
            }
            self.clock.next_sync = now;
            return Ok(());
        }

        if state != State::Healthy || self.clock.synced.is_some() || now < self.clock.next_sync {
            return Ok(());
        }

        match net.sync_time(self.tz_offset) {
            Ok(time) => {
                self.clock.synced = Some((now, time));
                if let Some(display) = self.display.as_mut() {
                    display.update_clock(&time)?;
                }
                Ok(())
            }
            Err(error) => {
                self.clock.next_sync = now + self.intervals.time_sync_retry;
                Err(error).with_context(|| {
                    format!("retrying time sync in {:?}", self.intervals.time_sync_retry)
                })
            }
        }
    }

    fn step_pixel(&mut self, _: Instant) -> anyhow::Result<()> {
        if let Some(pixel) = self.pixel.as_mut() {
            pixel.step()?;
        }
        Ok(())
    }

    fn read_pm(&mut self, now: Instant) -> anyhow::Result<()> {
        let Some(sensor) = self.pm.as_mut() else {
            return Ok(());
        };
        let Some(measurement) = sensor.poll(|s| s.measure())? else {
            log::debug!(target: "airnode::sps30", "no new measurement yet");
            return Ok(());
        };

        let aqi = units::aqi_us_from_pm25(measurement.pm2_5)?;
        log::info!(target: "airnode::sps30", "{measurement}, AQI (US): {aqi}");
        self.telemetry.record(MetricKey::Pm25, measurement.pm2_5, now)?;
        self.telemetry.record(MetricKey::AqiUs, f32::from(aqi), now)?;
        self.readings.pm25 = Some(measurement.pm2_5);
        self.readings.aqi_us = Some(aqi);
        self.refresh_dashboard()
    }

    fn read_climate(&mut self, now: Instant) -> anyhow::Result<()> {
        let Some(sensor) = self.climate.as_mut() else {
            return Ok(());
        };
        let climate = sensor.poll(|s| s.measure())?;
        log::info!(
            target: "airnode::sht4x",
            "Temp: {:.2} \u{00B0}C, Humidity: {:.1}%",
            climate.temp_c,
            climate.rh_pct
        );
        self.record_climate(climate, now)?;
        self.refresh_dashboard()
    }

    fn read_voc(&mut self, now: Instant) -> anyhow::Result<()> {
        let Some(sensor) = self.voc.as_mut() else {
            return Ok(());
        };
        let compensation = match (self.readings.temp_c, self.readings.rh_pct) {
            (Some(temp_c), Some(rh_pct)) => Climate { temp_c, rh_pct },
            _ => Climate::DEFAULT_COMPENSATION,
        };
        let voc_index = sensor.poll(|s| s.measure_voc_index(compensation))?;
        let tvoc_ppm = units::voc_index_to_tvoc_ppm(f32::from(voc_index));
        log::info!(target: "airnode::sgp40", "TVOC: {tvoc_ppm:.3} ppm, VOC index: {voc_index}");

        self.telemetry.record(MetricKey::VocPpm, tvoc_ppm, now)?;
        self.telemetry.record(MetricKey::VocIndex, f32::from(voc_index), now)?;
        self.readings.tvoc_ppm = Some(tvoc_ppm);
        self.readings.voc_index = Some(voc_index);
        self.refresh_dashboard()
    }

    fn read_co2(&mut self, now: Instant) -> anyhow::Result<()> {
        let Some(sensor) = self.co2.as_mut() else {
            return Ok(());
        };
        let Some(reading) = sensor.poll(|s| s.read_if_ready())? else {
            log::debug!(target: "airnode::scd4x", "no new measurement yet");
            return Ok(());
        };
        log::info!(
            target: "airnode::scd4x",
            "CO2: {} ppm, Temp: {:.2} \u{00B0}C, Humidity: {:.1}%",
            reading.co2_ppm,
            reading.climate.temp_c,
            reading.climate.rh_pct
        );

        self.telemetry.record(MetricKey::Co2, f32::from(reading.co2_ppm), now)?;
        self.readings.co2_ppm = Some(reading.co2_ppm);
        // the SHT4x is more accurate, so the SCD4x's own climate readings are
        // only used when there's no SHT4x.
        if self.climate.is_none() {
            self.record_climate(reading.climate, now)?;
        }
        self.refresh_dashboard()
    }

    fn tick_telemetry(&mut self, now: Instant) -> anyhow::Result<()> {
        let Some(net) = self.net.as_mut() else {
            return Ok(());
        };
        if net.state() != State::Healthy {
            return Ok(());
        }
        let Some(session) = net.session_mut() else {
            return Ok(());
        };
        self.telemetry.tick(now, session)?;
        Ok(())
    }

    fn update_clock(&mut self, now: Instant) -> anyhow::Result<()> {
        let (Some(display), Some(time)) = (self.display.as_mut(), self.clock.now(now)) else {
            return Ok(());
        };
        display.update_clock(&time)
    }

    fn record_climate(&mut self, climate: Climate, now: Instant) -> anyhow::Result<()> {
        self.telemetry.record(MetricKey::TempC, climate.temp_c, now)?;
        self.telemetry.record(MetricKey::RhPct, climate.rh_pct, now)?;
        self.readings.temp_c = Some(climate.temp_c);
        self.readings.rh_pct = Some(climate.rh_pct);
        Ok(())
    }

    fn refresh_dashboard(&mut self) -> anyhow::Result<()> {
        match self.display.as_mut() {
            Some(display) => display
                .update_readings(&self.readings)
                .context("failed to update dashboard"),
            None => Ok(()),
        }
    }
}

// === impl WallClock ===

impl WallClock {
    fn now(&self, now: Instant) -> Option<DateTime<FixedOffset>> {
        let (synced_at, time) = self.synced?;
        let elapsed = now.saturating_duration_since(synced_at);
        Some(time + chrono::Duration::milliseconds(elapsed.as_millis() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Board,
        net::Response,
        sensor::Co2Reading,
        test_util::{pm, FakeDisplay, FakePixel, FakeRadio, Scripted},
    };
    use std::time::Duration;

    const SECOND: Duration = Duration::from_secs(1);

    fn config(device_id: &str) -> Config {
        Config::load(|key| {
            match key {
                "DEVICE_ID" => Some(device_id),
                "DEVICE_SECRET" => Some("hunter2"),
                "API_INGEST_URL" => Some("https://example.invalid/ingest"),
                "API_HEALTHCHECK_URL" => Some("https://example.invalid/health"),
                _ => None,
            }
            .map(String::from)
        })
        .unwrap()
    }

    /// Runs the scheduler at every loop quantum from `from` up to and
    /// including `to`.
    fn run(sched: &mut Scheduler<Node<FakeRadio>>, node: &mut Node<FakeRadio>, from: Instant, to: Instant) {
        let mut now = from;
        while now <= to {
            sched.run_due(node, now);
            now += Duration::from_millis(50);
        }
    }

    #[test]
    fn pm_reading_to_ingest() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        let display = FakeDisplay::default();
        let pm_sensor = Scripted::new([Some(pm(40.0)), None, Some(pm(0.0)), Some(pm(600.0))]);

        let mut node = Node::new(&config("murali-1"), Some(radio.clone()), t0)
            .with_display(Box::new(display.clone()))
            .with_particulate_sensor(Box::new(pm_sensor.clone()));
        let mut sched = node.scheduler(t0).unwrap();

        sched.run_due(&mut node, t0);
        assert_eq!(node.link_state(), Some(State::Healthy));
        assert_eq!(node.readings().pm25, Some(40.0));
        assert_eq!(node.readings().aqi_us, Some(112));
        assert_eq!(display.log().icons, vec![WifiIcon::Connected]);

        // the link came up before the sensors were read in this iteration,
        // so the reading went out right away.
        {
            let net = radio.net();
            assert_eq!(net.posts.len(), 1);
            assert_eq!(net.posts[0].body, br#"{"pm25_ugm3":40.0,"aqi_us":112}"#);
            assert!(net.posts[0].header("X-Signature").is_some());
        }

        // no new data; nothing changes.
        sched.run_due(&mut node, t0 + 5 * SECOND);
        assert_eq!(node.readings().aqi_us, Some(112));

        sched.run_due(&mut node, t0 + 10 * SECOND);
        assert_eq!(node.readings().aqi_us, Some(0));
        sched.run_due(&mut node, t0 + 15 * SECOND);
        assert_eq!(node.readings().aqi_us, Some(500));

        sched.run_due(&mut node, t0 + 60 * SECOND);
        let net = radio.net();
        assert_eq!(net.posts.len(), 2);
        assert_eq!(net.posts[1].body, br#"{"pm25_ugm3":600.0,"aqi_us":500}"#);
    }

    #[test]
    fn sensor_schedule_and_compensation() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        let climate = Scripted::new([Climate {
            temp_c: 21.5,
            rh_pct: 40.0,
        }]);
        let voc = Scripted::new([100u16, 100]);
        let co2 = Scripted::new([
            None,
            Some(Co2Reading {
                co2_ppm: 612,
                climate: Climate {
                    temp_c: 23.0,
                    rh_pct: 35.0,
                },
            }),
        ]);

        let mut node = Node::new(&config("murali-1"), Some(radio.clone()), t0)
            .with_climate_sensor(Box::new(climate.clone()))
            .with_voc_sensor(Box::new(voc.clone()))
            .with_co2_sensor(Box::new(co2.clone()));
        let mut sched = node.scheduler(t0).unwrap();

        run(&mut sched, &mut node, t0, t0 + 4 * SECOND);
        assert_eq!(climate.state().bringups, 0);

        run(&mut sched, &mut node, t0 + 4 * SECOND, t0 + 11 * SECOND);
        assert_eq!(climate.state().bringups, 1);
        assert_eq!(node.readings().temp_c, Some(21.5));
        // the first SGP40 reading (at 7s) is compensated with the SHT4x
        // reading from 5s.
        assert_eq!(
            voc.state().compensation,
            vec![Climate {
                temp_c: 21.5,
                rh_pct: 40.0
            }]
        );
        assert_eq!(node.readings().voc_index, Some(100));
        assert!(node.readings().tvoc_ppm.is_some());
        // the SCD4x wasn't ready at 10s.
        assert_eq!(node.readings().co2_ppm, None);

        run(&mut sched, &mut node, t0 + 11 * SECOND, t0 + 15 * SECOND);
        assert_eq!(node.readings().co2_ppm, Some(612));
        // there's an SHT4x, so the SCD4x's temperature is ignored.
        assert_eq!(node.readings().temp_c, Some(21.5));

        let store = node.telemetry().store();
        assert_eq!(store.get(MetricKey::Co2).unwrap().value, 612.0);
        assert_eq!(store.get(MetricKey::VocIndex).unwrap().value, 100.0);
        assert_eq!(store.get(MetricKey::TempC).unwrap().value, 21.5);
    }

    #[test]
    fn profile_without_sht4x_uses_scd4x_climate() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        let climate = Scripted::new([Climate {
            temp_c: 21.5,
            rh_pct: 40.0,
        }]);
        let voc = Scripted::new([100u16]);
        let co2 = Scripted::new([Some(Co2Reading {
            co2_ppm: 800,
            climate: Climate {
                temp_c: 23.0,
                rh_pct: 35.0,
            },
        })]);
        let pixel = FakePixel::default();

        let config = config("murali-living-room");
        assert_eq!(config.profile.board, Board::WaveshareS3Lcd28);
        let mut node = Node::new(&config, Some(radio), t0)
            .with_pixel(Box::new(pixel.clone()))
            .with_climate_sensor(Box::new(climate.clone()))
            .with_voc_sensor(Box::new(voc.clone()))
            .with_co2_sensor(Box::new(co2));
        let mut sched = node.scheduler(t0).unwrap();

        run(&mut sched, &mut node, t0, t0 + 10 * SECOND);
        assert_eq!(node.readings().co2_ppm, Some(800));
        assert_eq!(node.readings().temp_c, Some(23.0));
        assert_eq!(node.readings().rh_pct, Some(35.0));
        assert_eq!(node.readings().voc_index, None);
        assert_eq!(climate.state().bringups, 0);
        assert_eq!(voc.state().bringups, 0);
        assert!(pixel.colors.borrow().is_empty());
    }

    #[test]
    fn voc_defaults_compensation_without_climate() {
        let t0 = Instant::now();
        let voc = Scripted::new([250u16]);
        let mut node = Node::new(&config("murali-1"), None::<FakeRadio>, t0)
            .with_voc_sensor(Box::new(voc.clone()));
        let mut sched = node.scheduler(t0).unwrap();

        run(&mut sched, &mut node, t0, t0 + 7 * SECOND);
        assert_eq!(voc.state().compensation, vec![Climate::DEFAULT_COMPENSATION]);
        assert_eq!(node.link_state(), None);
    }

    #[test]
    fn sensor_failure_does_not_stop_the_loop() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        let pm_sensor = Scripted::new([Some(pm(12.0))]);
        pm_sensor.state().fail_bringup = true;
        let pixel = FakePixel::default();

        let mut node = Node::new(&config("murali-1"), Some(radio.clone()), t0)
            .with_pixel(Box::new(pixel.clone()))
            .with_particulate_sensor(Box::new(pm_sensor.clone()));
        let mut sched = node.scheduler(t0).unwrap();

        sched.run_due(&mut node, t0);
        assert_eq!(sched.failures("sps30"), Some(1));
        assert_eq!(pixel.colors.borrow().len(), 1);
        assert_eq!(node.link_state(), Some(State::Healthy));

        pm_sensor.state().fail_bringup = false;
        sched.run_due(&mut node, t0 + 5 * SECOND);
        assert_eq!(node.readings().aqi_us, Some(50));
        assert_eq!(pixel.colors.borrow().len(), 2);
    }

    #[test]
    fn telemetry_waits_for_healthy_link() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        radio.net().health_status = Some(503);
        let pm_sensor = Scripted::new([Some(pm(40.0))]);

        let mut node = Node::new(&config("murali-1"), Some(radio.clone()), t0)
            .with_particulate_sensor(Box::new(pm_sensor));
        let mut sched = node.scheduler(t0).unwrap();

        sched.run_due(&mut node, t0);
        assert_eq!(node.link_state(), Some(State::Connecting));
        assert!(radio.net().posts.is_empty());

        // the next health check passes, and the pending reading goes out.
        radio.net().health_status = Some(200);
        sched.run_due(&mut node, t0 + 30 * SECOND);
        assert_eq!(node.link_state(), Some(State::Healthy));
        assert_eq!(radio.net().posts.len(), 1);
    }

    #[test]
    fn rejected_post_is_retried() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        radio.net().post_responses.push_back(Ok(Response {
            status: 503,
            body: Vec::new(),
        }));
        let pm_sensor = Scripted::new([Some(pm(40.0))]);

        let mut node = Node::new(&config("murali-1"), Some(radio.clone()), t0)
            .with_particulate_sensor(Box::new(pm_sensor));
        let mut sched = node.scheduler(t0).unwrap();

        sched.run_due(&mut node, t0);
        assert_eq!(sched.failures("telemetry"), Some(1));
        sched.run_due(&mut node, t0 + 60 * SECOND);
        let net = radio.net();
        assert_eq!(net.posts.len(), 2);
        assert_eq!(net.posts[0].body, net.posts[1].body);
    }

    #[test]
    fn wifi_icon_failure_is_retried() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        let display = FakeDisplay::default();
        display.log().fail_icons = 1;

        let mut node = Node::new(&config("murali-1"), Some(radio.clone()), t0)
            .with_display(Box::new(display.clone()));
        let mut sched = node.scheduler(t0).unwrap();

        // the icon failure doesn't keep the link task from syncing time.
        sched.run_due(&mut node, t0);
        assert_eq!(sched.failures("net"), Some(0));
        assert!(display.log().icons.is_empty());
        assert_eq!(node.wall_clock(t0).unwrap().timestamp(), 1_700_000_000);

        sched.run_due(&mut node, t0 + SECOND);
        assert_eq!(display.log().icons, vec![WifiIcon::Connected]);
        sched.run_due(&mut node, t0 + 2 * SECOND);
        assert_eq!(display.log().icons, vec![WifiIcon::Connected]);
    }

    #[test]
    fn time_sync_lifecycle() {
        let t0 = Instant::now();
        let radio = FakeRadio::new();
        radio.net().network_time = None;
        let display = FakeDisplay::default();

        let mut node = Node::new(&config("murali-1"), Some(radio.clone()), t0)
            .with_display(Box::new(display.clone()));
        let mut sched = node.scheduler(t0).unwrap();

        sched.run_due(&mut node, t0);
        assert_eq!(sched.failures("net"), Some(1));
        assert!(node.wall_clock(t0).is_none());

        // the retry waits 30 seconds.
        radio.net().network_time = Some(1_700_000_000);
        sched.run_due(&mut node, t0 + 10 * SECOND);
        assert!(node.wall_clock(t0 + 10 * SECOND).is_none());
        sched.run_due(&mut node, t0 + 30 * SECOND);
        let synced = node.wall_clock(t0 + 30 * SECOND).unwrap();
        assert_eq!(synced.timestamp(), 1_700_000_000);
        assert_eq!(
            node.wall_clock(t0 + 32 * SECOND).unwrap().timestamp(),
            1_700_000_002
        );
        assert_eq!(display.log().clocks.first().map(String::as_str), Some("22:13:20"));

        // once synced, time isn't synced again.
        radio.net().network_time = Some(1_800_000_000);
        sched.run_due(&mut node, t0 + 40 * SECOND);
        assert_eq!(
            node.wall_clock(t0 + 40 * SECOND).unwrap().timestamp(),
            1_700_000_010
        );

        // until the link drops and comes back.
        radio.net().associated = false;
        sched.run_due(&mut node, t0 + 41 * SECOND);
        assert_eq!(node.link_state(), Some(State::Degraded));
        assert!(node.wall_clock(t0 + 41 * SECOND).is_none());
        sched.run_due(&mut node, t0 + 46 * SECOND);
        assert_eq!(node.link_state(), Some(State::Healthy));
        assert_eq!(
            node.wall_clock(t0 + 46 * SECOND).unwrap().timestamp(),
            1_800_000_000
        );
        assert_eq!(
            display.log().icons,
            vec![WifiIcon::Connected, WifiIcon::Error, WifiIcon::Connected]
        );
    }
}
