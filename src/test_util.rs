//! Test doubles for the node's collaborators.
use crate::{
    display::{Display, Readings, WifiIcon},
    net::{Radio, Response, Session},
    sensor::{Climate, ClimateSensor, Co2Reading, Co2Sensor, ParticulateSensor, Sensor, VocSensor},
    wheel::Indicator,
};
use chrono::{DateTime, FixedOffset};
use std::{
    cell::{RefCell, RefMut},
    collections::VecDeque,
    rc::Rc,
    time::Duration,
};

/// The state of the pretend network, shared between a [`FakeRadio`], its
/// sessions, and the test.
#[derive(Debug)]
pub(crate) struct FakeNet {
    pub associated: bool,
    pub refuse_association: bool,
    pub associate_attempts: usize,
    pub sessions_opened: usize,
    /// `None` makes health check requests fail outright.
    pub health_status: Option<u16>,
    pub health_checks: usize,
    pub network_time: Option<i64>,
    pub posts: Vec<Post>,
    /// Responses to hand out for POSTs, in order. Once these run out, every
    /// POST is acknowledged.
    pub post_responses: VecDeque<anyhow::Result<Response>>,
}

#[derive(Clone, Debug)]
pub(crate) struct Post {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub(crate) struct FakeRadio {
    net: Rc<RefCell<FakeNet>>,
}

#[derive(Debug)]
pub(crate) struct FakeSession {
    net: Rc<RefCell<FakeNet>>,
}

// === impl FakeNet ===

impl Default for FakeNet {
    fn default() -> Self {
        Self {
            associated: false,
            refuse_association: false,
            associate_attempts: 0,
            sessions_opened: 0,
            health_status: Some(200),
            health_checks: 0,
            network_time: Some(1_700_000_000),
            posts: Vec::new(),
            post_responses: VecDeque::new(),
        }
    }
}

impl Post {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

// === impl FakeRadio ===

impl FakeRadio {
    pub fn new() -> Self {
        Self {
            net: Rc::new(RefCell::new(FakeNet::default())),
        }
    }

    pub fn net(&self) -> RefMut<'_, FakeNet> {
        self.net.borrow_mut()
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            net: self.net.clone(),
        }
    }
}

impl Radio for FakeRadio {
    type Session = FakeSession;

    fn is_associated(&mut self) -> bool {
        self.net().associated
    }

    fn associate(&mut self) -> anyhow::Result<()> {
        let mut net = self.net();
        net.associate_attempts += 1;
        anyhow::ensure!(!net.refuse_association, "no such network");
        net.associated = true;
        Ok(())
    }

    fn open_session(&mut self) -> anyhow::Result<Self::Session> {
        self.net().sessions_opened += 1;
        Ok(self.session())
    }

    fn sync_time(&mut self) -> anyhow::Result<i64> {
        self.net()
            .network_time
            .ok_or_else(|| anyhow::anyhow!("NTP server unreachable"))
    }
}

// === impl FakeSession ===

impl Session for FakeSession {
    fn get(&mut self, _url: &str, _timeout: Duration) -> anyhow::Result<Response> {
        let mut net = self.net.borrow_mut();
        net.health_checks += 1;
        let status = net
            .health_status
            .ok_or_else(|| anyhow::anyhow!("connection timed out"))?;
        Ok(Response {
            status,
            body: Vec::new(),
        })
    }

    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> anyhow::Result<Response> {
        let mut net = self.net.borrow_mut();
        net.posts.push(Post {
            url: url.to_owned(),
            headers: headers
                .iter()
                .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            body: body.to_vec(),
            timeout,
        });
        net.post_responses.pop_front().unwrap_or_else(|| {
            Ok(Response {
                status: 200,
                body: br#"{"ok":true,"ts":1700000000}"#.to_vec(),
            })
        })
    }
}

// === sensors ===

/// Hands out scripted readings; an empty script is a read error.
#[derive(Clone, Debug)]
pub(crate) struct Scripted<T> {
    inner: Rc<RefCell<ScriptedInner<T>>>,
}

#[derive(Debug)]
pub(crate) struct ScriptedInner<T> {
    pub readings: VecDeque<T>,
    pub fail_bringup: bool,
    pub bringups: usize,
    pub compensation: Vec<Climate>,
}

impl<T> Default for ScriptedInner<T> {
    fn default() -> Self {
        Self {
            readings: VecDeque::new(),
            fail_bringup: false,
            bringups: 0,
            compensation: Vec::new(),
        }
    }
}

impl<T> Scripted<T> {
    pub fn new(readings: impl IntoIterator<Item = T>) -> Self {
        let this = Self {
            inner: Rc::new(RefCell::new(ScriptedInner::default())),
        };
        this.state().readings.extend(readings);
        this
    }

    pub fn state(&self) -> RefMut<'_, ScriptedInner<T>> {
        self.inner.borrow_mut()
    }

    fn next(&self) -> anyhow::Result<T> {
        self.state()
            .readings
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no reading scripted"))
    }
}

impl<T> Sensor for Scripted<T> {
    fn bringup(&mut self) -> anyhow::Result<()> {
        let mut state = self.state();
        state.bringups += 1;
        anyhow::ensure!(!state.fail_bringup, "device not found");
        Ok(())
    }
}

impl ClimateSensor for Scripted<Climate> {
    fn measure(&mut self) -> anyhow::Result<Climate> {
        self.next()
    }
}

impl VocSensor for Scripted<u16> {
    fn measure_voc_index(&mut self, compensation: Climate) -> anyhow::Result<u16> {
        self.state().compensation.push(compensation);
        self.next()
    }
}

impl ParticulateSensor for Scripted<Option<sps30::Measurement>> {
    fn measure(&mut self) -> anyhow::Result<Option<sps30::Measurement>> {
        self.next()
    }
}

impl Co2Sensor for Scripted<Option<Co2Reading>> {
    fn read_if_ready(&mut self) -> anyhow::Result<Option<Co2Reading>> {
        self.next()
    }
}

/// A mass-concentration-only SPS30 measurement.
pub(crate) fn pm(pm2_5: f32) -> sps30::Measurement {
    sps30::Measurement {
        pm1_0: pm2_5 * 0.8,
        pm2_5,
        pm4_0: pm2_5 * 1.1,
        pm10_0: pm2_5 * 1.2,
        counts: None,
        typical_particle_size: None,
    }
}

// === outputs ===

#[derive(Clone, Debug, Default)]
pub(crate) struct FakeDisplay {
    inner: Rc<RefCell<DisplayLog>>,
}

#[derive(Debug, Default)]
pub(crate) struct DisplayLog {
    pub ticks: usize,
    pub icons: Vec<WifiIcon>,
    pub readings: Vec<Readings>,
    pub clocks: Vec<String>,
    /// The number of upcoming icon updates that fail.
    pub fail_icons: usize,
}

impl FakeDisplay {
    pub fn log(&self) -> RefMut<'_, DisplayLog> {
        self.inner.borrow_mut()
    }
}

impl Display for FakeDisplay {
    fn tick(&mut self) -> anyhow::Result<()> {
        self.log().ticks += 1;
        Ok(())
    }

    fn set_wifi_icon(&mut self, icon: WifiIcon) -> anyhow::Result<()> {
        let mut log = self.log();
        if log.fail_icons > 0 {
            log.fail_icons -= 1;
            anyhow::bail!("display bus error");
        }
        log.icons.push(icon);
        Ok(())
    }

    fn update_readings(&mut self, readings: &Readings) -> anyhow::Result<()> {
        self.log().readings.push(readings.clone());
        Ok(())
    }

    fn update_clock(&mut self, time: &DateTime<FixedOffset>) -> anyhow::Result<()> {
        self.log().clocks.push(time.format("%H:%M:%S").to_string());
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct FakePixel {
    pub colors: Rc<RefCell<Vec<(u8, u8, u8)>>>,
}

impl Indicator for FakePixel {
    fn set_color(&mut self, r: u8, g: u8, b: u8) -> anyhow::Result<()> {
        self.colors.borrow_mut().push((r, g, b));
        Ok(())
    }
}
