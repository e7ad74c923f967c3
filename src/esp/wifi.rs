use crate::{config::WifiCredentials, net::Radio};
use anyhow::Context;
use embedded_svc::wifi::{ClientConfiguration, Configuration};
use esp_idf_hal::{modem::Modem, peripheral::Peripheral};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    sntp::{EspSntp, SyncStatus},
    wifi::{BlockingWifi, EspWifi},
};
use std::{
    net::Ipv4Addr,
    time::{SystemTime, UNIX_EPOCH},
};

use super::http::EspSession;

pub struct EspRadio {
    wifi: BlockingWifi<EspWifi<'static>>,
    sntp: Option<EspSntp>,
}

const TARGET: &str = "airnode::net";

// === impl EspRadio ===

impl EspRadio {
    /// Configures and starts the radio in station mode. This doesn't wait for
    /// association; the connectivity manager does that on its first tick.
    pub fn new(
        modem: impl Peripheral<P = Modem> + 'static,
        sysloop: EspSystemEventLoop,
        creds: &WifiCredentials,
    ) -> anyhow::Result<Self> {
        log::info!(target: TARGET, "bringing up WiFi...");
        let wifi = EspWifi::new(modem, sysloop.clone(), None)?;
        let mut wifi = BlockingWifi::wrap(wifi, sysloop)?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: creds
                .ssid
                .parse()
                .map_err(|_| anyhow::anyhow!("ssid too long"))?,
            password: creds
                .password
                .parse()
                .map_err(|_| anyhow::anyhow!("password too long"))?,
            ..Default::default()
        }))
        .context("failed to set WiFi configuration")?;

        wifi.start().context("failed to start WiFi")?;
        log::info!(target: TARGET, "WiFi started; will connect to {}", creds.ssid);

        Ok(Self { wifi, sntp: None })
    }

    fn has_ip(&self) -> bool {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .map(|info| info.ip != Ipv4Addr::UNSPECIFIED)
            .unwrap_or(false)
    }
}

impl Radio for EspRadio {
    type Session = EspSession;

    fn is_associated(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.has_ip()
    }

    fn associate(&mut self) -> anyhow::Result<()> {
        // a previous attempt may have left the driver half-connected.
        if self.wifi.is_connected().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }
        self.wifi.connect().context("WiFi did not connect")?;
        self.wifi
            .wait_netif_up()
            .context("WiFi did not receive a DHCP lease")?;

        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        log::info!(target: TARGET, "WiFi DHCP info: {ip_info:?}");
        Ok(())
    }

    fn open_session(&mut self) -> anyhow::Result<Self::Session> {
        Ok(EspSession::new())
    }

    fn sync_time(&mut self) -> anyhow::Result<i64> {
        if self.sntp.is_none() {
            self.sntp = Some(EspSntp::new_default().context("failed to start SNTP")?);
        }

        // SNTP sets the system clock itself once it completes. Until then,
        // the caller tries again later rather than stalling the loop here.
        let status = self.sntp.as_ref().map(EspSntp::get_sync_status);
        anyhow::ensure!(
            status == Some(SyncStatus::Completed),
            "network time not yet synced"
        );

        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock is before the Unix epoch")?;
        Ok(since_epoch.as_secs() as i64)
    }
}
