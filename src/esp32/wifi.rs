//! WiFi join using esp-idf-svc
//!
//! Cycles through the candidate networks until one of them connects or the
//! join timeout expires.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::EspError;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{error, info, warn};
use std::net::IpAddr;
use std::time::Duration;

use crate::network::{Credential, JoinBudget, NetworkInfo, NetworkLink};
use crate::types::NetworkError;

const RETRY_DELAY: Duration = Duration::from_millis(1000);

pub struct EspWifiLink {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl EspWifiLink {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, EspError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self { wifi })
    }

    fn try_join(&mut self, credential: &Credential, budget: &JoinBudget) -> Result<NetworkInfo, NetworkError> {
        let configuration = Configuration::Client(ClientConfiguration {
            ssid: credential
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::Driver(format!("SSID too long: {}", credential.ssid)))?,
            password: credential
                .password
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::Driver("password too long".into()))?,
            auth_method: if credential.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });

        self.wifi.set_configuration(&configuration).map_err(driver_error)?;
        if !self.wifi.is_started().map_err(driver_error)? {
            budget.check()?;
            self.wifi.start().map_err(driver_error)?;
        }
        budget.check()?;
        self.wifi.connect().map_err(driver_error)?;
        budget.check()?;
        self.wifi.wait_netif_up().map_err(driver_error)?;

        let ip_info = self.wifi.wifi().sta_netif().get_ip_info().map_err(driver_error)?;
        Ok(NetworkInfo {
            address: IpAddr::from(ip_info.ip.octets()),
            ssid: Some(credential.ssid.clone()),
        })
    }
}

impl NetworkLink for EspWifiLink {
    fn join(&mut self, credentials: &[Credential], timeout: Duration) -> Result<NetworkInfo, NetworkError> {
        if credentials.is_empty() {
            return Err(NetworkError::NoCredentials);
        }

        let budget = JoinBudget::start(timeout);
        for credential in credentials.iter().cycle() {
            if budget.check().is_err() {
                break;
            }

            info!("[WiFi] Trying {}", credential.ssid);
            match self.try_join(credential, &budget) {
                Ok(network) => return Ok(network),
                Err(NetworkError::Timeout(_)) => break,
                Err(e) => {
                    warn!("[WiFi] {} failed: {}", credential.ssid, e);
                    let _ = self.wifi.disconnect();
                    std::thread::sleep(RETRY_DELAY.min(budget.remaining()));
                }
            }
        }

        error!("[WiFi] WiFi connection failed");
        Err(NetworkError::Timeout(timeout))
    }
}

fn driver_error(e: EspError) -> NetworkError {
    NetworkError::Driver(e.to_string())
}
