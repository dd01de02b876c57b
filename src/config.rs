//! Build-time configuration and timing constants

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::debounce::DEBOUNCE_WINDOW;
use crate::network::Credential;
use crate::notifier::{BroadcastNotifier, Notifier, PushClient, PushNotifier};
use crate::types::NotifyError;

pub const DEFAULT_PUSH_URL: &str = "http://fcm.googleapis.com/fcm/send";
pub const DEFAULT_PUSH_TOPIC: &str = "/topics/news";
pub const DEFAULT_BROADCAST_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 255), 5000));

/// Timing constants of the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// How long a single poll waits for a card
    pub poll_timeout: Duration,
    /// Pause after a poll without a card
    pub idle_pause: Duration,
    /// Pause after a card access error
    pub access_error_pause: Duration,
    /// How long the duplicate indication is shown
    pub duplicate_pause: Duration,
    /// Pause after a card has been reported
    pub accept_pause: Duration,
    /// Same IDm within this window of the last accepted scan is suppressed
    pub debounce_window: Duration,
    /// Gap between fault patterns
    pub fault_pause: Duration,
    pub network_join_timeout: Duration,
    /// Read timeout for push requests
    pub push_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(5000),
            idle_pause: Duration::from_millis(500),
            access_error_pause: Duration::from_millis(500),
            duplicate_pause: Duration::from_millis(500),
            accept_pause: Duration::from_millis(1000),
            debounce_window: DEBOUNCE_WINDOW,
            fault_pause: Duration::from_millis(1000),
            network_join_timeout: Duration::from_millis(60_000),
            push_timeout: Duration::from_millis(4000),
        }
    }
}

/// Reader polling parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// `0xFFFF` answers for any system
    pub system_code: u16,
    /// `0x01` asks the card for its system code
    pub request_code: u8,
    /// `0xFF` makes the reader retry activation until the poll timeout
    pub activation_retries: u8,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            system_code: 0xFFFF,
            request_code: 0x01,
            activation_retries: 0xFF,
        }
    }
}

/// Where detected cards are reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationConfig {
    /// JSON push message over HTTP POST
    Push {
        url: String,
        auth_key: String,
        topic: String,
    },
    /// Plain text line in a UDP broadcast datagram
    Broadcast { address: SocketAddr },
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig::Broadcast {
            address: DEFAULT_BROADCAST_ADDR,
        }
    }
}

impl NotificationConfig {
    /// Create the notifier, using `client` to open the HTTP backend for push
    pub fn build_with<C, F>(&self, client: F, timeout: Duration) -> Result<Box<dyn Notifier>, NotifyError>
    where
        C: PushClient + 'static,
        F: FnOnce() -> Result<C, NotifyError>,
    {
        match self {
            NotificationConfig::Broadcast { address } => Ok(Box::new(BroadcastNotifier::new(*address)?)),
            NotificationConfig::Push { url, auth_key, topic } => Ok(Box::new(PushNotifier::new(
                client()?,
                url.clone(),
                auth_key.clone(),
                topic.clone(),
                timeout,
            ))),
        }
    }

    /// Create the notifier for a host build
    #[cfg(feature = "push-http")]
    pub fn build(&self, timeout: Duration) -> Result<Box<dyn Notifier>, NotifyError> {
        self.build_with(|| crate::http::ReqwestClient::new(timeout), timeout)
    }

    /// Create the notifier for a host build without an HTTP backend
    #[cfg(not(feature = "push-http"))]
    pub fn build(&self, _timeout: Duration) -> Result<Box<dyn Notifier>, NotifyError> {
        match self {
            NotificationConfig::Broadcast { address } => Ok(Box::new(BroadcastNotifier::new(*address)?)),
            NotificationConfig::Push { .. } => Err(NotifyError::Unsupported),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub reader: ReaderConfig,
    pub timing: Timing,
    /// Candidate networks, tried in order
    pub networks: Vec<Credential>,
    pub notification: NotificationConfig,
    /// Number of startup blink patterns shown before the reader is touched
    pub startup_blinks: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            timing: Timing::default(),
            networks: Vec::new(),
            notification: NotificationConfig::default(),
            startup_blinks: 4,
        }
    }
}

impl Config {
    /// Defaults plus secrets baked in at compile time.
    ///
    /// Networks come from `FELICA_WIFI_SSID1`/`FELICA_WIFI_PASSWORD1` and
    /// `FELICA_WIFI_SSID2`/`FELICA_WIFI_PASSWORD2`. When `FELICA_PUSH_AUTH_KEY`
    /// is set cards are pushed to the default endpoint, otherwise broadcast.
    pub fn from_build_env() -> Self {
        let networks = [
            (option_env!("FELICA_WIFI_SSID1"), option_env!("FELICA_WIFI_PASSWORD1")),
            (option_env!("FELICA_WIFI_SSID2"), option_env!("FELICA_WIFI_PASSWORD2")),
        ]
        .into_iter()
        .filter_map(|(ssid, password)| ssid.map(|ssid| Credential::new(ssid, password.unwrap_or(""))))
        .collect();

        let notification = match option_env!("FELICA_PUSH_AUTH_KEY") {
            Some(auth_key) => NotificationConfig::Push {
                url: DEFAULT_PUSH_URL.into(),
                auth_key: auth_key.into(),
                topic: DEFAULT_PUSH_TOPIC.into(),
            },
            None => NotificationConfig::default(),
        };

        Self {
            networks,
            notification,
            ..Self::default()
        }
    }
}
