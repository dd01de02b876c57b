//! Network join

use log::{debug, info};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::types::NetworkError;

/// A candidate network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub ssid: String,
    pub password: String,
}

impl Credential {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

/// The network that was joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub address: IpAddr,
    /// `None` when the link is not managed by this process
    pub ssid: Option<String>,
}

/// Brings the network up once at startup.
pub trait NetworkLink {
    /// Join one of `credentials`, giving up after `timeout`
    fn join(&mut self, credentials: &[Credential], timeout: Duration) -> Result<NetworkInfo, NetworkError>;
}

/// Deadline for one join, checked before every blocking driver call
#[derive(Debug, Clone, Copy)]
pub struct JoinBudget {
    timeout: Duration,
    deadline: Instant,
}

impl JoinBudget {
    pub fn start(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Time left, or [`NetworkError::Timeout`] once the budget is spent
    pub fn check(&self) -> Result<Duration, NetworkError> {
        match self.remaining() {
            left if left.is_zero() => Err(NetworkError::Timeout(self.timeout)),
            left => Ok(left),
        }
    }
}

/// Network owned by the host operating system.
///
/// Joining only checks that a route towards `probe` exists and reports the
/// local address the kernel picked for it. No packets are sent.
pub struct HostNetwork {
    probe: SocketAddr,
}

impl HostNetwork {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }
}

impl NetworkLink for HostNetwork {
    fn join(&mut self, credentials: &[Credential], _timeout: Duration) -> Result<NetworkInfo, NetworkError> {
        if !credentials.is_empty() {
            debug!("Ignoring {} credentials, host manages the link", credentials.len());
        }

        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| NetworkError::Driver(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| NetworkError::Driver(e.to_string()))?;
        socket
            .connect(self.probe)
            .map_err(|e| NetworkError::Driver(format!("no route to {}: {}", self.probe, e)))?;
        let address = socket
            .local_addr()
            .map_err(|e| NetworkError::Driver(e.to_string()))?
            .ip();

        info!("[NET] Host network up, local address {}", address);
        Ok(NetworkInfo { address, ssid: None })
    }
}
