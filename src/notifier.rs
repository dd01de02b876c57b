//! Card notifications: HTTP push and UDP broadcast

use log::{debug, info};
use serde::Serialize;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::types::{Idm, NotifyError};

/// Result of a delivered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// HTTP status and response body
    Http { status: u16, body: String },
    /// Bytes handed to the network stack
    Datagram { bytes: usize },
}

/// Reports an accepted card to a remote endpoint.
pub trait Notifier {
    fn notify(&mut self, idm: &Idm) -> Result<Delivery, NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, idm: &Idm) -> Result<Delivery, NotifyError> {
        (**self).notify(idm)
    }
}

/// Push message body
#[derive(Debug, Serialize)]
pub struct PushMessage<'a> {
    pub to: &'a str,
    pub notification: PushNotification,
}

#[derive(Debug, Serialize)]
pub struct PushNotification {
    pub text: String,
    pub sound: &'static str,
}

pub fn push_payload<'a>(topic: &'a str, idm: &Idm) -> PushMessage<'a> {
    PushMessage {
        to: topic,
        notification: PushNotification {
            text: format!("Card: {:X}", idm),
            sound: "default",
        },
    }
}

/// Text line sent in a broadcast datagram
pub fn broadcast_line(idm: &Idm) -> String {
    format!("Found card -> IDm: {}\r\n", idm.to_spaced_lower())
}

/// Response returned by a [`PushClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Trait for HTTP backends used by [`PushNotifier`].
pub trait PushClient {
    /// POST `body` to `url`, giving up after `timeout`
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse, NotifyError>;
}

/// Sends each card as a JSON push message to a fixed topic
pub struct PushNotifier<C: PushClient> {
    client: C,
    url: String,
    auth_key: String,
    topic: String,
    timeout: Duration,
}

impl<C: PushClient> PushNotifier<C> {
    pub fn new(client: C, url: String, auth_key: String, topic: String, timeout: Duration) -> Self {
        Self {
            client,
            url,
            auth_key,
            topic,
            timeout,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: PushClient> Notifier for PushNotifier<C> {
    fn notify(&mut self, idm: &Idm) -> Result<Delivery, NotifyError> {
        info!("[HTTP] Sending card data to the server...");
        let body = serde_json::to_vec(&push_payload(&self.topic, idm))?;
        debug!("[HTTP] POST {} {}", self.url, String::from_utf8_lossy(&body));

        let headers = [
            ("Authorization", self.auth_key.as_str()),
            ("Content-Type", "application/json"),
            ("Connection", "close"),
        ];
        let response = self.client.post(&self.url, &headers, &body, self.timeout)?;

        Ok(Delivery::Http {
            status: response.status,
            body: response.body,
        })
    }
}

/// Broadcasts each card as a text line over UDP
pub struct BroadcastNotifier {
    socket: UdpSocket,
    address: SocketAddr,
}

impl BroadcastNotifier {
    pub fn new(address: SocketAddr) -> Result<Self, NotifyError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| NotifyError::Transport(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self { socket, address })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&mut self, idm: &Idm) -> Result<Delivery, NotifyError> {
        let line = broadcast_line(idm);
        info!("[UDP] Sending to {}: {}", self.address, line.trim_end());

        let bytes = self
            .socket
            .send_to(line.as_bytes(), self.address)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Delivery::Datagram { bytes })
    }
}
