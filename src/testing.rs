//! Test doubles for the reader, transport, network, notifier, indicators and clock

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::clock::Clock;
use crate::indicator::Indicator;
use crate::network::{Credential, NetworkInfo, NetworkLink};
use crate::notifier::{Delivery, HttpResponse, Notifier, PushClient};
use crate::reader::CardReader;
use crate::transport::ReaderTransport;
use crate::types::{FelicaTarget, FirmwareInfo, Idm, NetworkError, NotifyError, Pmm, ReaderError};

pub(crate) fn target(idm: [u8; 8]) -> FelicaTarget {
    FelicaTarget {
        idm: Idm(idm),
        pmm: Pmm([0x03, 0x01, 0x4B, 0x02, 0x4F, 0x49, 0x93, 0xFF]),
        system_code: Some(0x0003),
    }
}

/// Clock that only moves when slept on or advanced
#[derive(Clone, Default)]
pub(crate) struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub(crate) fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }
}

/// Indicator that records every level it was set to
#[derive(Default)]
pub(crate) struct RecordingIndicator {
    levels: Vec<u8>,
    pub(crate) fail: bool,
}

impl RecordingIndicator {
    pub(crate) fn levels(&self) -> Vec<u8> {
        self.levels.clone()
    }
}

impl Indicator for RecordingIndicator {
    type Error = &'static str;

    fn set_level(&mut self, level: u8) -> Result<(), Self::Error> {
        if self.fail {
            return Err("output unavailable");
        }
        self.levels.push(level);
        Ok(())
    }
}

/// Reader that replays a fixed list of poll results, then times out forever
pub(crate) struct ScriptedReader {
    present: bool,
    script: VecDeque<Result<Option<FelicaTarget>, ReaderError>>,
    polls: usize,
    delay: Option<(ManualClock, Duration)>,
}

impl ScriptedReader {
    pub(crate) fn new(script: Vec<Result<Option<FelicaTarget>, ReaderError>>) -> Self {
        Self {
            present: true,
            script: script.into(),
            polls: 0,
            delay: None,
        }
    }

    /// A reader that never answers initialization
    pub(crate) fn absent() -> Self {
        Self {
            present: false,
            ..Self::new(vec![])
        }
    }

    /// Make every poll take `delay` on `clock`
    pub(crate) fn with_poll_delay(mut self, clock: ManualClock, delay: Duration) -> Self {
        self.delay = Some((clock, delay));
        self
    }

    pub(crate) fn polls(&self) -> usize {
        self.polls
    }
}

impl CardReader for ScriptedReader {
    fn initialize(&mut self) -> Result<FirmwareInfo, ReaderError> {
        if !self.present {
            return Err(ReaderError::NoAck(0x02));
        }
        Ok(FirmwareInfo {
            ic: 0x32,
            version: 1,
            revision: 6,
            support: 0x07,
        })
    }

    fn poll(&mut self, _system_code: u16, _timeout_ms: u32) -> Result<Option<FelicaTarget>, ReaderError> {
        self.polls += 1;
        if let Some((clock, delay)) = &self.delay {
            clock.advance(*delay);
        }
        self.script.pop_front().unwrap_or(Ok(None))
    }
}

pub(crate) struct MockNetwork {
    failure: Option<NetworkError>,
    attempts: usize,
}

impl MockNetwork {
    pub(crate) fn up() -> Self {
        Self {
            failure: None,
            attempts: 0,
        }
    }

    pub(crate) fn failing(error: NetworkError) -> Self {
        Self {
            failure: Some(error),
            attempts: 0,
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts
    }
}

impl NetworkLink for MockNetwork {
    fn join(&mut self, _credentials: &[Credential], _timeout: Duration) -> Result<NetworkInfo, NetworkError> {
        self.attempts += 1;
        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(NetworkInfo {
                address: "192.168.1.20".parse().unwrap(),
                ssid: Some("test".into()),
            }),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Vec<Idm>,
    attempts: usize,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Identifiers that were delivered
    pub(crate) fn sent(&self) -> Vec<Idm> {
        self.sent.clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, idm: &Idm) -> Result<Delivery, NotifyError> {
        self.attempts += 1;
        if self.fail {
            return Err(NotifyError::Timeout);
        }
        self.sent.push(*idm);
        Ok(Delivery::Datagram { bytes: 44 })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) timeout: Duration,
}

pub(crate) struct RecordingPushClient {
    response: Option<HttpResponse>,
    requests: Vec<RecordedRequest>,
}

impl RecordingPushClient {
    pub(crate) fn responding(status: u16, body: &str) -> Self {
        Self {
            response: Some(HttpResponse {
                status,
                body: body.into(),
            }),
            requests: Vec::new(),
        }
    }

    /// Every request times out
    pub(crate) fn failing() -> Self {
        Self {
            response: None,
            requests: Vec::new(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.clone()
    }
}

impl PushClient for RecordingPushClient {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        timeout: Duration,
    ) -> Result<HttpResponse, NotifyError> {
        self.requests.push(RecordedRequest {
            url: url.into(),
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: body.to_vec(),
            timeout,
        });
        self.response.clone().ok_or(NotifyError::Timeout)
    }
}

/// Transport that hands out queued chunks, one per read, and records writes
#[derive(Default)]
pub(crate) struct MockTransport {
    chunks: VecDeque<Vec<u8>>,
    pub(crate) written: Vec<Vec<u8>>,
    /// Writes past this count fail
    pub(crate) max_writes: Option<usize>,
}

impl MockTransport {
    pub(crate) fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            written: Vec::new(),
            max_writes: None,
        }
    }
}

impl ReaderTransport for MockTransport {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        if self.max_writes.is_some_and(|max| self.written.len() >= max) {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "link down"));
        }
        self.written.push(data.to_vec());
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            self.chunks.push_front(chunk.split_off(len));
        }
        Ok(len)
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
