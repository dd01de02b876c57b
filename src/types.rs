//! Types for FeliCa card detection

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// FeliCa manufacture ID (IDm), the card identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Idm(pub [u8; 8]);

impl Idm {
    /// Value held before any card has been accepted
    pub const ZERO: Idm = Idm([0; 8]);

    /// Uppercase hex without separators, e.g. `01A2B3C4D5E6F700`
    pub fn to_hex_upper(&self) -> String {
        bytes_to_hex(&self.0)
    }

    /// Lowercase hex bytes separated by spaces, e.g. `01 a2 b3 c4 d5 e6 f7 00`
    pub fn to_spaced_lower(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::UpperHex for Idm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02X}", b))
    }
}

impl fmt::Display for Idm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self)
    }
}

/// FeliCa manufacture parameter (PMm)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pmm(pub [u8; 8]);

impl fmt::Display for Pmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bytes_to_hex(&self.0))
    }
}

/// A FeliCa card as answered to a polling request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FelicaTarget {
    pub idm: Idm,
    pub pmm: Pmm,
    /// Only present when the system code was requested and returned
    pub system_code: Option<u16>,
}

/// A card seen by the control loop at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardObservation {
    pub idm: Idm,
    pub pmm: Pmm,
    pub system_code: Option<u16>,
    /// Monotonic time since the loop started
    pub observed_at: Duration,
}

impl CardObservation {
    pub fn new(target: FelicaTarget, observed_at: Duration) -> Self {
        Self {
            idm: target.idm,
            pmm: target.pmm,
            system_code: target.system_code,
            observed_at,
        }
    }
}

/// Reader chip identification returned by GetFirmwareVersion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareInfo {
    /// 0x32 for a PN532
    pub ic: u8,
    pub version: u8,
    pub revision: u8,
    /// Bit field of supported card families
    pub support: u8,
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PN5{:X} firmware {}.{}", self.ic, self.version, self.revision)
    }
}

/// Errors that can occur while talking to the reader
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Transport layer error (SPI, serial, etc.)
    #[error("transport error: {0}")]
    Transport(String),
    /// The reader did not acknowledge a command
    #[error("command 0x{0:02X} was not acknowledged")]
    NoAck(u8),
    /// No response frame arrived before the timeout
    #[error("no response within {0} ms")]
    ResponseTimeout(u32),
    /// A frame failed its length or data checksum
    #[error("frame checksum mismatch")]
    Checksum,
    /// The reader answered with its application error frame
    #[error("reader reported an application error")]
    Application,
    /// The polling response listed an unexpected number of targets
    #[error("unexpected number of targets: {0}")]
    TargetCount(u8),
    /// The polling response had a length other than 18 or 20 bytes
    #[error("unexpected polling response length: {0}")]
    ResponseLength(u8),
    /// Anything else that does not look like a valid answer
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ReaderError {
    /// Status code in the convention used by the Arduino PN532 library
    pub fn code(&self) -> i8 {
        match self {
            ReaderError::ResponseTimeout(_) => -2,
            ReaderError::TargetCount(_) => -3,
            ReaderError::ResponseLength(_) => -4,
            ReaderError::Transport(_)
            | ReaderError::NoAck(_)
            | ReaderError::Checksum
            | ReaderError::Application
            | ReaderError::InvalidResponse(_) => -1,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReaderError::ResponseTimeout(_))
    }
}

/// Errors while delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("push notifications are not available in this build")]
    Unsupported,
}

/// Errors while joining the network
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no network joined within {0:?}")]
    Timeout(Duration),
    #[error("no network credentials configured")]
    NoCredentials,
    #[error("network driver error: {0}")]
    Driver(String),
}

/// Fatal startup failures
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("reader not found: {0}")]
    Reader(#[from] ReaderError),
    #[error("network join failed: {0}")]
    Network(#[from] NetworkError),
}

/// Convert bytes to uppercase hex string
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
