use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

use crate::transport::ReaderTransport;
use crate::types::{FelicaTarget, FirmwareInfo, Idm, Pmm, ReaderError};

/// Contract the control loop needs from a card reader.
pub trait CardReader {
    /// Bring the reader up. Called once at startup; failure is fatal.
    fn initialize(&mut self) -> Result<FirmwareInfo, ReaderError>;

    /// Wait up to `timeout_ms` for a FeliCa card answering `system_code`.
    /// `Ok(None)` means no card was found in time.
    fn poll(&mut self, system_code: u16, timeout_ms: u32) -> Result<Option<FelicaTarget>, ReaderError>;
}

/// A frame received from the PN532
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    Ack,
    Nack,
    /// Application level error (`7F`)
    Error,
    /// Normal information frame body, starting at the TFI byte
    Information(Vec<u8>),
}

pub struct Pn532<T: ReaderTransport> {
    transport: T,
    request_code: u8,
    activation_retries: u8,
}

impl<T: ReaderTransport> Pn532<T> {
    // Frame constants
    const START_CODE: [u8; 2] = [0x00, 0xFF];
    const PREAMBLE: u8 = 0x00;
    const POSTAMBLE: u8 = 0x00;
    const HOST_TO_PN532: u8 = 0xD4;
    const PN532_TO_HOST: u8 = 0xD5;
    const APPLICATION_ERROR: u8 = 0x7F;
    pub(crate) const ACK: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

    // Command codes
    const GET_FIRMWARE_VERSION: u8 = 0x02;
    const SAM_CONFIGURATION: u8 = 0x14;
    const RF_CONFIGURATION: u8 = 0x32;
    const IN_LIST_PASSIVE_TARGET: u8 = 0x4A;

    // Command parameters
    const RF_CONFIG_MAX_RETRIES: u8 = 0x05;
    const SAM_NORMAL_MODE: u8 = 0x01;
    const SAM_TIMEOUT_50MS: u8 = 0x14;
    const FELICA_212KBPS: u8 = 0x01;
    const FELICA_POLLING: u8 = 0x00;

    /// FeliCa polling request code asking the card for its system code
    pub const REQUEST_SYSTEM_CODE: u8 = 0x01;

    const ACK_TIMEOUT_MS: u32 = 100;
    const COMMAND_TIMEOUT_MS: u32 = 1000;
    const RESPONSE_CHUNK: usize = 64;

    /// Create a new reader instance with the given transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            request_code: Self::REQUEST_SYSTEM_CODE,
            activation_retries: 0xFF,
        }
    }

    /// Request code sent with every FeliCa polling command
    pub fn with_request_code(mut self, request_code: u8) -> Self {
        self.request_code = request_code;
        self
    }

    /// Passive activation retries applied by `initialize` (0xFF retries forever)
    pub fn with_activation_retries(mut self, retries: u8) -> Self {
        self.activation_retries = retries;
        self
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Get IC type and firmware version
    pub fn get_firmware_version(&mut self) -> Result<FirmwareInfo, ReaderError> {
        let data = self.exec(Self::GET_FIRMWARE_VERSION, &[], Self::COMMAND_TIMEOUT_MS)?;
        match data[..] {
            [ic, version, revision, support, ..] => Ok(FirmwareInfo {
                ic,
                version,
                revision,
                support,
            }),
            _ => Err(ReaderError::InvalidResponse(format!(
                "firmware version response too short: {:02X?}",
                data
            ))),
        }
    }

    /// Configure the SAM for normal mode with the IRQ line in use
    pub fn sam_config(&mut self) -> Result<(), ReaderError> {
        self.exec(
            Self::SAM_CONFIGURATION,
            &[Self::SAM_NORMAL_MODE, Self::SAM_TIMEOUT_50MS, 0x01],
            Self::COMMAND_TIMEOUT_MS,
        )
        .map(|_| ())
    }

    /// Set how many times the reader retries passive activation per command
    pub fn set_passive_activation_retries(&mut self, retries: u8) -> Result<(), ReaderError> {
        self.exec(
            Self::RF_CONFIGURATION,
            &[Self::RF_CONFIG_MAX_RETRIES, 0xFF, 0x01, retries],
            Self::COMMAND_TIMEOUT_MS,
        )
        .map(|_| ())
    }

    /// Poll for a single FeliCa card at 212 kbps
    ///
    /// # Arguments
    /// * `system_code` - System code filter, `0xFFFF` matches any card
    /// * `request_code` - `0x01` asks the card to append its system code
    /// * `timeout_ms` - How long to wait for a card
    ///
    /// # Returns
    /// `Ok(None)` if the reader answered without a card
    pub fn felica_polling(
        &mut self,
        system_code: u16,
        request_code: u8,
        timeout_ms: u32,
    ) -> Result<Option<FelicaTarget>, ReaderError> {
        let [sc_msb, sc_lsb] = system_code.to_be_bytes();
        let params = [
            0x01, // max targets
            Self::FELICA_212KBPS,
            Self::FELICA_POLLING,
            sc_msb,
            sc_lsb,
            request_code,
            0x00, // time slot
        ];

        let data = self.exec(Self::IN_LIST_PASSIVE_TARGET, &params, timeout_ms)?;
        Self::parse_felica_target(&data)
    }

    fn parse_felica_target(data: &[u8]) -> Result<Option<FelicaTarget>, ReaderError> {
        let Some(&targets) = data.first() else {
            return Err(ReaderError::InvalidResponse("empty polling response".into()));
        };

        match targets {
            0 => return Ok(None),
            1 => {}
            n => return Err(ReaderError::TargetCount(n)),
        }

        // NbTg, Tg, POL_RES length, response code, IDm, PMm, [system code]
        let response_len = *data
            .get(2)
            .ok_or_else(|| ReaderError::InvalidResponse("polling response too short".into()))?;
        if response_len != 18 && response_len != 20 {
            return Err(ReaderError::ResponseLength(response_len));
        }
        if data.len() < 2 + response_len as usize {
            return Err(ReaderError::InvalidResponse(format!(
                "polling response claims {} bytes but only {} arrived",
                response_len,
                data.len() - 2
            )));
        }

        let mut idm = [0u8; 8];
        let mut pmm = [0u8; 8];
        idm.copy_from_slice(&data[4..12]);
        pmm.copy_from_slice(&data[12..20]);
        let system_code = (response_len == 20).then(|| u16::from_be_bytes([data[20], data[21]]));

        Ok(Some(FelicaTarget {
            idm: Idm(idm),
            pmm: Pmm(pmm),
            system_code,
        }))
    }

    /// Send a command, wait for its ACK and response, return the response data
    /// after the TFI and response code bytes.
    fn exec(&mut self, command: u8, params: &[u8], timeout_ms: u32) -> Result<Vec<u8>, ReaderError> {
        self.transport
            .clear_input()
            .map_err(|e| ReaderError::Transport(format!("{:?}", e)))?;

        let frame = Self::create_frame(command, params);
        debug!("Sending command: {:02X?}", frame);
        let written = self
            .transport
            .write(&frame)
            .map_err(|e| ReaderError::Transport(format!("{:?}", e)))?;
        debug!("Wrote {} bytes", written);

        match self.read_frame(Self::ACK_TIMEOUT_MS, Self::ACK.len()) {
            Ok(Frame::Ack) => {}
            Ok(other) => {
                debug!("Expected ACK, got {:?}", other);
                return Err(ReaderError::NoAck(command));
            }
            Err(ReaderError::ResponseTimeout(_)) => return Err(ReaderError::NoAck(command)),
            Err(e) => return Err(e),
        }

        match self.read_frame(timeout_ms, Self::RESPONSE_CHUNK) {
            Ok(Frame::Information(body)) => {
                if body.len() >= 2
                    && body[0] == Self::PN532_TO_HOST
                    && body[1] == command.wrapping_add(1)
                {
                    Ok(body[2..].to_vec())
                } else {
                    Err(ReaderError::InvalidResponse(format!(
                        "unexpected response to 0x{:02X}: {:02X?}",
                        command, body
                    )))
                }
            }
            Ok(Frame::Error) => Err(ReaderError::Application),
            Ok(other) => Err(ReaderError::InvalidResponse(format!(
                "unexpected {:?} frame in place of a response",
                other
            ))),
            Err(ReaderError::ResponseTimeout(_)) => {
                self.abort();
                Err(ReaderError::ResponseTimeout(timeout_ms))
            }
            Err(e) => Err(e),
        }
    }

    /// Read until one complete frame has arrived or the timeout expires
    fn read_frame(&mut self, timeout_ms: u32, chunk_len: usize) -> Result<Frame, ReaderError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        let mut buffer = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut chunk = vec![0u8; chunk_len];

            match self.transport.read(&mut chunk, remaining.as_millis().max(1) as u32) {
                Ok(bytes_read) if bytes_read > 0 => {
                    buffer.extend_from_slice(&chunk[..bytes_read]);
                    debug!("Received {} bytes: {:02X?}", bytes_read, &chunk[..bytes_read]);

                    if let Some(frame) = Self::parse_frame(&buffer)? {
                        return Ok(frame);
                    }
                }
                Ok(_) => std::thread::sleep(Duration::from_millis(5)),
                Err(e) => {
                    error!("Read error: {:?}", e);
                    return Err(ReaderError::Transport(format!("{:?}", e)));
                }
            }

            if Instant::now() >= deadline {
                return Err(ReaderError::ResponseTimeout(timeout_ms));
            }
        }
    }

    /// Abort the pending command. The PN532 drops a command when it receives an ACK.
    fn abort(&mut self) {
        debug!("Aborting pending command");
        if let Err(e) = self.transport.write(&Self::ACK) {
            warn!("Failed to abort pending command: {:?}", e);
        }
    }

    /// Try to parse one frame from the start of `buffer`.
    /// Returns `Ok(None)` while the frame is still incomplete.
    pub(crate) fn parse_frame(buffer: &[u8]) -> Result<Option<Frame>, ReaderError> {
        let Some(start) = buffer.windows(2).position(|w| w == Self::START_CODE) else {
            return Ok(None);
        };
        let rest = &buffer[start + 2..];

        let (len, lcs) = match rest {
            [0x00, 0xFF, ..] => return Ok(Some(Frame::Ack)),
            [0xFF, 0x00, ..] => return Ok(Some(Frame::Nack)),
            [len, lcs, ..] => (*len, *lcs),
            _ => return Ok(None),
        };

        if len.wrapping_add(lcs) != 0 {
            return Err(ReaderError::Checksum);
        }

        let len = len as usize;
        if rest.len() < 2 + len + 1 {
            return Ok(None);
        }

        let body = &rest[2..2 + len];
        let dcs = rest[2 + len];
        if body.iter().fold(dcs, |acc, &b| acc.wrapping_add(b)) != 0 {
            return Err(ReaderError::Checksum);
        }

        if body == [Self::APPLICATION_ERROR] {
            return Ok(Some(Frame::Error));
        }

        Ok(Some(Frame::Information(body.to_vec())))
    }

    pub(crate) fn create_frame(command: u8, params: &[u8]) -> Vec<u8> {
        // TFI + command + params
        let len = (params.len() + 2) as u8;
        let lcs = 0u8.wrapping_sub(len);

        let dcs = [Self::HOST_TO_PN532, command]
            .iter()
            .chain(params.iter())
            .fold(0u8, |acc, &b| acc.wrapping_sub(b));

        let mut frame = vec![Self::PREAMBLE];
        frame.extend_from_slice(&Self::START_CODE);
        frame.extend_from_slice(&[len, lcs, Self::HOST_TO_PN532, command]);
        frame.extend_from_slice(params);
        frame.push(dcs);
        frame.push(Self::POSTAMBLE);
        frame
    }
}

impl<T: ReaderTransport> CardReader for Pn532<T> {
    fn initialize(&mut self) -> Result<FirmwareInfo, ReaderError> {
        let firmware = self.get_firmware_version()?;
        info!("[PN532] Found chip PN5{:X}", firmware.ic);
        info!("[PN532] Firmware ver. {}.{}", firmware.version, firmware.revision);

        self.set_passive_activation_retries(self.activation_retries)?;
        self.sam_config()?;
        Ok(firmware)
    }

    fn poll(&mut self, system_code: u16, timeout_ms: u32) -> Result<Option<FelicaTarget>, ReaderError> {
        self.felica_polling(system_code, self.request_code, timeout_ms)
    }
}
