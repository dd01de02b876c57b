//! FeliCa card watcher for PN532 readers.
//!
//! Polls a PN532 for FeliCa cards, suppresses repeated scans of the same card
//! and reports each accepted IDm over HTTP push or UDP broadcast. Two status
//! indicators show waiting, found, duplicate and error states.
//!
//! # Features
//!
//! - `esp32` - SPI transport, WiFi join, HTTP push and LED backends using esp-idf-svc,
//!   plus the `felica-notify-esp32` firmware binary
//! - `serial` - PN532 HSU transport for desktop using serialport crate
//! - `push-http` - HTTP push backend for desktop using reqwest
//! - `host` - the `felica-notify` desktop binary
//!
//! # Example
//!
//! ```ignore
//! use felica_notify::{CardReader, Pn532, SerialTransport};
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 115200)?;
//! let mut reader = Pn532::new(transport);
//! reader.initialize()?;
//!
//! if let Some(card) = reader.poll(0xFFFF, 5000)? {
//!     println!("Found card: {}", card.idm);
//! }
//! ```

mod clock;
mod config;
mod control;
mod debounce;
mod indicator;
mod network;
mod notifier;
mod reader;
mod transport;
mod types;

#[cfg(feature = "esp32")]
pub mod esp32;

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "push-http")]
mod http;

#[cfg(test)]
mod testing;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use config::{
    Config, NotificationConfig, ReaderConfig, Timing, DEFAULT_BROADCAST_ADDR, DEFAULT_PUSH_TOPIC,
    DEFAULT_PUSH_URL,
};
pub use control::{handle_poll_result, Controller, Decision, FaultCause, Phase, PollOutcome};
pub use debounce::{DebounceState, Verdict, DEBOUNCE_WINDOW};
pub use indicator::{Indicator, Level, Light, Pulse, StatusLights};
pub use network::{Credential, HostNetwork, JoinBudget, NetworkInfo, NetworkLink};
pub use notifier::{
    broadcast_line, push_payload, BroadcastNotifier, Delivery, HttpResponse, Notifier, PushClient,
    PushMessage, PushNotification, PushNotifier,
};
pub use reader::{CardReader, Pn532};
pub use transport::ReaderTransport;
pub use types::{
    CardObservation, FelicaTarget, FirmwareInfo, Idm, NetworkError, NotifyError, Pmm, ReaderError,
    StartupError,
};

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

#[cfg(feature = "push-http")]
pub use http::ReqwestClient;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Frame;
    use crate::testing::MockTransport;

    const ACK: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

    /// Wrap `body` (TFI onwards) in a normal information frame
    fn response_frame(body: &[u8]) -> Vec<u8> {
        let len = body.len() as u8;
        let dcs = body.iter().fold(0u8, |acc, &b| acc.wrapping_sub(b));
        let mut frame = vec![0x00, 0x00, 0xFF, len, 0u8.wrapping_sub(len)];
        frame.extend_from_slice(body);
        frame.push(dcs);
        frame.push(0x00);
        frame
    }

    fn felica_response(system_code: Option<u16>) -> Vec<u8> {
        let mut body = vec![0xD5, 0x4B, 0x01, 0x01];
        body.push(if system_code.is_some() { 20 } else { 18 });
        body.push(0x01); // polling response code
        body.extend_from_slice(&[0x01, 0xA2, 0xB3, 0xC4, 0xD5, 0xE6, 0xF7, 0x00]);
        body.extend_from_slice(&[0x03, 0x01, 0x4B, 0x02, 0x4F, 0x49, 0x93, 0xFF]);
        if let Some(code) = system_code {
            body.extend_from_slice(&code.to_be_bytes());
        }
        response_frame(&body)
    }

    // ===================
    // create_frame tests
    // ===================

    #[test]
    fn test_create_get_firmware_version_frame() {
        let result = Pn532::<MockTransport>::create_frame(0x02, &[]);
        assert_eq!(result, [0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD4, 0x02, 0x2A, 0x00]);
    }

    #[test]
    fn test_create_sam_config_frame() {
        let result = Pn532::<MockTransport>::create_frame(0x14, &[0x01, 0x14, 0x01]);
        assert_eq!(
            result,
            [0x00, 0x00, 0xFF, 0x05, 0xFB, 0xD4, 0x14, 0x01, 0x14, 0x01, 0x02, 0x00]
        );
    }

    #[test]
    fn test_create_felica_polling_frame() {
        let result = Pn532::<MockTransport>::create_frame(0x4A, &[0x01, 0x01, 0x00, 0xFF, 0xFF, 0x01, 0x00]);
        assert_eq!(result[3], 0x09); // TFI + command + 7 params
        assert_eq!(result[4], 0xF7);
        assert_eq!(&result[5..7], &[0xD4, 0x4A]);
        let sum = result[5..result.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(sum, 0, "data checksum must zero the sum");
        assert_eq!(*result.last().unwrap(), 0x00);
    }

    // ===================
    // parse_frame tests
    // ===================

    #[test]
    fn test_parse_ack_frame() {
        let frame = Pn532::<MockTransport>::parse_frame(&ACK).unwrap();
        assert_eq!(frame, Some(Frame::Ack));
    }

    #[test]
    fn test_parse_nack_frame() {
        let frame = Pn532::<MockTransport>::parse_frame(&[0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00]).unwrap();
        assert_eq!(frame, Some(Frame::Nack));
    }

    #[test]
    fn test_parse_error_frame() {
        let frame = Pn532::<MockTransport>::parse_frame(&response_frame(&[0x7F])).unwrap();
        assert_eq!(frame, Some(Frame::Error));
    }

    #[test]
    fn test_parse_incomplete_frame() {
        let full = response_frame(&[0xD5, 0x03, 0x32, 0x01, 0x06, 0x07]);
        let frame = Pn532::<MockTransport>::parse_frame(&full[..7]).unwrap();
        assert_eq!(frame, None);
    }

    #[test]
    fn test_parse_frame_skips_leading_noise() {
        let mut data = vec![0x00, 0x00, 0x00];
        data.extend(response_frame(&[0xD5, 0x15]));
        let frame = Pn532::<MockTransport>::parse_frame(&data).unwrap();
        assert_eq!(frame, Some(Frame::Information(vec![0xD5, 0x15])));
    }

    #[test]
    fn test_parse_bad_length_checksum() {
        let result = Pn532::<MockTransport>::parse_frame(&[0x00, 0x00, 0xFF, 0x02, 0x02, 0xD5, 0x15, 0x16, 0x00]);
        assert!(matches!(result, Err(ReaderError::Checksum)));
    }

    #[test]
    fn test_parse_bad_data_checksum() {
        let mut frame = response_frame(&[0xD5, 0x15]);
        let dcs = frame.len() - 2;
        frame[dcs] = frame[dcs].wrapping_add(1);
        assert!(matches!(
            Pn532::<MockTransport>::parse_frame(&frame),
            Err(ReaderError::Checksum)
        ));
    }

    // ===================
    // get_firmware_version tests
    // ===================

    #[test]
    fn test_get_firmware_version_valid() {
        let transport = MockTransport::new(vec![ACK.to_vec(), response_frame(&[0xD5, 0x03, 0x32, 0x01, 0x06, 0x07])]);
        let mut reader = Pn532::new(transport);

        let firmware = reader.get_firmware_version().unwrap();
        assert_eq!(
            firmware,
            FirmwareInfo {
                ic: 0x32,
                version: 1,
                revision: 6,
                support: 7
            }
        );

        let transport = reader.into_inner();
        assert_eq!(transport.written, vec![vec![0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD4, 0x02, 0x2A, 0x00]]);
    }

    #[test]
    fn test_get_firmware_version_no_ack() {
        let mut reader = Pn532::new(MockTransport::new(vec![]));
        assert!(matches!(reader.get_firmware_version(), Err(ReaderError::NoAck(0x02))));
    }

    #[test]
    fn test_get_firmware_version_wrong_response_code() {
        let transport = MockTransport::new(vec![ACK.to_vec(), response_frame(&[0xD5, 0x15])]);
        let mut reader = Pn532::new(transport);

        assert!(matches!(
            reader.get_firmware_version(),
            Err(ReaderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_get_firmware_version_split_reads() {
        let response = response_frame(&[0xD5, 0x03, 0x32, 0x01, 0x06, 0x07]);
        let (head, tail) = response.split_at(4);
        let transport = MockTransport::new(vec![ACK[..3].to_vec(), ACK[3..].to_vec(), head.to_vec(), tail.to_vec()]);
        let mut reader = Pn532::new(transport);

        assert_eq!(reader.get_firmware_version().unwrap().ic, 0x32);
    }

    // ===================
    // initialize tests
    // ===================

    #[test]
    fn test_initialize_sends_retries_and_sam_config() {
        let transport = MockTransport::new(vec![
            ACK.to_vec(),
            response_frame(&[0xD5, 0x03, 0x32, 0x01, 0x06, 0x07]),
            ACK.to_vec(),
            response_frame(&[0xD5, 0x33]),
            ACK.to_vec(),
            response_frame(&[0xD5, 0x15]),
        ]);
        let mut reader = Pn532::new(transport);

        let firmware = reader.initialize().unwrap();
        assert_eq!(firmware.ic, 0x32);

        let written = reader.into_inner().written;
        assert_eq!(written.len(), 3);
        assert_eq!(&written[1][5..11], &[0xD4, 0x32, 0x05, 0xFF, 0x01, 0xFF]);
        assert_eq!(&written[2][5..10], &[0xD4, 0x14, 0x01, 0x14, 0x01]);
    }

    #[test]
    fn test_initialize_reader_absent() {
        let mut reader = Pn532::new(MockTransport::new(vec![]));
        assert!(reader.initialize().is_err());
        assert_eq!(reader.into_inner().written.len(), 1);
    }

    // ===================
    // felica_polling tests
    // ===================

    #[test]
    fn test_felica_polling_with_system_code() {
        let transport = MockTransport::new(vec![ACK.to_vec(), felica_response(Some(0x0003))]);
        let mut reader = Pn532::new(transport);

        let card = reader.poll(0xFFFF, 5000).unwrap().unwrap();
        assert_eq!(card.idm, Idm([0x01, 0xA2, 0xB3, 0xC4, 0xD5, 0xE6, 0xF7, 0x00]));
        assert_eq!(card.pmm, Pmm([0x03, 0x01, 0x4B, 0x02, 0x4F, 0x49, 0x93, 0xFF]));
        assert_eq!(card.system_code, Some(0x0003));

        let written = reader.into_inner().written;
        assert_eq!(&written[0][5..14], &[0xD4, 0x4A, 0x01, 0x01, 0x00, 0xFF, 0xFF, 0x01, 0x00]);
    }

    #[test]
    fn test_felica_polling_without_system_code() {
        let transport = MockTransport::new(vec![ACK.to_vec(), felica_response(None)]);
        let mut reader = Pn532::new(transport).with_request_code(0x00);

        let card = reader.poll(0xFFFF, 5000).unwrap().unwrap();
        assert_eq!(card.system_code, None);

        let written = reader.into_inner().written;
        assert_eq!(written[0][12], 0x00, "request code");
    }

    #[test]
    fn test_felica_polling_no_target() {
        let transport = MockTransport::new(vec![ACK.to_vec(), response_frame(&[0xD5, 0x4B, 0x00])]);
        let mut reader = Pn532::new(transport);

        assert_eq!(reader.poll(0xFFFF, 5000).unwrap(), None);
    }

    #[test]
    fn test_felica_polling_two_targets() {
        let transport = MockTransport::new(vec![ACK.to_vec(), response_frame(&[0xD5, 0x4B, 0x02])]);
        let mut reader = Pn532::new(transport);

        let result = reader.poll(0xFFFF, 5000);
        assert!(matches!(result, Err(ReaderError::TargetCount(2))));
        assert_eq!(result.unwrap_err().code(), -3);
    }

    #[test]
    fn test_felica_polling_wrong_length() {
        let body = [0xD5, 0x4B, 0x01, 0x01, 0x10, 0x01, 0x00, 0x00];
        let transport = MockTransport::new(vec![ACK.to_vec(), response_frame(&body)]);
        let mut reader = Pn532::new(transport);

        let result = reader.poll(0xFFFF, 5000);
        assert!(matches!(result, Err(ReaderError::ResponseLength(0x10))));
    }

    #[test]
    fn test_felica_polling_truncated_response() {
        let body = [0xD5, 0x4B, 0x01, 0x01, 0x12, 0x01, 0x01, 0xA2];
        let transport = MockTransport::new(vec![ACK.to_vec(), response_frame(&body)]);
        let mut reader = Pn532::new(transport);

        assert!(matches!(
            reader.poll(0xFFFF, 5000),
            Err(ReaderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_felica_polling_timeout_aborts_command() {
        let transport = MockTransport::new(vec![ACK.to_vec()]);
        let mut reader = Pn532::new(transport);

        let result = reader.poll(0xFFFF, 20);
        assert!(matches!(result, Err(ReaderError::ResponseTimeout(20))));
        assert!(result.unwrap_err().is_timeout());

        let written = reader.into_inner().written;
        assert_eq!(written.len(), 2);
        assert_eq!(written[1], ACK.to_vec());
    }

    #[test]
    fn test_felica_polling_timeout_survives_failed_abort() {
        let mut transport = MockTransport::new(vec![ACK.to_vec()]);
        transport.max_writes = Some(1);
        let mut reader = Pn532::new(transport);

        let result = reader.poll(0xFFFF, 20);
        assert!(matches!(result, Err(ReaderError::ResponseTimeout(20))));
        assert_eq!(reader.into_inner().written.len(), 1);
    }

    #[test]
    fn test_felica_polling_application_error() {
        let transport = MockTransport::new(vec![ACK.to_vec(), response_frame(&[0x7F])]);
        let mut reader = Pn532::new(transport);

        let result = reader.poll(0xFFFF, 5000);
        assert!(matches!(result, Err(ReaderError::Application)));
    }

    #[test]
    fn test_polled_card_flows_into_observation() {
        let transport = MockTransport::new(vec![ACK.to_vec(), felica_response(Some(0x88B4))]);
        let mut reader = Pn532::new(transport);

        let outcome = PollOutcome::from_poll(reader.poll(0xFFFF, 5000), std::time::Duration::from_millis(1234));
        let observation = match outcome {
            PollOutcome::Card(observation) => observation,
            other => panic!("expected a card, got {:?}", other),
        };
        assert_eq!(observation.idm.to_hex_upper(), "01A2B3C4D5E6F700");
        assert_eq!(observation.system_code, Some(0x88B4));
        assert_eq!(observation.observed_at.as_millis(), 1234);
    }
}
