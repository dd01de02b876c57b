//! PN532 SPI transport for ESP32

use embedded_hal::spi::Operation;
use esp_idf_svc::hal::spi::{SpiDeviceDriver, SpiDriver};
use esp_idf_svc::sys::EspError;
use std::time::{Duration, Instant};

use crate::transport::ReaderTransport;

// SPI direction bytes sent ahead of every transfer
const DATA_WRITE: u8 = 0x01;
const STATUS_READ: u8 = 0x02;
const DATA_READ: u8 = 0x03;
const STATUS_READY: u8 = 0x01;

/// The PN532 shifts bytes LSB first; the SPI peripheral runs MSB first and
/// every byte is mirrored on the way in and out.
fn mirror(byte: u8) -> u8 {
    byte.reverse_bits()
}

pub struct SpiTransport<'d> {
    spi: SpiDeviceDriver<'d, SpiDriver<'d>>,
}

impl<'d> SpiTransport<'d> {
    /// `spi` must run in mode 0 with chip select on the PN532 SS pin
    pub fn new(spi: SpiDeviceDriver<'d, SpiDriver<'d>>) -> Self {
        Self { spi }
    }

    fn is_ready(&mut self) -> Result<bool, EspError> {
        let mut status = [0u8];
        self.spi.transaction(&mut [
            Operation::Write(&[mirror(STATUS_READ)]),
            Operation::Read(&mut status),
        ])?;
        Ok(mirror(status[0]) & STATUS_READY != 0)
    }
}

impl ReaderTransport for SpiTransport<'_> {
    type Error = EspError;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let frame: Vec<u8> = std::iter::once(DATA_WRITE)
            .chain(data.iter().copied())
            .map(mirror)
            .collect();
        self.spi.write(&frame)?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        while !self.is_ready()? {
            if Instant::now() >= deadline {
                return Ok(0);
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        self.spi.transaction(&mut [
            Operation::Write(&[mirror(DATA_READ)]),
            Operation::Read(buf),
        ])?;
        buf.iter_mut().for_each(|b| *b = mirror(*b));
        Ok(buf.len())
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        // the PN532 only drives data after a ready status, nothing is buffered
        Ok(())
    }
}
