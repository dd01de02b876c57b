/// Trait for PN532 communication backends.
/// Implement this trait for different links (SPI, HSU serial port, etc.)
///
/// Implementations move whole PN532 frames; any link-level framing (SPI
/// direction bytes, HSU wake-up) stays inside the backend.
pub trait ReaderTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write a frame to the reader
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read data with a timeout in milliseconds.
    /// Returns `Ok(0)` when nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), Self::Error>;
}
