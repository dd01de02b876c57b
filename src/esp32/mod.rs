//! ESP32 backends using esp-idf-svc
//!
//! Wiring used by the reference board:
//!
//! - SPI SCK  -> GPIO14
//! - SPI MISO -> GPIO12
//! - SPI MOSI -> GPIO13
//! - PN532 SS -> GPIO5
//! - Info LED -> GPIO16 (LEDC channel)
//! - Error LED -> GPIO4 (LEDC channel)

mod http;
mod led;
mod spi;
mod wifi;

pub use http::EspPushClient;
pub use led::LedIndicator;
pub use spi::SpiTransport;
pub use wifi::EspWifiLink;
