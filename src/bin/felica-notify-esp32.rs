//! ESP32 firmware: PN532 on SPI, two LEDs on LEDC, cards reported over WiFi.
//!
//! Pin assignment is documented in `felica_notify::esp32`. Network credentials
//! and the push key are baked in at build time, see `Config::from_build_env`.

use anyhow::Result;
use embedded_hal::spi::MODE_0;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::spi::{config::Config as SpiConfig, SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::info;

use felica_notify::esp32::{EspPushClient, EspWifiLink, LedIndicator, SpiTransport};
use felica_notify::{Config, Controller, NotificationConfig, Pn532, StatusLights, SystemClock};

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("========================================");
    info!("FeliCa notifier");
    info!("========================================");

    let config = Config::from_build_env();
    match &config.notification {
        NotificationConfig::Push { url, topic, .. } => info!("Pushing cards to {} on {}", topic, url),
        NotificationConfig::Broadcast { address } => info!("Broadcasting cards to {}", address),
    }

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let spi = SpiDriver::new(
        peripherals.spi2,
        pins.gpio14, // SCK
        pins.gpio13, // MOSI
        Some(pins.gpio12), // MISO
        &SpiDriverConfig::new(),
    )?;
    let device = SpiDeviceDriver::new(
        spi,
        Some(pins.gpio5),
        &SpiConfig::new().baudrate(1.MHz().into()).data_mode(MODE_0),
    )?;
    let reader = Pn532::new(SpiTransport::new(device))
        .with_request_code(config.reader.request_code)
        .with_activation_retries(config.reader.activation_retries);

    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default().frequency(5.kHz().into()),
    )?;
    let info_led = LedIndicator::new(LedcDriver::new(peripherals.ledc.channel0, &timer, pins.gpio16)?);
    let error_led = LedIndicator::new(LedcDriver::new(peripherals.ledc.channel1, &timer, pins.gpio4)?);

    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let network = EspWifiLink::new(peripherals.modem, sysloop, Some(nvs))?;

    let notifier = config
        .notification
        .build_with(|| Ok(EspPushClient::new()), config.timing.push_timeout)?;

    let mut controller = Controller::new(
        reader,
        network,
        notifier,
        StatusLights::new(info_led, error_led),
        SystemClock::new(),
        config,
    );
    controller.run()
}
