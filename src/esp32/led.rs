//! PWM status LEDs

use esp_idf_svc::hal::ledc::LedcDriver;
use esp_idf_svc::sys::EspError;

use crate::indicator::Indicator;

pub struct LedIndicator<'d> {
    channel: LedcDriver<'d>,
}

impl<'d> LedIndicator<'d> {
    pub fn new(channel: LedcDriver<'d>) -> Self {
        Self { channel }
    }
}

impl Indicator for LedIndicator<'_> {
    type Error = EspError;

    fn set_level(&mut self, level: u8) -> Result<(), Self::Error> {
        let duty = self.channel.get_max_duty() * level as u32 / u8::MAX as u32;
        self.channel.set_duty(duty)
    }
}
