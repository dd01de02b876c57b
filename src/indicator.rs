//! Status indicator outputs and their pulse patterns

use log::warn;
use std::time::Duration;

use crate::clock::Clock;

/// A dimmable status output such as an LED on a PWM channel.
pub trait Indicator {
    /// Error type for output operations
    type Error: std::fmt::Debug;

    /// Set the output level, 0 is off and 255 is full brightness
    fn set_level(&mut self, level: u8) -> Result<(), Self::Error>;
}

/// Output levels
pub struct Level;

impl Level {
    pub const OFF: u8 = 0;
    /// Dim glow shown while waiting for a card
    pub const WAITING: u8 = 32;
    pub const FULL: u8 = 255;
}

/// A blink pattern: `count` times on for `on`, then off for `off`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub on: Duration,
    pub off: Duration,
    pub count: u8,
}

impl Pulse {
    pub const fn millis(on: u64, off: u64, count: u8) -> Self {
        Self {
            on: Duration::from_millis(on),
            off: Duration::from_millis(off),
            count,
        }
    }

    /// Shown while the serial console settles at boot
    pub const STARTUP: Pulse = Pulse::millis(100, 100, 5);
    /// A new card was accepted
    pub const FOUND: Pulse = Pulse::millis(100, 50, 2);
    /// The reader reported a card access error
    pub const ACCESS_ERROR: Pulse = Pulse::millis(100, 50, 3);
    /// Repeated forever once startup has failed
    pub const FAULT: Pulse = Pulse::millis(400, 100, 3);

    /// Total time the pattern blocks for
    pub fn duration(&self) -> Duration {
        (self.on + self.off) * self.count as u32
    }
}

/// Which of the two outputs to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Light {
    Info,
    Error,
}

/// The info and error indicators, driven through a shared clock.
pub struct StatusLights<I: Indicator> {
    info: I,
    error: I,
}

impl<I: Indicator> StatusLights<I> {
    pub fn new(info: I, error: I) -> Self {
        Self { info, error }
    }

    /// Set one output. Failures are logged and otherwise ignored.
    pub fn set(&mut self, light: Light, level: u8) {
        let output = match light {
            Light::Info => &mut self.info,
            Light::Error => &mut self.error,
        };
        if let Err(e) = output.set_level(level) {
            warn!("Failed to set {:?} indicator to {}: {:?}", light, level, e);
        }
    }

    /// Play `pulse` on one output, blocking on `clock` until it finishes
    pub fn blink<C: Clock>(&mut self, clock: &mut C, light: Light, pulse: Pulse) {
        for _ in 0..pulse.count {
            self.set(light, Level::FULL);
            clock.sleep(pulse.on);
            self.set(light, Level::OFF);
            clock.sleep(pulse.off);
        }
    }

    /// Hold one output at `level` for `hold`, then switch it off
    pub fn hold<C: Clock>(&mut self, clock: &mut C, light: Light, level: u8, hold: Duration) {
        self.set(light, level);
        clock.sleep(hold);
        self.set(light, Level::OFF);
    }

    pub fn info(&self) -> &I {
        &self.info
    }

    pub fn error(&self) -> &I {
        &self.error
    }
}
