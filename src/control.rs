//! Startup state machine and the read/notify control loop

use log::{error, info, warn};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::{Config, Timing};
use crate::debounce::{DebounceState, Verdict};
use crate::indicator::{Indicator, Level, Light, Pulse, StatusLights};
use crate::network::NetworkLink;
use crate::notifier::{Delivery, Notifier};
use crate::reader::CardReader;
use crate::types::{CardObservation, FelicaTarget, ReaderError, StartupError};

/// One poll result as seen by the loop
#[derive(Debug)]
pub enum PollOutcome {
    /// No card answered in time
    Timeout,
    /// The reader failed this poll; polling continues
    TransientError(ReaderError),
    Card(CardObservation),
}

impl PollOutcome {
    /// Classify a reader poll result and stamp a card with `now`
    pub fn from_poll(result: Result<Option<FelicaTarget>, ReaderError>, now: Duration) -> Self {
        match result {
            Ok(Some(target)) => PollOutcome::Card(CardObservation::new(target, now)),
            Ok(None) => PollOutcome::Timeout,
            Err(e) if e.is_timeout() => PollOutcome::Timeout,
            Err(e) => PollOutcome::TransientError(e),
        }
    }
}

/// What the loop does with a poll outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Idle,
    /// Card access error with the reader status code
    AccessError(i8),
    Duplicate,
    Accept(CardObservation),
}

impl Decision {
    /// How long the loop waits before the next poll
    pub fn pause(&self, timing: &Timing) -> Duration {
        match self {
            Decision::Idle => timing.idle_pause,
            Decision::AccessError(_) => timing.access_error_pause,
            Decision::Duplicate => timing.duplicate_pause,
            Decision::Accept(_) => timing.accept_pause,
        }
    }
}

/// Decide on one poll outcome.
///
/// Only an accepted card changes the state; timeouts, access errors and
/// duplicates hand `state` back untouched. Duplicates are judged against
/// `timing.debounce_window`.
pub fn handle_poll_result(
    state: DebounceState,
    outcome: &PollOutcome,
    timing: &Timing,
) -> (DebounceState, Decision) {
    match outcome {
        PollOutcome::Timeout => (state, Decision::Idle),
        PollOutcome::TransientError(e) => (state, Decision::AccessError(e.code())),
        PollOutcome::Card(observation) => match state.check(observation, timing.debounce_window) {
            Verdict::Duplicate => (state, Decision::Duplicate),
            Verdict::Accept => (state.accept(observation), Decision::Accept(*observation)),
        },
    }
}

/// Why startup stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    ReaderNotFound,
    NetworkJoin,
}

impl From<&StartupError> for FaultCause {
    fn from(e: &StartupError) -> Self {
        match e {
            StartupError::Reader(_) => FaultCause::ReaderNotFound,
            StartupError::Network(_) => FaultCause::NetworkJoin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    ReaderReady,
    NetworkReady,
    Polling,
    /// Terminal; only a reset leaves it
    Fault(FaultCause),
}

/// Owns the reader, network, notifier, indicators and clock, and threads the
/// debounce state through each loop iteration.
pub struct Controller<R, L, N, I, C>
where
    R: CardReader,
    L: NetworkLink,
    N: Notifier,
    I: Indicator,
    C: Clock,
{
    reader: R,
    network: L,
    notifier: N,
    lights: StatusLights<I>,
    clock: C,
    config: Config,
    phase: Phase,
    debounce: DebounceState,
}

impl<R, L, N, I, C> Controller<R, L, N, I, C>
where
    R: CardReader,
    L: NetworkLink,
    N: Notifier,
    I: Indicator,
    C: Clock,
{
    pub fn new(reader: R, network: L, notifier: N, lights: StatusLights<I>, clock: C, config: Config) -> Self {
        Self {
            reader,
            network,
            notifier,
            lights,
            clock,
            config,
            phase: Phase::Uninitialized,
            debounce: DebounceState::new(),
        }
    }

    /// Run startup, then loop forever
    pub fn run(&mut self) -> ! {
        self.start();
        loop {
            self.step();
        }
    }

    /// Walk the startup state machine: reader, then network, then polling.
    /// Any failure ends in [`Phase::Fault`].
    pub fn start(&mut self) -> Phase {
        self.lights.set(Light::Error, Level::OFF);
        self.lights.set(Light::Info, Level::FULL);

        for remaining in (1..=self.config.startup_blinks).rev() {
            info!("[SETUP] WAIT {}...", remaining);
            self.lights.blink(&mut self.clock, Light::Info, Pulse::STARTUP);
        }

        if let Err(e) = self.bring_up() {
            error!("[SETUP] {}", e);
            self.phase = Phase::Fault(FaultCause::from(&e));
        }
        self.phase
    }

    fn bring_up(&mut self) -> Result<(), StartupError> {
        info!("[PN532] Connecting PN532 board");
        let firmware = self.reader.initialize()?;
        info!("[PN532] Ready: {}", firmware);
        self.debounce = DebounceState::new();
        self.phase = Phase::ReaderReady;

        info!("[WiFi] Connecting WiFi");
        let network = self
            .network
            .join(&self.config.networks, self.config.timing.network_join_timeout)?;
        info!("[WiFi] Connected, IP address: {}", network.address);
        self.phase = Phase::NetworkReady;

        self.phase = Phase::Polling;
        Ok(())
    }

    /// One loop iteration. In `Fault` this plays the error pattern once and
    /// never touches the reader. Returns the decision taken while polling.
    pub fn step(&mut self) -> Option<Decision> {
        match self.phase {
            Phase::Polling => Some(self.poll_once()),
            Phase::Fault(_) => {
                self.signal_fault();
                None
            }
            Phase::Uninitialized | Phase::ReaderReady | Phase::NetworkReady => {
                self.start();
                None
            }
        }
    }

    fn poll_once(&mut self) -> Decision {
        info!("[PN532] Waiting for a FeliCa card...");
        self.lights.set(Light::Info, Level::WAITING);

        let system_code = self.config.reader.system_code;
        let timeout_ms = self.config.timing.poll_timeout.as_millis() as u32;
        let result = self.reader.poll(system_code, timeout_ms);
        let outcome = PollOutcome::from_poll(result, self.clock.now());

        let (state, decision) = handle_poll_result(self.debounce, &outcome, &self.config.timing);
        self.debounce = state;
        self.execute(&decision);
        decision
    }

    fn execute(&mut self, decision: &Decision) {
        let pause = decision.pause(&self.config.timing);

        match decision {
            Decision::Idle => {
                info!("[PN532] Timeout");
                self.clock.sleep(pause);
            }
            Decision::AccessError(code) => {
                warn!("[PN532] Card access error: code {}", code);
                self.lights.set(Light::Info, Level::OFF);
                self.lights.blink(&mut self.clock, Light::Error, Pulse::ACCESS_ERROR);
                self.clock.sleep(pause);
            }
            Decision::Duplicate => {
                info!("[PN532] Same card");
                self.lights.set(Light::Info, Level::OFF);
                self.lights.hold(&mut self.clock, Light::Error, Level::FULL, pause);
            }
            Decision::Accept(observation) => {
                self.lights.blink(&mut self.clock, Light::Info, Pulse::FOUND);
                info!("[PN532] Found a card!");
                info!("[PN532]  IDm: {}", observation.idm);
                info!("[PN532]  PMm: {}", observation.pmm);
                if let Some(system_code) = observation.system_code {
                    info!("[PN532]  System Code: {:04X}", system_code);
                }

                self.report(observation);

                info!("Card access completed!");
                self.clock.sleep(pause);
            }
        }
    }

    /// Deliver one notification. The result is only logged.
    fn report(&mut self, observation: &CardObservation) {
        match self.notifier.notify(&observation.idm) {
            Ok(Delivery::Http { status, body }) => {
                info!("[HTTP] POST response code: {}", status);
                if status == 200 {
                    info!("[HTTP] response body: {}", body);
                }
            }
            Ok(Delivery::Datagram { bytes }) => info!("[UDP] Sent {} bytes", bytes),
            Err(e) => warn!("Notification for {} failed: {}", observation.idm, e),
        }
    }

    fn signal_fault(&mut self) {
        self.lights.set(Light::Info, Level::OFF);
        self.lights.blink(&mut self.clock, Light::Error, Pulse::FAULT);
        self.clock.sleep(self.config.timing.fault_pause);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn debounce_state(&self) -> DebounceState {
        self.debounce
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn network(&self) -> &L {
        &self.network
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn lights(&self) -> &StatusLights<I> {
        &self.lights
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
