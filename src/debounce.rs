//! Duplicate-scan suppression
//!
//! A card resting on the reader answers every poll. Only the first answer is
//! reported; the same IDm is suppressed until the debounce window measured
//! from the last *accepted* observation has passed.

use std::time::Duration;

use crate::types::{CardObservation, Idm};

/// Default debounce window
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Duplicate,
}

/// Last accepted card and when it was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebounceState {
    pub last_identifier: Idm,
    pub last_observed_at: Duration,
}

impl DebounceState {
    /// Startup state: zero IDm observed at the epoch
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, observation: &CardObservation, window: Duration) -> Verdict {
        let elapsed = observation
            .observed_at
            .saturating_sub(self.last_observed_at);

        if observation.idm == self.last_identifier && elapsed < window {
            Verdict::Duplicate
        } else {
            Verdict::Accept
        }
    }

    /// State after `observation` has been accepted
    pub fn accept(&self, observation: &CardObservation) -> DebounceState {
        DebounceState {
            last_identifier: observation.idm,
            last_observed_at: observation.observed_at,
        }
    }
}
