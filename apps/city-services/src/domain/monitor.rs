//! Lifecycle of one traffic-flow subscription.
//!
//! ```text
//! Idle ──► Validating ──► Streaming ──► Terminated
//!               │                           ▲
//!               └───────────────────────────┘
//! ```
//!
//! Every other transition is reported as a [`LifecycleError`]. Termination
//! is recorded once; later attempts are ignored.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Where a subscription currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created, request not yet inspected.
    Idle,
    /// Intersection id being checked.
    Validating,
    /// Producer running, updates flowing.
    Streaming,
    /// Finished; no further updates.
    Terminated(TerminationReason),
}

/// Why a subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The requested intersection does not exist.
    UnknownIntersection,
    /// The client went away.
    Cancelled,
    /// The server stopped the subscription.
    Shutdown,
    /// The producer failed while generating an update.
    ProducerFault,
}

impl TerminationReason {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownIntersection => "unknown_intersection",
            Self::Cancelled => "cancelled",
            Self::Shutdown => "shutdown",
            Self::ProducerFault => "producer_fault",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Transition not allowed from the current state.
    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        /// Attempted action.
        action: &'static str,
        /// State at the time of the attempt.
        state: SubscriptionState,
    },
    /// The subscription already ended.
    #[error("subscription terminated ({0})")]
    Terminated(TerminationReason),
}

/// Sequence number and timestamp assigned to one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStamp {
    /// 1-based tick number.
    pub sequence: u64,
    /// Tick time, never earlier than the previous tick.
    pub timestamp: DateTime<Utc>,
}

/// State machine for one subscription.
#[derive(Debug)]
pub struct SubscriptionLifecycle {
    state: SubscriptionState,
    sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Default for SubscriptionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionLifecycle {
    /// Start in [`SubscriptionState::Idle`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SubscriptionState::Idle,
            sequence: 0,
            last_timestamp: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Number of ticks recorded so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.sequence
    }

    /// Reason for termination, if terminated.
    #[must_use]
    pub const fn termination_reason(&self) -> Option<TerminationReason> {
        match self.state {
            SubscriptionState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Idle → Validating.
    ///
    /// # Errors
    ///
    /// Fails from any state other than `Idle`.
    pub fn begin_validation(&mut self) -> Result<(), LifecycleError> {
        self.transition("validate", SubscriptionState::Idle, SubscriptionState::Validating)
    }

    /// Validating → Streaming.
    ///
    /// # Errors
    ///
    /// Fails from any state other than `Validating`.
    pub fn accept(&mut self) -> Result<(), LifecycleError> {
        self.transition("accept", SubscriptionState::Validating, SubscriptionState::Streaming)
    }

    /// Assign the next sequence number and a timestamp no earlier than the
    /// previous one.
    ///
    /// # Errors
    ///
    /// Fails unless the subscription is streaming.
    pub fn record_tick(&mut self, now: DateTime<Utc>) -> Result<TickStamp, LifecycleError> {
        match self.state {
            SubscriptionState::Streaming => {}
            SubscriptionState::Terminated(reason) => {
                return Err(LifecycleError::Terminated(reason));
            }
            state => {
                return Err(LifecycleError::InvalidTransition {
                    action: "tick",
                    state,
                });
            }
        }

        let timestamp = self.last_timestamp.map_or(now, |last| last.max(now));
        self.last_timestamp = Some(timestamp);
        self.sequence += 1;

        Ok(TickStamp {
            sequence: self.sequence,
            timestamp,
        })
    }

    /// Move to `Terminated`. Returns `true` only for the first call.
    pub fn terminate(&mut self, reason: TerminationReason) -> bool {
        if matches!(self.state, SubscriptionState::Terminated(_)) {
            return false;
        }
        self.state = SubscriptionState::Terminated(reason);
        true
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SubscriptionState,
        to: SubscriptionState,
    ) -> Result<(), LifecycleError> {
        match self.state {
            state if state == from => {
                self.state = to;
                Ok(())
            }
            SubscriptionState::Terminated(reason) => Err(LifecycleError::Terminated(reason)),
            state => Err(LifecycleError::InvalidTransition { action, state }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn streaming() -> SubscriptionLifecycle {
        let mut lifecycle = SubscriptionLifecycle::new();
        lifecycle.begin_validation().unwrap();
        lifecycle.accept().unwrap();
        lifecycle
    }

    #[test]
    fn happy_path() {
        let mut lifecycle = SubscriptionLifecycle::new();
        assert_eq!(lifecycle.state(), SubscriptionState::Idle);

        lifecycle.begin_validation().unwrap();
        assert_eq!(lifecycle.state(), SubscriptionState::Validating);

        lifecycle.accept().unwrap();
        assert_eq!(lifecycle.state(), SubscriptionState::Streaming);

        assert!(lifecycle.terminate(TerminationReason::Cancelled));
        assert_eq!(
            lifecycle.termination_reason(),
            Some(TerminationReason::Cancelled)
        );
    }

    #[test]
    fn unknown_intersection_skips_streaming() {
        let mut lifecycle = SubscriptionLifecycle::new();
        lifecycle.begin_validation().unwrap();
        assert!(lifecycle.terminate(TerminationReason::UnknownIntersection));

        assert_eq!(
            lifecycle.accept(),
            Err(LifecycleError::Terminated(
                TerminationReason::UnknownIntersection
            ))
        );
        assert_eq!(lifecycle.ticks(), 0);
    }

    #[test]
    fn accept_requires_validation() {
        let mut lifecycle = SubscriptionLifecycle::new();
        let error = lifecycle.accept().unwrap_err();
        assert!(matches!(
            error,
            LifecycleError::InvalidTransition {
                state: SubscriptionState::Idle,
                ..
            }
        ));
    }

    #[test]
    fn tick_outside_streaming_is_rejected() {
        let mut lifecycle = SubscriptionLifecycle::new();
        assert!(lifecycle.record_tick(Utc::now()).is_err());
    }

    #[test]
    fn termination_is_recorded_once() {
        let mut lifecycle = streaming();
        assert!(lifecycle.terminate(TerminationReason::Shutdown));
        assert!(!lifecycle.terminate(TerminationReason::Cancelled));
        assert_eq!(
            lifecycle.termination_reason(),
            Some(TerminationReason::Shutdown)
        );
    }

    #[test]
    fn push_after_termination_is_rejected() {
        let mut lifecycle = streaming();
        lifecycle.record_tick(Utc::now()).unwrap();
        lifecycle.terminate(TerminationReason::Cancelled);

        assert_eq!(
            lifecycle.record_tick(Utc::now()),
            Err(LifecycleError::Terminated(TerminationReason::Cancelled))
        );
        assert_eq!(lifecycle.ticks(), 1);
    }

    #[test]
    fn sequence_starts_at_one_and_increments() {
        let mut lifecycle = streaming();
        let now = Utc::now();
        let sequences: Vec<u64> = (0..4)
            .map(|_| lifecycle.record_tick(now).unwrap().sequence)
            .collect();
        assert_eq!(sequences, [1, 2, 3, 4]);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut lifecycle = streaming();
        let now = Utc::now();

        let first = lifecycle.record_tick(now).unwrap();
        let second = lifecycle
            .record_tick(now - TimeDelta::seconds(10))
            .unwrap();
        let third = lifecycle.record_tick(now + TimeDelta::seconds(1)).unwrap();

        assert_eq!(second.timestamp, first.timestamp);
        assert!(third.timestamp > second.timestamp);
    }
}
