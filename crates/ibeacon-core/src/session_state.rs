//! Advertising Session State Machine
//!
//! Transitions consume the current state so an invalid sequence (for example
//! acknowledging a stop that was never issued) is reported instead of being
//! silently absorbed.

use core::fmt;

use thiserror::Error;

use crate::errors::BeaconError;
use crate::record::AdvertisementRecord;
use crate::types::SessionHandle;

// ----------------------------------------------------------------------------
// Session State Types
// ----------------------------------------------------------------------------

/// Lifecycle of the single advertiser owned by a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing submitted to the radio
    #[default]
    Idle,
    /// Record submitted, waiting for the stack to report
    Starting { record: AdvertisementRecord },
    /// Stack confirmed the broadcast
    Advertising {
        handle: SessionHandle,
        record: AdvertisementRecord,
    },
    /// Stop issued, waiting for the stack to acknowledge
    Stopping {
        handle: SessionHandle,
        record: AdvertisementRecord,
    },
    /// Last start attempt failed
    Failed { reason: BeaconError },
}

/// Events that drive [`SessionState`] transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Record submitted to the stack
    Start { record: AdvertisementRecord },
    /// Input rejected before the radio was touched
    Rejected { reason: BeaconError },
    /// Stack reported the broadcast is live
    StartSucceeded { handle: SessionHandle },
    /// Stack reported the start failed
    StartFailed { reason: BeaconError },
    /// Stop requested by the caller
    Stop,
    /// Stack acknowledged the stop
    StopAcknowledged,
    /// Stack refused to stop; the broadcast is still live
    StopFailed { reason: BeaconError },
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl SessionState {
    /// Get current state name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Starting { .. } => "Starting",
            SessionState::Advertising { .. } => "Advertising",
            SessionState::Stopping { .. } => "Stopping",
            SessionState::Failed { .. } => "Failed",
        }
    }

    /// Process an event and transition to the next state (consumes self)
    pub fn transition(self, event: SessionEvent) -> Result<SessionState, StateTransitionError> {
        let from_state = self.state_name();

        let next = match (self, event) {
            // From Idle or Failed
            (
                SessionState::Idle | SessionState::Failed { .. },
                SessionEvent::Start { record },
            ) => SessionState::Starting { record },

            (
                SessionState::Idle | SessionState::Failed { .. },
                SessionEvent::Rejected { reason },
            ) => SessionState::Failed { reason },

            (SessionState::Idle | SessionState::Failed { .. }, SessionEvent::Stop) => {
                SessionState::Idle
            }

            // From Starting
            (SessionState::Starting { record }, SessionEvent::StartSucceeded { handle }) => {
                SessionState::Advertising { handle, record }
            }

            (SessionState::Starting { .. }, SessionEvent::StartFailed { reason }) => {
                SessionState::Failed { reason }
            }

            // From Advertising
            (SessionState::Advertising { handle, record }, SessionEvent::Stop) => {
                SessionState::Stopping { handle, record }
            }

            // From Stopping
            (SessionState::Stopping { .. }, SessionEvent::StopAcknowledged) => SessionState::Idle,

            (SessionState::Stopping { handle, record }, SessionEvent::StopFailed { .. }) => {
                SessionState::Advertising { handle, record }
            }

            // Invalid transitions
            (_, event) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state,
                    event: event.name(),
                });
            }
        };

        Ok(next)
    }

    /// Handle of the live broadcast, if any
    pub fn handle(&self) -> Option<SessionHandle> {
        match self {
            SessionState::Advertising { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    /// Record on air or being submitted
    pub fn record(&self) -> Option<&AdvertisementRecord> {
        match self {
            SessionState::Starting { record }
            | SessionState::Advertising { record, .. }
            | SessionState::Stopping { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn is_advertising(&self) -> bool {
        matches!(self, SessionState::Advertising { .. })
    }

    /// Whether an OS request is outstanding
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SessionState::Starting { .. } | SessionState::Stopping { .. }
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Advertising { handle, record } => {
                write!(f, "Advertising ({}, {})", handle, record.identity())
            }
            SessionState::Failed { reason } => write!(f, "Failed ({})", reason),
            other => f.write_str(other.state_name()),
        }
    }
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start { .. } => "Start",
            SessionEvent::Rejected { .. } => "Rejected",
            SessionEvent::StartSucceeded { .. } => "StartSucceeded",
            SessionEvent::StartFailed { .. } => "StartFailed",
            SessionEvent::Stop => "Stop",
            SessionEvent::StopAcknowledged => "StopAcknowledged",
            SessionEvent::StopFailed { .. } => "StopFailed",
        }
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on event {event}")]
    InvalidTransition {
        from_state: &'static str,
        event: &'static str,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::encode;
    use crate::types::{AdvertisingTuning, BeaconIdentity};

    fn create_test_record() -> AdvertisementRecord {
        encode(&BeaconIdentity::default(), &AdvertisingTuning::default())
    }

    #[test]
    fn test_initial_state() {
        let state = SessionState::default();
        assert_eq!(state.state_name(), "Idle");
        assert!(!state.is_advertising());
        assert!(state.handle().is_none());
    }

    #[test]
    fn test_start_stop_flow() {
        let record = create_test_record();
        let handle = SessionHandle::new(1);

        let state = SessionState::Idle
            .transition(SessionEvent::Start { record })
            .unwrap();
        assert_eq!(state.state_name(), "Starting");
        assert!(state.is_pending());

        let state = state
            .transition(SessionEvent::StartSucceeded { handle })
            .unwrap();
        assert_eq!(state.handle(), Some(handle));

        let state = state.transition(SessionEvent::Stop).unwrap();
        assert_eq!(state, SessionState::Stopping { handle, record });
        assert_eq!(state.record(), Some(&record));

        let state = state.transition(SessionEvent::StopAcknowledged).unwrap();
        assert_eq!(state, SessionState::Idle);
    }

    #[test]
    fn test_failure_and_restart() {
        let record = create_test_record();
        let reason = BeaconError::radio_unavailable("powered off");

        let state = SessionState::Idle
            .transition(SessionEvent::Start { record })
            .unwrap()
            .transition(SessionEvent::StartFailed {
                reason: reason.clone(),
            })
            .unwrap();
        assert_eq!(state, SessionState::Failed { reason });

        let state = state.transition(SessionEvent::Start { record }).unwrap();
        assert_eq!(state.state_name(), "Starting");
    }

    #[test]
    fn test_refused_stop_keeps_broadcast() {
        let record = create_test_record();
        let handle = SessionHandle::new(3);

        let state = SessionState::Advertising { handle, record }
            .transition(SessionEvent::Stop)
            .unwrap()
            .transition(SessionEvent::StopFailed {
                reason: BeaconError::start_failed(4, "internal error"),
            })
            .unwrap();
        assert_eq!(state, SessionState::Advertising { handle, record });
    }

    #[test]
    fn test_stop_is_idempotent_when_idle() {
        let state = SessionState::Idle.transition(SessionEvent::Stop).unwrap();
        assert_eq!(state, SessionState::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        let record = create_test_record();
        let advertising = SessionState::Advertising {
            handle: SessionHandle::new(1),
            record,
        };

        let err = advertising
            .transition(SessionEvent::Start { record })
            .unwrap_err();
        assert_eq!(
            err,
            StateTransitionError::InvalidTransition {
                from_state: "Advertising",
                event: "Start"
            }
        );

        assert!(SessionState::Idle
            .transition(SessionEvent::StopAcknowledged)
            .is_err());
        assert!(SessionState::Starting { record }
            .transition(SessionEvent::Stop)
            .is_err());
    }
}
