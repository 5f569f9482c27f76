// Copyright (c) 2025 - Cowboy AI, Inc.
//! Custom Artifact Lifecycle State Machine
//!
//! # States
//!
//! - Absent: nothing registered (initial, and after deregistration)
//! - Registering: a register call is in flight
//! - Registered: a revision is live and visible downstream
//! - Deregistering: a deregister call is in flight
//!
//! # Inputs
//!
//! - BeginRegistration: Absent | Registered → Registering
//! - RegistrationSucceeded: Registering → Registered
//! - RegistrationFailed: Registering → previous state
//! - BeginDeregistration: Registered → Deregistering, Absent → Absent
//! - DeregistrationSucceeded: Deregistering | Absent → Absent
//! - DeregistrationFailed: Deregistering → Registered
//!
//! # Output
//!
//! The handle visible to consumers after the transition. Only `Registered`
//! exposes one; an in-flight re-registration hides the previous revision.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};
use crate::domain::ArtifactHandle;

/// Registration state of one physical id
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "handle", rename_all = "snake_case")]
pub enum ArtifactState {
    #[default]
    Absent,
    Registering { previous: Option<ArtifactHandle> },
    Registered(ArtifactHandle),
    Deregistering(ArtifactHandle),
}

impl ArtifactState {
    /// The handle downstream consumers may bind to
    pub fn visible_handle(&self) -> Option<&ArtifactHandle> {
        match self {
            ArtifactState::Registered(handle) => Some(handle),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactState::Absent => write!(f, "absent"),
            ArtifactState::Registering { .. } => write!(f, "registering"),
            ArtifactState::Registered(handle) => write!(f, "registered({})", handle),
            ArtifactState::Deregistering(handle) => write!(f, "deregistering({})", handle),
        }
    }
}

/// Lifecycle events (FSM input)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactInput {
    BeginRegistration,
    RegistrationSucceeded(ArtifactHandle),
    RegistrationFailed,
    BeginDeregistration,
    DeregistrationSucceeded,
    DeregistrationFailed,
}

impl StateMachine for ArtifactState {
    type Input = ArtifactInput;
    type Output = Option<ArtifactHandle>;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use ArtifactInput::*;
        use ArtifactState::*;

        let next = match (self, input) {
            (Absent, BeginRegistration) => Registering { previous: None },
            (Registered(handle), BeginRegistration) => Registering {
                previous: Some(handle.clone()),
            },

            (Registering { previous }, RegistrationSucceeded(handle)) => {
                if let Some(previous) = previous {
                    if previous.arn != handle.arn || handle.revision < previous.revision {
                        return Err(TransitionError::PreconditionFailed(format!(
                            "{} does not supersede {}",
                            handle, previous
                        )));
                    }
                }
                Registered(handle.clone())
            }
            (Registering { previous }, RegistrationFailed) => match previous {
                Some(handle) => Registered(handle.clone()),
                None => Absent,
            },

            (Registered(handle), BeginDeregistration) => Deregistering(handle.clone()),
            (Absent, BeginDeregistration) => Absent,
            (Deregistering(_), DeregistrationSucceeded) | (Absent, DeregistrationSucceeded) => {
                Absent
            }
            (Deregistering(handle), DeregistrationFailed) => Registered(handle.clone()),

            (state, input) => {
                return Err(TransitionError::InvalidTransition {
                    from: state.to_string(),
                    input: format!("{:?}", input),
                })
            }
        };

        let output = next.visible_handle().cloned();
        Ok((next, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StateMachineWithHistory;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn handle(revision: u64) -> ArtifactHandle {
        ArtifactHandle {
            arn: "arn:aws:kafkaconnect:us-east-1:1:custom-plugin/p/1".to_string(),
            revision,
        }
    }

    #[test]
    fn test_register_then_deregister() {
        let mut fsm = StateMachineWithHistory::new(ArtifactState::Absent);

        assert_eq!(
            fsm.transition_with_history(ArtifactInput::BeginRegistration, Utc::now())
                .unwrap(),
            None
        );
        assert_eq!(
            fsm.transition_with_history(ArtifactInput::RegistrationSucceeded(handle(1)), Utc::now())
                .unwrap(),
            Some(handle(1))
        );
        fsm.transition_with_history(ArtifactInput::BeginDeregistration, Utc::now())
            .unwrap();
        fsm.transition_with_history(ArtifactInput::DeregistrationSucceeded, Utc::now())
            .unwrap();

        assert_eq!(*fsm.current_state(), ArtifactState::Absent);
        assert_eq!(fsm.history().len(), 4);
    }

    #[test]
    fn test_in_flight_update_hides_previous_revision() {
        let (state, visible) = ArtifactState::Registered(handle(1))
            .transition(&ArtifactInput::BeginRegistration)
            .unwrap();
        assert_eq!(visible, None);
        assert_eq!(state.visible_handle(), None);
    }

    #[test]
    fn test_failed_update_restores_previous_revision() {
        let registering = ArtifactState::Registering {
            previous: Some(handle(1)),
        };
        let (state, visible) = registering
            .transition(&ArtifactInput::RegistrationFailed)
            .unwrap();
        assert_eq!(state, ArtifactState::Registered(handle(1)));
        assert_eq!(visible, Some(handle(1)));
    }

    #[test]
    fn test_revision_cannot_go_backwards() {
        let registering = ArtifactState::Registering {
            previous: Some(handle(3)),
        };
        assert!(matches!(
            registering.transition(&ArtifactInput::RegistrationSucceeded(handle(2))),
            Err(TransitionError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_duplicate_delete_is_tolerated() {
        let (state, _) = ArtifactState::Absent
            .transition(&ArtifactInput::BeginDeregistration)
            .unwrap();
        assert_eq!(state, ArtifactState::Absent);
    }

    #[test]
    fn test_invalid_transition() {
        assert!(!ArtifactState::Absent.can_transition(&ArtifactInput::RegistrationSucceeded(handle(1))));
        assert!(!ArtifactState::Registered(handle(1)).can_transition(&ArtifactInput::DeregistrationFailed));
    }
}
