// Copyright (c) 2025 - Cowboy AI, Inc.
//! Lifecycle State Machines
//!
//! Lifecycles the control plane does not model declaratively are pure
//! transition functions. Provisioners make the calls; the machine decides
//! whether the step that follows is legal and what downstream consumers may
//! see afterwards.
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! ```rust
//! use msk_connect_infrastructure::domain::ArtifactHandle;
//! use msk_connect_infrastructure::state_machine::{ArtifactInput, ArtifactState, StateMachine};
//!
//! let handle = ArtifactHandle { arn: "arn:plugin".to_string(), revision: 1 };
//! let (registering, visible) = ArtifactState::Absent
//!     .transition(&ArtifactInput::BeginRegistration)
//!     .unwrap();
//! assert_eq!(visible, None);
//!
//! let (registered, visible) = registering
//!     .transition(&ArtifactInput::RegistrationSucceeded(handle.clone()))
//!     .unwrap();
//! assert_eq!(registered, ArtifactState::Registered(handle.clone()));
//! assert_eq!(visible, Some(handle));
//! ```

pub mod artifact_lifecycle;

pub use artifact_lifecycle::{ArtifactInput, ArtifactState};

use chrono::{DateTime, Utc};

pub type TransitionResult<S> = Result<S, TransitionError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The input is not accepted in the current state
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// The input is accepted in this state but its payload is not
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
}

/// Mealy machine over `Self` as the state
pub trait StateMachine: Sized + Clone {
    type Input;
    type Output;

    /// Next state and output, or why `input` is refused
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }
}

/// One applied step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub timestamp: DateTime<Utc>,
}

/// A machine plus the steps that led to its current state
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<M: StateMachine> {
    current: M,
    history: Vec<Transition<M, M::Input>>,
}

impl<M: StateMachine> StateMachineWithHistory<M> {
    pub fn new(initial: M) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Apply `input`; a refused input leaves state and history untouched
    pub fn transition_with_history(
        &mut self,
        input: M::Input,
        timestamp: DateTime<Utc>,
    ) -> TransitionResult<M::Output> {
        let (to, output) = self.current.transition(&input)?;
        let from = std::mem::replace(&mut self.current, to.clone());
        self.history.push(Transition {
            from,
            to,
            input,
            timestamp,
        });
        Ok(output)
    }

    pub fn history(&self) -> &[Transition<M, M::Input>] {
        &self.history
    }

    pub fn current_state(&self) -> &M {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArtifactHandle;
    use pretty_assertions::assert_eq;

    fn handle() -> ArtifactHandle {
        ArtifactHandle {
            arn: "arn:aws:kafkaconnect:us-east-1:123456789012:custom-plugin/p/1".to_string(),
            revision: 1,
        }
    }

    #[test]
    fn test_history_records_accepted_steps_only() {
        let mut machine = StateMachineWithHistory::new(ArtifactState::Absent);

        machine
            .transition_with_history(ArtifactInput::BeginRegistration, Utc::now())
            .unwrap();
        assert!(machine
            .transition_with_history(ArtifactInput::DeregistrationFailed, Utc::now())
            .is_err());
        machine
            .transition_with_history(ArtifactInput::RegistrationSucceeded(handle()), Utc::now())
            .unwrap();

        assert_eq!(*machine.current_state(), ArtifactState::Registered(handle()));
        assert_eq!(machine.history().len(), 2);
        assert_eq!(machine.history()[0].from, ArtifactState::Absent);
        assert_eq!(machine.history()[1].to, ArtifactState::Registered(handle()));
    }
}
