// SPDX-License-Identifier: MIT

//! Table-driven state machine core.
//!
//! A [`StateSet`] is an ordered collection of state descriptors, each with
//! a transition list matched by event identity in order (first match wins).
//! The machine itself is pure bookkeeping: the scheduler runs the current
//! state's action, then feeds the resulting event to [`Machine::apply`].
//! Externally posted events (child completion, retry timers, fetch
//! notices) are consumed by the next step instead of running the action.
//! Cancellation is not posted: it is a cooperative flag the actions check
//! on entry, so they get to clean up before returning `Cancel`.

use chef_core::{Outcome, StateTag};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::error;

/// Errors from machine construction
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("state {0} is not part of state set '{1}'")]
    UnknownState(StateTag, &'static str),
    #[error("state set '{0}' is empty")]
    EmptySet(&'static str),
}

/// Immutable description of one state: its tag and ordered transitions.
#[derive(Debug, Clone)]
pub struct StateDescriptor {
    pub tag: StateTag,
    /// `(event, target)` pairs; matched in order, first match wins.
    /// Terminal states have an empty list.
    pub transitions: Vec<(Outcome, StateTag)>,
}

impl StateDescriptor {
    pub fn new(tag: StateTag, transitions: Vec<(Outcome, StateTag)>) -> Self {
        Self { tag, transitions }
    }

    pub fn terminal(tag: StateTag) -> Self {
        Self {
            tag,
            transitions: Vec::new(),
        }
    }

    /// First transition matching the event, if any.
    pub fn target_for(&self, event: Outcome) -> Option<StateTag> {
        self.transitions
            .iter()
            .find(|(e, _)| *e == event)
            .map(|(_, target)| *target)
    }
}

/// An ordered collection of state descriptors defining one lifecycle.
#[derive(Debug, Clone)]
pub struct StateSet {
    name: &'static str,
    states: IndexMap<StateTag, StateDescriptor>,
}

impl StateSet {
    pub fn new(name: &'static str, descriptors: Vec<StateDescriptor>) -> Self {
        let mut states = IndexMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            states.insert(descriptor.tag, descriptor);
        }
        Self { name, states }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contains(&self, tag: StateTag) -> bool {
        self.states.contains_key(&tag)
    }

    pub fn get(&self, tag: StateTag) -> Option<&StateDescriptor> {
        self.states.get(&tag)
    }

    /// The entry state: the first descriptor in declaration order.
    pub fn initial(&self) -> Option<StateTag> {
        self.states.keys().next().copied()
    }

    /// All descriptors in declaration order.
    pub fn states(&self) -> impl Iterator<Item = &StateDescriptor> {
        self.states.values()
    }
}

/// Result of applying one event to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Advanced to a non-terminal state; step again.
    Continue,
    /// The action handed work to a collaborator; suspend until an external
    /// event is posted.
    Waiting,
    /// Reached `completed`.
    Done,
    /// Reached `error` or `cancelled`.
    Aborted,
}

/// One transaction's state machine instance.
#[derive(Debug)]
pub struct Machine {
    set: StateSet,
    current: StateTag,
    posted: Option<Outcome>,
}

impl Machine {
    /// Start a machine at the set's entry state.
    pub fn new(set: StateSet) -> Result<Self, MachineError> {
        let initial = set.initial().ok_or(MachineError::EmptySet(set.name))?;
        Self::resume(set, initial)
    }

    /// Start a machine at an explicit state (journal restoration).
    pub fn resume(set: StateSet, state: StateTag) -> Result<Self, MachineError> {
        if !set.contains(state) {
            return Err(MachineError::UnknownState(state, set.name));
        }
        Ok(Self {
            set,
            current: state,
            posted: None,
        })
    }

    pub fn current(&self) -> StateTag {
        self.current
    }

    pub fn set_name(&self) -> &'static str {
        self.set.name
    }

    /// Deliver an external event, applied by the next step instead of
    /// running the current state's action. Last writer wins.
    pub fn post(&mut self, event: Outcome) {
        self.posted = Some(event);
    }

    /// Take a pending posted event, if any.
    pub fn take_posted(&mut self) -> Option<Outcome> {
        self.posted.take()
    }

    pub fn has_posted(&self) -> bool {
        self.posted.is_some()
    }

    /// Apply one event to the current state and transition.
    ///
    /// An event with no matching transition is a state-table bug; it is
    /// routed to `error` so no event is ever silently dropped.
    pub fn apply(&mut self, event: Outcome) -> Step {
        if self.current.is_terminal() {
            return if self.current == StateTag::Completed {
                Step::Done
            } else {
                Step::Aborted
            };
        }

        let target = self
            .set
            .get(self.current)
            .and_then(|descriptor| descriptor.target_for(event));

        let target = match target {
            Some(target) => target,
            None => {
                error!(
                    set = self.set.name,
                    state = %self.current,
                    event = %event,
                    "no transition for event, routing to error"
                );
                StateTag::Error
            }
        };

        self.current = target;
        match target {
            StateTag::Completed => Step::Done,
            StateTag::Error | StateTag::Cancelled => Step::Aborted,
            _ if event == Outcome::Wait => Step::Waiting,
            _ => Step::Continue,
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
