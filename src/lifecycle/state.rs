//! Gate lifecycle state machine.
//!
//! # States
//! - Initializing: constructed, `start` not yet called
//! - Connecting: dependency connection in progress (may re-enter on retry)
//! - Ready: dependency connected, listener accepting traffic
//! - ShuttingDown: listener closed or draining, dependency released last
//! - Failed: startup gave up; terminal
//!
//! # State Transitions
//! ```text
//! Initializing → Connecting:   StartRequested
//! Connecting   → Connecting:   AttemptFailed (retry)
//! Connecting   → Ready:        DependencyReady
//! Connecting   → Failed:       RetriesExhausted | Cancelled | ListenerFailed
//! Ready        → ShuttingDown: ShutdownRequested
//! ```
//!
//! # Design Decisions
//! - Current state is a single `AtomicU8`, advanced by compare-and-swap
//! - Every transition is checked against the table above
//! - Entered states are kept in order for status reporting

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::observability::metrics;

/// Lifecycle state of a gate.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Initializing = 0,
    Connecting = 1,
    Ready = 2,
    ShuttingDown = 3,
    Failed = 4,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            1 => LifecycleState::Connecting,
            2 => LifecycleState::Ready,
            3 => LifecycleState::ShuttingDown,
            4 => LifecycleState::Failed,
            _ => LifecycleState::Initializing,
        }
    }
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Initializing => "INITIALIZING",
            LifecycleState::Connecting => "CONNECTING",
            LifecycleState::Ready => "READY",
            LifecycleState::ShuttingDown => "SHUTTING_DOWN",
            LifecycleState::Failed => "FAILED",
        }
    }

    /// No further transitions leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::ShuttingDown | LifecycleState::Failed)
    }

    /// Look up the transition table. `None` means the pair is illegal.
    pub fn next(self, event: LifecycleEvent) -> Option<LifecycleState> {
        use LifecycleEvent::*;
        use LifecycleState::*;

        match (self, event) {
            (Initializing, StartRequested) => Some(Connecting),
            (Connecting, AttemptFailed) => Some(Connecting),
            (Connecting, DependencyReady) => Some(Ready),
            (Connecting, RetriesExhausted) => Some(Failed),
            (Connecting, Cancelled) => Some(Failed),
            (Connecting, ListenerFailed) => Some(Failed),
            (Ready, ShutdownRequested) => Some(ShuttingDown),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    StartRequested,
    AttemptFailed,
    DependencyReady,
    RetriesExhausted,
    Cancelled,
    ListenerFailed,
    ShutdownRequested,
}

/// Rejected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal lifecycle transition: {event:?} in state {from}")]
pub struct IllegalTransition {
    pub from: LifecycleState,
    pub event: LifecycleEvent,
}

/// The single state variable owned by a gate.
#[derive(Debug)]
pub struct StateCell {
    current: AtomicU8,
    history: Mutex<Vec<LifecycleState>>,
    changes: watch::Sender<LifecycleState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(LifecycleState::Initializing);
        metrics::record_state(LifecycleState::Initializing);
        Self {
            current: AtomicU8::new(LifecycleState::Initializing as u8),
            history: Mutex::new(vec![LifecycleState::Initializing]),
            changes,
        }
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from(self.current.load(Ordering::SeqCst))
    }

    /// Apply `event` atomically against whatever the current state is.
    pub fn apply(&self, event: LifecycleEvent) -> Result<LifecycleState, IllegalTransition> {
        let mut from = self.get();
        loop {
            let next = from.next(event).ok_or(IllegalTransition { from, event })?;

            match self.current.compare_exchange(
                from as u8,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.history
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(next);
                    self.changes.send_replace(next);
                    metrics::record_transition(from, next);
                    tracing::debug!(from = %from, to = %next, ?event, "Lifecycle transition");
                    return Ok(next);
                }
                Err(actual) => from = LifecycleState::from(actual),
            }
        }
    }

    /// States entered so far, oldest first.
    pub fn history(&self) -> Vec<LifecycleState> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver that observes the latest state.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.changes.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
