//! Listener lifecycle state shared between the controller and its worker.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Listener lifecycle state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerState {
    /// Constructed but never started (e.g. editor context).
    #[default]
    Idle,
    /// Background thread spawned, native resources not yet acquired.
    Starting,
    /// Native resources acquired, event loop active.
    Running,
    /// Stop requested, waiting for the worker to observe it.
    StopRequested,
    /// Worker joined and native resources released.
    Stopped,
    /// Native resource acquisition failed; inert for the process lifetime.
    FailedInit,
}

impl ListenerState {
    fn to_u8(self) -> u8 {
        match self {
            ListenerState::Idle => 0,
            ListenerState::Starting => 1,
            ListenerState::Running => 2,
            ListenerState::StopRequested => 3,
            ListenerState::Stopped => 4,
            ListenerState::FailedInit => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ListenerState::Starting,
            2 => ListenerState::Running,
            3 => ListenerState::StopRequested,
            4 => ListenerState::Stopped,
            5 => ListenerState::FailedInit,
            _ => ListenerState::Idle,
        }
    }
}

/// Atomic running flag carrying the full [`ListenerState`].
///
/// Native loops poll [`RunFlag::is_running`]; it is true only while
/// `Starting` or `Running`.
#[derive(Debug, Default)]
pub struct RunFlag {
    state: AtomicU8,
}

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            ListenerState::Starting | ListenerState::Running
        )
    }

    /// `Idle → Starting`. A listener is started at most once.
    pub fn begin_start(&self) -> bool {
        self.transition(&[ListenerState::Idle], ListenerState::Starting)
    }

    /// `Starting → Running`, once native resources are acquired.
    pub fn mark_running(&self) -> bool {
        self.transition(&[ListenerState::Starting], ListenerState::Running)
    }

    /// `Starting|Running → StopRequested`. No-op otherwise.
    pub fn request_stop(&self) -> bool {
        self.transition(
            &[ListenerState::Starting, ListenerState::Running],
            ListenerState::StopRequested,
        )
    }

    /// Worker exit after a clean loop: any live state becomes `Stopped`.
    pub fn mark_stopped(&self) -> bool {
        self.transition(
            &[
                ListenerState::Starting,
                ListenerState::Running,
                ListenerState::StopRequested,
            ],
            ListenerState::Stopped,
        )
    }

    /// Acquisition failure. Absorbing: nothing leaves `FailedInit`.
    pub fn mark_failed(&self) {
        self.state
            .store(ListenerState::FailedInit.to_u8(), Ordering::SeqCst);
    }

    fn transition(&self, from: &[ListenerState], to: ListenerState) -> bool {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if !from.contains(&ListenerState::from_u8(current)) {
                return false;
            }
            match self.state.compare_exchange(
                current,
                to.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
