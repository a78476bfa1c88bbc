//! The monotonic warmup state machine.
//!
//! `Cold -> Warming -> Warm`, one step at a time and never backwards.
//! `Warming` starts when a consumer is attached; `Warm` only when the source
//! sends `snapshot_complete`. [`WarmupGate::wait_warm`] is the one blocking call in
//! the cache and always honours its timeout.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmupState {
    Cold,
    Warming,
    Warm,
}

impl WarmupState {
    /// The only state this one may move to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Cold => Some(Self::Warming),
            Self::Warming => Some(Self::Warm),
            Self::Warm => None,
        }
    }
}

/// Result of waiting for warmup. A timeout is an expected outcome, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupOutcome {
    Warm,
    TimedOut,
}

#[derive(Debug)]
pub struct WarmupGate {
    state: Mutex<WarmupState>,
    changed: Condvar,
    visited: Mutex<Vec<WarmupState>>,
}

impl Default for WarmupGate {
    fn default() -> Self {
        Self {
            state: Mutex::new(WarmupState::Cold),
            changed: Condvar::new(),
            visited: Mutex::new(vec![WarmupState::Cold]),
        }
    }
}

impl WarmupGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WarmupState {
        *self.state.lock()
    }

    /// Every state entered so far, in order, starting with `Cold`.
    pub fn history(&self) -> Vec<WarmupState> {
        self.visited.lock().clone()
    }

    /// Undo a `Cold -> Warming` step whose consumer never started.
    pub(crate) fn reset_warming(&self) {
        let mut state = self.state.lock();
        if *state == WarmupState::Warming {
            *state = WarmupState::Cold;
            self.visited.lock().pop();
        }
    }

    /// Move forward to `target`. Returns `false` (and changes nothing)
    /// unless `target` is the state directly after the current one.
    pub fn advance(&self, target: WarmupState) -> bool {
        let mut state = self.state.lock();
        if state.next() != Some(target) {
            return false;
        }
        tracing::debug!(from = ?*state, to = ?target, "warmup state change");
        *state = target;
        self.visited.lock().push(target);
        if target == WarmupState::Warm {
            self.changed.notify_all();
        }
        true
    }

    /// Block until `Warm` or until `timeout` elapses.
    pub fn wait_warm(&self, timeout: Duration) -> WarmupOutcome {
        let mut state = self.state.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while *state != WarmupState::Warm {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
            None => {
                while *state != WarmupState::Warm {
                    self.changed.wait(&mut state);
                }
            }
        }
        if *state == WarmupState::Warm {
            WarmupOutcome::Warm
        } else {
            WarmupOutcome::TimedOut
        }
    }
}
