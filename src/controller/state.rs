//! Playback state tracking
//!
//! This module defines the playback lifecycle states, the legal
//! transitions between them, and a tracker that applies transitions
//! while remembering the previous state.

use log::{debug, warn};
use parking_lot::RwLock;

/// Playback lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// No media source has been submitted yet
    Idle,

    /// A prepare request was submitted and the engine is working on it
    Initializing,

    /// The engine signalled readiness
    Prepared,

    /// Playback is running
    Playing,

    /// Playback is suspended but can resume
    Paused,

    /// Playback was halted
    Stopped,

    /// The engine was torn down
    Released,

    /// A fault was reported
    Error,
}

impl PlaybackState {
    /// Whether a transition from this state to `next` is legal
    ///
    /// Error, Released, and Initializing are reachable from anywhere:
    /// faults can strike at any time, teardown is always allowed, and a
    /// new prepare restarts the lifecycle. Idle is only ever the starting
    /// point.
    pub fn can_transition_to(self, next: PlaybackState) -> bool {
        if self == next {
            return true;
        }

        match next {
            PlaybackState::Error | PlaybackState::Released | PlaybackState::Initializing => true,
            PlaybackState::Prepared => self == PlaybackState::Initializing,
            PlaybackState::Playing => matches!(
                self,
                PlaybackState::Prepared | PlaybackState::Paused | PlaybackState::Stopped
            ),
            PlaybackState::Paused => self == PlaybackState::Playing,
            PlaybackState::Stopped => matches!(
                self,
                PlaybackState::Prepared | PlaybackState::Playing | PlaybackState::Paused
            ),
            PlaybackState::Idle => false,
        }
    }
}

/// Tracks the current and previous playback state
///
/// All transitions go through [`StateTracker::advance`], which rejects
/// illegal ones. The previous state is only updated on an actual change,
/// so repeated transitions to the same state keep it meaningful.
pub(crate) struct StateTracker {
    slots: RwLock<StateSlots>,
}

#[derive(Debug, Clone, Copy)]
struct StateSlots {
    current: PlaybackState,
    last: PlaybackState,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(StateSlots {
                current: PlaybackState::Idle,
                last: PlaybackState::Idle,
            }),
        }
    }

    /// Current playback state
    pub fn current(&self) -> PlaybackState {
        self.slots.read().current
    }

    /// State before the most recent change
    pub fn last(&self) -> PlaybackState {
        self.slots.read().last
    }

    /// Apply a transition if it is legal
    ///
    /// # Returns
    /// * `true` if the transition was applied (or was a no-op)
    /// * `false` if it was rejected as illegal
    pub fn advance(&self, next: PlaybackState) -> bool {
        let mut slots = self.slots.write();

        if !slots.current.can_transition_to(next) {
            warn!(
                "Rejected state transition {:?} -> {:?}",
                slots.current, next
            );
            return false;
        }

        if slots.current != next {
            debug!("Playback state {:?} -> {:?}", slots.current, next);
            slots.last = slots.current;
            slots.current = next;
        }

        true
    }
}
