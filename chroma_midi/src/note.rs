//! Per-note debounced state machine.
//!
//! Raw per-frame classification is noisy at mask edges; without a minimum
//! hold between transitions a note would chatter on and off many times per
//! second.  Each note debounces independently — there is no cross-note
//! coordination.

use std::time::{Duration, Instant};

// ════════════════════════════════════════════════════════════════════════════
// NoteState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState {
    On,
    Off,
}

// ════════════════════════════════════════════════════════════════════════════
// NoteSlot
// ════════════════════════════════════════════════════════════════════════════

/// One scale step of a channel: its MIDI note number, last-known state, and
/// the time of the last accepted transition.
///
/// Created at channel construction and mutated only through
/// [`NoteSlot::transition`]; suppressed transitions are dropped, not
/// queued.  A fresh slot has no transition on record, so its first
/// transition is never debounce-suppressed.
#[derive(Clone, Debug)]
pub struct NoteSlot {
    number:      u8,
    state:       NoteState,
    last_change: Option<Instant>,
}

impl NoteSlot {
    pub fn new(number: u8) -> NoteSlot {
        NoteSlot {
            number,
            state: NoteState::Off,
            last_change: None,
        }
    }

    /// MIDI note number of this slot.
    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    /// Attempt a state transition at `now`.
    ///
    /// Returns true — and updates state and timestamp — iff `target`
    /// differs from the current state and at least `min_hold` has passed
    /// since the last accepted transition.  Anything else is a silent
    /// no-op: a same-state call never emits regardless of timing, and a
    /// too-early opposite call is dropped.
    pub fn transition(&mut self, target: NoteState, now: Instant, min_hold: Duration) -> bool {
        if self.state == target {
            return false;
        }
        if let Some(last) = self.last_change {
            if now.duration_since(last) < min_hold {
                return false;
            }
        }
        self.state = target;
        self.last_change = Some(now);
        true
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
