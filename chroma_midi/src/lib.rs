//! # chroma_midi
//!
//! The stateful half of the colour instrument: per-note debounced state
//! machines ([`note`]), instrument channels that own one MIDI channel's
//! expressive state ([`channel`]), the named ensemble sharing a global
//! sweep period ([`ensemble`]), and the output-port abstraction they all
//! write through ([`port`]).
//!
//! Channels never block: every send is a fire-and-forget write to a local
//! port, serialised by a mutex because multiple channels multiplex one
//! byte-stream connection.  Redundant state (a note already on, a value
//! already current) is suppressed silently — that suppression is the point
//! of this crate, not an error.

pub mod channel;
pub mod ensemble;
pub mod error;
pub mod note;
pub mod port;

pub use channel::InstrumentChannel;
pub use ensemble::Ensemble;
pub use error::MusicError;
pub use note::{NoteSlot, NoteState};
pub use port::{open_named_port, shared, CapturePort, MidiOut, NullPort, SharedPort};

/// Default ordered note scale for a channel (C major degrees around C4).
pub const DEFAULT_SCALE: [u8; 7] = [60, 62, 64, 65, 67, 69, 71];

/// Default minimum hold between note state transitions, in seconds.
pub const DEFAULT_DEBOUNCE: f64 = 0.1;
