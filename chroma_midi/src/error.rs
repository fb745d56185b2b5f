//! Error taxonomy for the note engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MusicError {
    /// A note index outside the channel's configured scale.  Never
    /// silently creates a note.
    #[error("note index {index} outside the configured scale of {len} notes")]
    NoteOutOfRange { index: usize, len: usize },

    /// Ensemble lookup with a name no channel was configured under.
    #[error("no channel named {0:?} in the ensemble")]
    UnknownChannel(String),

    /// The sweep period must stay positive.
    #[error("period must be positive, got {0}")]
    InvalidPeriod(f64),

    /// No MIDI output port matched the configured name query.
    #[error("no MIDI output port matching {0:?}")]
    PortNotFound(String),

    /// The MIDI backend could not be initialised at all.
    #[error("MIDI backend init failed: {0}")]
    Init(#[from] midir::InitError),

    /// Connecting to an enumerated port failed.
    #[error("MIDI port connect failed: {0}")]
    Connect(String),
}

pub type Result<T> = std::result::Result<T, MusicError>;
