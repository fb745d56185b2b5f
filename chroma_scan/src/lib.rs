//! # chroma_scan
//!
//! Frame analysis for the cam_chroma colour instrument.  Everything in this
//! crate is pure computation on in-memory buffers:
//!
//! * [`frame`]    — RGB/HSV frame types, flip/crop transforms, crop picker.
//! * [`classify`] — per-colour HSV band masks with morphological cleanup.
//! * [`scanline`] — one classified column → per-note on/off decisions.
//! * [`progress`] — sweep progress and sampled-column arithmetic.
//!
//! Camera acquisition, MIDI output and windowing live in the sibling crates;
//! this one never touches a device, which is what keeps it testable with
//! synthetic frames.

pub mod classify;
pub mod frame;
pub mod progress;
pub mod scanline;

pub use classify::{classify, flatten, ColorConfig, ColorSet, Mask};
pub use frame::{CropPicker, CropRect, Flip, HsvFrame, RgbFrame};
pub use scanline::{map_column, NoteDecision};

use thiserror::Error;

/// Errors raised while validating colour configurations or frame geometry.
#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    #[error("colour class index 0 is reserved for \"no class\"")]
    ReservedIndex,
    #[error("colour class index {0} is used by more than one colour")]
    DuplicateIndex(u8),
    #[error("{field} must lie in [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f32 },
    #[error("crop rectangle has zero area")]
    EmptyCrop,
}
