//! # cam_chroma
//!
//! The application crate of the colour instrument.  A camera (or the
//! synthetic source) produces frames, `chroma_scan` classifies them, a
//! sweep line crosses the frame once per period, and each configured
//! colour's presence along the sampled column drives its own
//! `chroma_midi` instrument channel.
//!
//! * [`config`]     — the JSON configuration file and what it builds.
//! * [`source`]     — frame sources: synthetic always, camera feature-gated.
//! * [`engine`]     — the capture→classify→scan→dispatch thread.
//! * [`visualizer`] — the minifb monitor window and its tuning controls.

pub mod config;
pub mod engine;
pub mod source;
pub mod visualizer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("music engine: {0}")]
    Music(#[from] chroma_midi::MusicError),
    #[error("frame source: {0}")]
    Source(#[from] source::SourceError),
    #[error(transparent)]
    Engine(#[from] engine::EngineError),
    #[error("monitor window: {0}")]
    Window(String),
}
