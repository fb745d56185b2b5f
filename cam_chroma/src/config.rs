//! The JSON configuration file: one record per colour voice, plus the MIDI
//! port query, the sweep period, and the camera section.
//!
//! Voices are kept in name order everywhere — class ids and MIDI channel
//! numbers are assigned by position in that order, so a given file always
//! produces the same wiring.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::warn;
use serde::Deserialize;
use thiserror::Error;

use chroma_midi::ensemble::DEFAULT_PERIOD;
use chroma_midi::{Ensemble, InstrumentChannel, MusicError, SharedPort};
use chroma_midi::{DEFAULT_DEBOUNCE, DEFAULT_SCALE};
use chroma_scan::classify::{DEFAULT_HUE_WIDTH, DEFAULT_SV_MIN};
use chroma_scan::{ColorConfig, ColorSet, CropRect, Flip, ScanError};

// ── effect controller numbers ────────────────────────────────────────────

const CC_SUSTAIN:   u8 = 64;
const CC_SOSTENUTO: u8 = 66;
const CC_REVERB:    u8 = 91;
const CC_CHORUS:    u8 = 93;

// ════════════════════════════════════════════════════════════════════════════
// ConfigError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path:   String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("colour {name:?}: {source}")]
    Color {
        name:   String,
        #[source]
        source: ScanError,
    },
    #[error(transparent)]
    Music(#[from] MusicError),
    #[error("no voices configured")]
    NoVoices,
    #[error("{0} voices configured; class ids are 8-bit, at most 255 are supported")]
    TooManyVoices(usize),
}

// ════════════════════════════════════════════════════════════════════════════
// Config
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// MIDI output port name prefix to search for.
    #[serde(default = "default_port")]
    pub port:     String,
    /// Full-sweep period in seconds.
    #[serde(default = "default_period")]
    pub period:   f64,
    /// Minimum hold between note transitions, in seconds.
    #[serde(default = "default_debounce")]
    pub debounce: f64,
    #[serde(default)]
    pub camera:   CameraConfig,
    /// Voice name → colour band and channel programming.
    pub voices:   BTreeMap<String, VoiceConfig>,
}

fn default_port() -> String {
    "FLUID Synth".to_string()
}
fn default_period() -> f64 {
    DEFAULT_PERIOD
}
fn default_debounce() -> f64 {
    DEFAULT_DEBOUNCE
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub source: u32,
    #[serde(default = "default_width")]
    pub width:  usize,
    #[serde(default = "default_height")]
    pub height: usize,
    /// 0 = none, 1 = mirror, 2 = vertical.
    #[serde(default)]
    pub flip:   i32,
    /// `[x0, y0, x1, y1]`, frame pixels.
    #[serde(default)]
    pub crop:   Option<[usize; 4]>,
}

fn default_width() -> usize {
    640
}
fn default_height() -> usize {
    480
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            source: 0,
            width:  default_width(),
            height: default_height(),
            flip:   0,
            crop:   None,
        }
    }
}

impl CameraConfig {
    pub fn flip(&self) -> Flip {
        Flip::from_code(self.flip)
    }

    /// The configured crop, if any.  A degenerate rectangle is dropped
    /// with a warning rather than blanking every frame.
    pub fn crop(&self) -> Option<CropRect> {
        let [x0, y0, x1, y1] = self.crop?;
        match CropRect::from_corners((x0, y0), (x1, y1)) {
            Ok(rect) => Some(rect),
            Err(e) => {
                warn!("ignoring configured crop {:?}: {e}", self.crop);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// Overlay display colour, RGB.
    pub display: [u8; 3],
    /// Band start hue in [0, 1).
    pub hue:     f32,
    #[serde(default = "default_hue_width")]
    pub hue_width: f32,
    #[serde(default = "default_sv_min")]
    pub sat_min: f32,
    #[serde(default = "default_sv_min")]
    pub val_min: f32,

    /// General MIDI program.
    #[serde(default)]
    pub program:   u8,
    #[serde(default = "default_volume")]
    pub volume:    f32,
    #[serde(default)]
    pub pitch:     f32,
    #[serde(default)]
    pub polytouch: f32,
    #[serde(default)]
    pub reverb:    Option<f32>,
    #[serde(default)]
    pub chorus:    Option<f32>,
    #[serde(default)]
    pub sustain:   Option<f32>,
    #[serde(default)]
    pub sostenuto: Option<f32>,

    /// Ordered MIDI note numbers, bottom span first.
    #[serde(default)]
    pub scale:     Option<Vec<u8>>,
}

fn default_hue_width() -> f32 {
    DEFAULT_HUE_WIDTH
}
fn default_sv_min() -> f32 {
    DEFAULT_SV_MIN
}
fn default_volume() -> f32 {
    0.5
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        if config.voices.is_empty() {
            return Err(ConfigError::NoVoices);
        }
        // Class id 0 is reserved, leaving 255 usable ids.
        if config.voices.len() > u8::MAX as usize {
            return Err(ConfigError::TooManyVoices(config.voices.len()));
        }
        Ok(config)
    }

    /// Colour classes in voice-name order; class id is position + 1 so 0
    /// stays "no class".
    pub fn color_set(&self) -> Result<ColorSet, ConfigError> {
        let entries = self
            .voices
            .iter()
            .enumerate()
            .map(|(i, (name, voice))| {
                let config = ColorConfig {
                    index:     (i + 1) as u8,
                    display:   voice.display,
                    hue:       voice.hue,
                    hue_width: voice.hue_width,
                    sat_min:   voice.sat_min,
                    val_min:   voice.val_min,
                }
                .validated()
                .map_err(|source| ConfigError::Color {
                    name: name.clone(),
                    source,
                })?;
                Ok((name.clone(), config))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        ColorSet::new(entries).map_err(|source| ConfigError::Color {
            name: "<set>".to_string(),
            source,
        })
    }

    /// Build the ensemble on `port`: one channel per voice in name order,
    /// each programmed to its configured starting state so the synthesizer
    /// is never left at whatever the previous session set.
    pub fn build_ensemble(&self, port: SharedPort) -> Result<Ensemble, ConfigError> {
        let mut ensemble = Ensemble::new();
        ensemble.set_period(self.period)?;

        for (i, (name, voice)) in self.voices.iter().enumerate() {
            let scale = voice.scale.clone().unwrap_or_else(|| DEFAULT_SCALE.to_vec());
            let mut channel = InstrumentChannel::with_scale(port.clone(), i as u8, scale);
            channel.set_debounce(self.debounce);

            channel.change_program(voice.program);
            channel.set_volume(voice.volume);
            channel.set_pitch(voice.pitch);
            channel.set_polytouch(voice.polytouch);
            for (cc, level) in [
                (CC_SUSTAIN, voice.sustain),
                (CC_SOSTENUTO, voice.sostenuto),
                (CC_REVERB, voice.reverb),
                (CC_CHORUS, voice.chorus),
            ] {
                if let Some(level) = level {
                    channel.set_effect(cc, level);
                }
            }

            ensemble.add_channel(name.clone(), channel);
        }
        Ok(ensemble)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
