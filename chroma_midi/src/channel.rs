//! One MIDI channel's expressive state and its debounced note dispatch.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::error::{MusicError, Result};
use crate::note::{NoteSlot, NoteState};
use crate::port::SharedPort;
use crate::{DEFAULT_DEBOUNCE, DEFAULT_SCALE};

/// Controller used for the colour-coverage intensity signal.  Expression
/// (CC 11) layers over channel volume (CC 7) instead of fighting it.
pub const EXPRESSION_CC: u8 = 11;
/// Controller for channel volume.
pub const VOLUME_CC: u8 = 7;

// ── scaling helpers ──────────────────────────────────────────────────────

fn to_7bit(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 127.0) as u8
}

fn to_14bit_signed(v: f32) -> u16 {
    (((v.clamp(-1.0, 1.0) + 1.0) / 2.0) * 0x3FFF as f32) as u16
}

fn expression_value(intensity: f32) -> u8 {
    (63.0 + intensity.clamp(0.0, 1.0) * 64.0).clamp(0.0, 127.0) as u8
}

// ════════════════════════════════════════════════════════════════════════════
// InstrumentChannel
// ════════════════════════════════════════════════════════════════════════════

/// Owns one MIDI channel for its whole lifetime: program, velocity, pitch
/// wheel, aftertouch, controller effects, and a fixed ordered scale of
/// debounced note slots.
///
/// Setters store the scaled value so getters reflect current state (within
/// 7-bit quantisation) and emit the corresponding message.  Note on/off go
/// through the per-slot debounce and re-send on every *accepted*
/// transition — downstream synthesizers may drop messages, so accepted
/// state changes are never deduplicated further.
pub struct InstrumentChannel {
    port:         SharedPort,
    midi_channel: u8,

    program:   u8,
    velocity:  u8,
    pitch:     u16,
    polytouch: u8,
    effects:   BTreeMap<u8, u8>,

    notes:    Vec<NoteSlot>,
    min_hold: Duration,
}

// Manual impl because `SharedPort` holds a `dyn MidiOut` with no `Debug`
// bound; the port is shown as opaque.
impl std::fmt::Debug for InstrumentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentChannel")
            .field("port", &"<SharedPort>")
            .field("midi_channel", &self.midi_channel)
            .field("program", &self.program)
            .field("velocity", &self.velocity)
            .field("pitch", &self.pitch)
            .field("polytouch", &self.polytouch)
            .field("effects", &self.effects)
            .field("notes", &self.notes)
            .field("min_hold", &self.min_hold)
            .finish()
    }
}

impl InstrumentChannel {
    /// A channel over `port` with the default scale and debounce.
    pub fn new(port: SharedPort, midi_channel: u8) -> InstrumentChannel {
        Self::with_scale(port, midi_channel, DEFAULT_SCALE.to_vec())
    }

    pub fn with_scale(port: SharedPort, midi_channel: u8, scale: Vec<u8>) -> InstrumentChannel {
        InstrumentChannel {
            port,
            midi_channel: midi_channel & 0x0F,
            program:   0,
            velocity:  to_7bit(0.5),
            pitch:     0x2000,
            polytouch: 0,
            effects:   BTreeMap::new(),
            notes:     scale.into_iter().map(NoteSlot::new).collect(),
            min_hold:  Duration::from_secs_f64(DEFAULT_DEBOUNCE),
        }
    }

    /// Minimum hold between note transitions.
    pub fn set_debounce(&mut self, seconds: f64) {
        self.min_hold = Duration::from_secs_f64(seconds.max(0.0));
    }

    // ── expressive state ─────────────────────────────────────────────────

    /// Always sends: changing instrument is rare and safe to repeat.
    pub fn change_program(&mut self, program: u8) {
        self.program = program & 0x7F;
        self.port
            .lock()
            .unwrap()
            .program_change(self.midi_channel, self.program);
    }

    /// Volume in `[0, 1]`, stored as the note-on velocity and sent as
    /// channel volume.
    pub fn set_volume(&mut self, volume: f32) {
        self.velocity = to_7bit(volume);
        self.port
            .lock()
            .unwrap()
            .control_change(self.midi_channel, VOLUME_CC, self.velocity);
    }

    /// Pitch-wheel position in `[-1, 1]`.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = to_14bit_signed(pitch);
        self.port
            .lock()
            .unwrap()
            .pitchwheel(self.midi_channel, self.pitch);
    }

    /// Channel pressure in `[0, 1]`.
    pub fn set_polytouch(&mut self, value: f32) {
        self.polytouch = to_7bit(value);
        self.port
            .lock()
            .unwrap()
            .aftertouch(self.midi_channel, self.polytouch);
    }

    /// Arbitrary continuous controller (sustain 64, sostenuto 66, reverb
    /// 91, chorus 93, ...), value in `[0, 1]`.
    pub fn set_effect(&mut self, controller: u8, value: f32) {
        let scaled = to_7bit(value);
        self.effects.insert(controller & 0x7F, scaled);
        self.port
            .lock()
            .unwrap()
            .control_change(self.midi_channel, controller & 0x7F, scaled);
    }

    // ── getters ──────────────────────────────────────────────────────────

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn volume(&self) -> f32 {
        self.velocity as f32 / 127.0
    }

    pub fn pitch(&self) -> f32 {
        (self.pitch as f32 / 0x3FFF as f32) * 2.0 - 1.0
    }

    pub fn polytouch(&self) -> f32 {
        self.polytouch as f32 / 127.0
    }

    pub fn effect(&self, controller: u8) -> Option<f32> {
        self.effects.get(&controller).map(|&v| v as f32 / 127.0)
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn note_state(&self, index: usize) -> Result<NoteState> {
        self.slot(index).map(NoteSlot::state)
    }

    // ── note dispatch ────────────────────────────────────────────────────

    /// Sound note `index`.  When `intensity` is nonzero an expression CC
    /// carrying the colour-coverage signal is sent first (every call, even
    /// if the note itself is debounced away); the note-on then goes
    /// through the slot's debounce at the current velocity.
    pub fn note_on(&mut self, index: usize, intensity: f32) -> Result<()> {
        self.note_on_at(index, intensity, Instant::now())
    }

    pub fn note_off(&mut self, index: usize) -> Result<()> {
        self.note_off_at(index, Instant::now())
    }

    /// [`note_on`](Self::note_on) with an explicit timestamp; the engine
    /// stamps one instant per frame and the tests drive time directly.
    pub fn note_on_at(&mut self, index: usize, intensity: f32, now: Instant) -> Result<()> {
        let len = self.notes.len();
        let slot = self
            .notes
            .get_mut(index)
            .ok_or(MusicError::NoteOutOfRange { index, len })?;

        if intensity > 0.0 {
            self.port.lock().unwrap().control_change(
                self.midi_channel,
                EXPRESSION_CC,
                expression_value(intensity),
            );
        }
        if slot.transition(NoteState::On, now, self.min_hold) {
            self.port
                .lock()
                .unwrap()
                .note_on(self.midi_channel, slot.number(), self.velocity);
        }
        Ok(())
    }

    pub fn note_off_at(&mut self, index: usize, now: Instant) -> Result<()> {
        let len = self.notes.len();
        let slot = self
            .notes
            .get_mut(index)
            .ok_or(MusicError::NoteOutOfRange { index, len })?;

        if slot.transition(NoteState::Off, now, self.min_hold) {
            self.port
                .lock()
                .unwrap()
                .note_off(self.midi_channel, slot.number(), self.velocity);
        }
        Ok(())
    }

    /// Force every sounding note off, ignoring the debounce window.  Used
    /// on shutdown so the synthesizer is not left holding notes.
    pub fn silence(&mut self) {
        let now = Instant::now() + self.min_hold;
        for i in 0..self.notes.len() {
            let _ = self.note_off_at(i, now);
        }
    }

    fn slot(&self, index: usize) -> Result<&NoteSlot> {
        self.notes.get(index).ok_or(MusicError::NoteOutOfRange {
            index,
            len: self.notes.len(),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
