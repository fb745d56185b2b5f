//! MIDI output port abstraction.
//!
//! Channels write through the [`MidiOut`] trait so the engine can run
//! against a real midir connection, a null sink (development without a
//! synthesizer), or a capturing sink (tests).  All sends are non-blocking
//! writes to a local port; a failed send is logged and dropped, never
//! propagated into the frame loop.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::error::{MusicError, Result};

// ════════════════════════════════════════════════════════════════════════════
// MidiOut trait
// ════════════════════════════════════════════════════════════════════════════

/// One MIDI message kind per method; wire encoding is the standard status
/// byte layout.
pub trait MidiOut: Send {
    fn program_change(&mut self, channel: u8, program: u8);
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8, velocity: u8);
    fn control_change(&mut self, channel: u8, controller: u8, value: u8);
    /// `value` is the 14-bit pitch-wheel position (0..=0x3FFF, centre 0x2000).
    fn pitchwheel(&mut self, channel: u8, value: u16);
    /// Channel pressure.
    fn aftertouch(&mut self, channel: u8, value: u8);
}

/// A port handle shared by every channel multiplexed onto it.  The mutex
/// serialises writes: the underlying connection is one byte stream.
pub type SharedPort = Arc<Mutex<Box<dyn MidiOut>>>;

/// Wrap a backend in a [`SharedPort`].
pub fn shared<P: MidiOut + 'static>(port: P) -> SharedPort {
    Arc::new(Mutex::new(Box::new(port)))
}

// ════════════════════════════════════════════════════════════════════════════
// midir backend
// ════════════════════════════════════════════════════════════════════════════

pub struct MidirPort {
    conn: midir::MidiOutputConnection,
}

impl MidirPort {
    fn send(&mut self, msg: &[u8]) {
        if let Err(e) = self.conn.send(msg) {
            warn!("MIDI send failed: {e}");
        }
    }
}

impl MidiOut for MidirPort {
    fn program_change(&mut self, channel: u8, program: u8) {
        self.send(&[0xC0 | (channel & 0x0F), program & 0x7F]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
    }
    fn note_off(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send(&[0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
    }
    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        self.send(&[0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]);
    }
    fn pitchwheel(&mut self, channel: u8, value: u16) {
        let value = value.min(0x3FFF);
        self.send(&[
            0xE0 | (channel & 0x0F),
            (value & 0x7F) as u8,
            (value >> 7) as u8,
        ]);
    }
    fn aftertouch(&mut self, channel: u8, value: u8) {
        self.send(&[0xD0 | (channel & 0x0F), value & 0x7F]);
    }
}

/// Open the first output port whose name starts with `query` (the part
/// before any `:` suffix the backend appends).
///
/// No match is fatal to startup: the caller must not proceed into the
/// frame loop against a port that is not there.
pub fn open_named_port(query: &str) -> Result<SharedPort> {
    let midi_out = midir::MidiOutput::new("cam_chroma")?;

    let ports = midi_out.ports();
    let port = ports
        .iter()
        .find(|p| {
            midi_out
                .port_name(p)
                .map(|name| name.split(':').next().unwrap_or(&name) == query)
                .unwrap_or(false)
        })
        .ok_or_else(|| MusicError::PortNotFound(query.to_string()))?;

    let name = midi_out
        .port_name(port)
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!("opening MIDI port: {name}");

    let conn = midi_out
        .connect(port, "cam_chroma-out")
        .map_err(|e| MusicError::Connect(e.to_string()))?;

    Ok(shared(MidirPort { conn }))
}

// ════════════════════════════════════════════════════════════════════════════
// Null backend
// ════════════════════════════════════════════════════════════════════════════

/// Discards everything.  Used with `--silent` when no synthesizer is up.
pub struct NullPort;

impl MidiOut for NullPort {
    fn program_change(&mut self, _ch: u8, _p: u8) {}
    fn note_on(&mut self, _ch: u8, _n: u8, _v: u8) {}
    fn note_off(&mut self, _ch: u8, _n: u8, _v: u8) {}
    fn control_change(&mut self, _ch: u8, _c: u8, _v: u8) {}
    fn pitchwheel(&mut self, _ch: u8, _v: u16) {}
    fn aftertouch(&mut self, _ch: u8, _v: u8) {}
}

// ════════════════════════════════════════════════════════════════════════════
// Capture backend
// ════════════════════════════════════════════════════════════════════════════

/// Records every message as raw bytes.  The channel and engine tests
/// assert on the captured traffic.
#[derive(Default)]
pub struct CapturePort {
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CapturePort {
    pub fn new() -> (CapturePort, Arc<Mutex<Vec<Vec<u8>>>>) {
        let messages = Arc::new(Mutex::new(Vec::new()));
        (CapturePort { messages: messages.clone() }, messages)
    }

    fn push(&mut self, msg: Vec<u8>) {
        self.messages.lock().unwrap().push(msg);
    }
}

impl MidiOut for CapturePort {
    fn program_change(&mut self, channel: u8, program: u8) {
        self.push(vec![0xC0 | channel, program]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.push(vec![0x90 | channel, note, velocity]);
    }
    fn note_off(&mut self, channel: u8, note: u8, velocity: u8) {
        self.push(vec![0x80 | channel, note, velocity]);
    }
    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        self.push(vec![0xB0 | channel, controller, value]);
    }
    fn pitchwheel(&mut self, channel: u8, value: u16) {
        self.push(vec![
            0xE0 | channel,
            (value & 0x7F) as u8,
            (value >> 7) as u8,
        ]);
    }
    fn aftertouch(&mut self, channel: u8, value: u8) {
        self.push(vec![0xD0 | channel, value]);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_status_bytes() {
        let (mut port, log) = CapturePort::new();
        port.note_on(2, 60, 90);
        port.note_off(2, 60, 90);
        port.control_change(0, 64, 127);
        port.aftertouch(1, 33);
        let msgs = log.lock().unwrap();
        assert_eq!(msgs[0], vec![0x92, 60, 90]);
        assert_eq!(msgs[1], vec![0x82, 60, 90]);
        assert_eq!(msgs[2], vec![0xB0, 64, 127]);
        assert_eq!(msgs[3], vec![0xD1, 33]);
    }

    #[test]
    fn pitchwheel_splits_lsb_msb() {
        let (mut port, log) = CapturePort::new();
        port.pitchwheel(0, 0x2000);
        assert_eq!(log.lock().unwrap()[0], vec![0xE0, 0x00, 0x40]);
    }

    #[test]
    fn shared_port_serialises_writers() {
        let (port, log) = CapturePort::new();
        let shared = shared(port);
        let mut handles = Vec::new();
        for ch in 0..4u8 {
            let shared = shared.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    shared.lock().unwrap().note_on(ch, 60, 64);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.lock().unwrap().len(), 200);
    }
}
