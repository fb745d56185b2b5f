//! The engine thread: capture → classify → scan → dispatch.
//!
//! One iteration per captured frame.  The engine reads the tuning once per
//! frame (a torn read across one frame is corrected on the next), holds the
//! ensemble lock only while dispatching, and publishes the processed frame
//! for the monitor window to paint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use thiserror::Error;

use chroma_midi::{Ensemble, MusicError};
use chroma_scan::progress::{column_index, progress};
use chroma_scan::scanline::NoteDecision;
use chroma_scan::{classify, flatten, map_column};
use chroma_scan::{classify::column, ColorSet, CropRect, Flip, HsvFrame, RgbFrame};

use crate::source::{FrameSource, SourceError};

/// Frame pacing between engine iterations.
const TICK: Duration = Duration::from_millis(33);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Music(#[from] MusicError),
}

// ════════════════════════════════════════════════════════════════════════════
// Shared state
// ════════════════════════════════════════════════════════════════════════════

/// Operator-adjustable frame transforms, owned by the UI thread and read
/// once per frame by the engine.
#[derive(Clone, Copy, Debug)]
pub struct Tuning {
    pub flip: Flip,
    pub crop: Option<CropRect>,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning { flip: Flip::None, crop: None }
    }
}

/// Everything the two threads exchange.
pub struct Shared {
    pub tuning:   Mutex<Tuning>,
    pub ensemble: Mutex<Ensemble>,
    /// Latest processed frame, for the monitor window.
    pub monitor:  Mutex<Option<MonitorFrame>>,
    pub stop:     AtomicBool,
}

impl Shared {
    pub fn new(ensemble: Ensemble, tuning: Tuning) -> Arc<Shared> {
        Arc::new(Shared {
            tuning:   Mutex::new(tuning),
            ensemble: Mutex::new(ensemble),
            monitor:  Mutex::new(None),
            stop:     AtomicBool::new(false),
        })
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// What the monitor paints: the processed frame's brightness plane, the
/// class-id plane with each class's display colour, and the sampled column.
pub struct MonitorFrame {
    pub width:     usize,
    pub height:    usize,
    pub gray:      Vec<u8>,
    pub class_ids: Vec<u8>,
    pub column:    usize,
    pub displays:  Vec<(u8, [u8; 3])>,
}

// ════════════════════════════════════════════════════════════════════════════
// Per-frame analysis
// ════════════════════════════════════════════════════════════════════════════

/// Result of analysing one frame, before any MIDI is sent.
pub struct Processed {
    pub width:     usize,
    pub height:    usize,
    pub gray:      Vec<u8>,
    pub class_ids: Vec<u8>,
    /// Sampled column for this frame's sweep position.
    pub column:    usize,
}

/// Flip, crop, convert, classify, and locate the sweep column.
pub fn process_frame(
    raw: &RgbFrame,
    tuning: &Tuning,
    colors: &ColorSet,
    elapsed: f64,
    period: f64,
) -> Processed {
    let flipped = raw.flipped(tuning.flip);
    let frame = match &tuning.crop {
        Some(rect) => flipped.cropped(rect),
        None => flipped,
    };

    let hsv = HsvFrame::from_rgb(&frame);
    let masks = classify(&hsv, colors);
    let class_ids = flatten(&masks, frame.width, frame.height);
    let gray = hsv.v.iter().map(|v| (v * 255.0) as u8).collect();

    Processed {
        width:  frame.width,
        height: frame.height,
        gray,
        class_ids,
        column: column_index(progress(elapsed, period), frame.width),
    }
}

/// Drive every voice from the sampled column.  `now` is stamped once per
/// frame so all transitions in one frame share a timestamp.
pub fn dispatch(
    processed: &Processed,
    colors: &ColorSet,
    ensemble: &mut Ensemble,
    now: Instant,
) -> Result<(), MusicError> {
    // A crop clamped down to nothing yields an empty column, which maps
    // every span to Off.
    let col = if processed.width == 0 || processed.height == 0 {
        Vec::new()
    } else {
        column(
            &processed.class_ids,
            processed.width,
            processed.height,
            processed.column,
        )
    };

    for (name, config) in colors.entries() {
        let channel = ensemble.channel_mut(name)?;
        let decisions = map_column(&col, config.index, channel.note_count());
        for (i, decision) in decisions.iter().enumerate() {
            match decision {
                NoteDecision::On { intensity } => channel.note_on_at(i, *intensity, now)?,
                NoteDecision::Off => channel.note_off_at(i, now)?,
            }
        }
    }
    Ok(())
}

fn monitor_frame(processed: Processed, colors: &ColorSet) -> MonitorFrame {
    MonitorFrame {
        width:     processed.width,
        height:    processed.height,
        gray:      processed.gray,
        class_ids: processed.class_ids,
        column:    processed.column,
        displays:  colors
            .entries()
            .iter()
            .map(|(_, c)| (c.index, c.display))
            .collect(),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Engine thread
// ════════════════════════════════════════════════════════════════════════════

/// Spawn the engine over `source`.  It runs until the stop flag is set or
/// the source reports device loss; sounding notes are released on every
/// exit path.
pub fn spawn(
    source: Box<dyn FrameSource>,
    colors: ColorSet,
    shared: Arc<Shared>,
) -> thread::JoinHandle<Result<(), EngineError>> {
    thread::spawn(move || {
        let result = pump(source, &colors, &shared);
        shared.ensemble.lock().unwrap().silence();
        if let Err(ref e) = result {
            error!("engine stopped: {e}");
        } else {
            info!("engine stopped");
        }
        result
    })
}

fn pump(
    mut source: Box<dyn FrameSource>,
    colors: &ColorSet,
    shared: &Shared,
) -> Result<(), EngineError> {
    let mut elapsed = 0.0f64;
    let mut last = Instant::now();

    while !shared.stop.load(Ordering::Relaxed) {
        let frame = match source.grab() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("empty capture, skipping tick");
                thread::sleep(TICK);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let now = Instant::now();
        elapsed += now.duration_since(last).as_secs_f64();
        last = now;

        let tuning = *shared.tuning.lock().unwrap();
        let period = shared.ensemble.lock().unwrap().period();
        let processed = process_frame(&frame, &tuning, colors, elapsed, period);

        dispatch(&processed, colors, &mut shared.ensemble.lock().unwrap(), now)?;
        *shared.monitor.lock().unwrap() = Some(monitor_frame(processed, colors));

        thread::sleep(TICK);
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_midi::{shared as shared_port, CapturePort, InstrumentChannel};
    use chroma_scan::ColorConfig;

    fn red_set() -> ColorSet {
        // Band start just below the hue seam: pure red (hue 0) must still
        // fall inside the wrapping band.
        let red = ColorConfig::new(1, [255, 0, 0], 0.95).unwrap();
        ColorSet::new(vec![("red".to_string(), red)]).unwrap()
    }

    /// 40x300 frame, red across the top 95 rows.
    fn red_top_band() -> RgbFrame {
        let mut f = RgbFrame::new(40, 300);
        for y in 0..95 {
            for x in 0..40 {
                f.set_pixel(x, y, [255, 0, 0]);
            }
        }
        f
    }

    fn six_note_ensemble() -> (Ensemble, std::sync::Arc<Mutex<Vec<Vec<u8>>>>) {
        let (port, log) = CapturePort::new();
        let scale = vec![60, 62, 64, 65, 67, 69];
        let mut ens = Ensemble::new();
        ens.add_channel("red", InstrumentChannel::with_scale(shared_port(port), 0, scale));
        (ens, log)
    }

    fn settled() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn top_band_lights_the_first_two_of_six_notes() {
        let colors = red_set();
        let (mut ens, log) = six_note_ensemble();

        // elapsed 1s of a 3s period: a third of the way across, column 13.
        let processed = process_frame(&red_top_band(), &Tuning::default(), &colors, 1.0, 3.0);
        assert_eq!(processed.column, 13);
        dispatch(&processed, &colors, &mut ens, settled()).unwrap();

        let msgs = log.lock().unwrap();
        let ons: Vec<u8> = msgs
            .iter()
            .filter(|m| m[0] & 0xF0 == 0x90)
            .map(|m| m[1])
            .collect();
        assert_eq!(ons, [60, 62]);
        // The other four notes were already off: no note-off traffic.
        assert!(!msgs.iter().any(|m| m[0] & 0xF0 == 0x80));
    }

    #[test]
    fn repeated_frames_do_not_repeat_notes() {
        let colors = red_set();
        let (mut ens, log) = six_note_ensemble();
        let processed = process_frame(&red_top_band(), &Tuning::default(), &colors, 1.0, 3.0);

        let now = settled();
        dispatch(&processed, &colors, &mut ens, now).unwrap();
        dispatch(&processed, &colors, &mut ens, now + Duration::from_millis(1)).unwrap();

        let msgs = log.lock().unwrap();
        assert_eq!(msgs.iter().filter(|m| m[0] & 0xF0 == 0x90).count(), 2);
    }

    #[test]
    fn blank_frame_releases_sounding_notes() {
        let colors = red_set();
        let (mut ens, log) = six_note_ensemble();
        let now = settled();

        let lit = process_frame(&red_top_band(), &Tuning::default(), &colors, 1.0, 3.0);
        dispatch(&lit, &colors, &mut ens, now).unwrap();

        let blank = process_frame(&RgbFrame::new(40, 300), &Tuning::default(), &colors, 1.0, 3.0);
        dispatch(&blank, &colors, &mut ens, now + Duration::from_millis(200)).unwrap();

        let msgs = log.lock().unwrap();
        let offs: Vec<u8> = msgs
            .iter()
            .filter(|m| m[0] & 0xF0 == 0x80)
            .map(|m| m[1])
            .collect();
        assert_eq!(offs, [60, 62]);
    }

    #[test]
    fn crop_excludes_colour_outside_the_rectangle() {
        let colors = red_set();
        // Red only in the right half.
        let mut frame = RgbFrame::new(100, 100);
        for y in 0..100 {
            for x in 50..100 {
                frame.set_pixel(x, y, [255, 0, 0]);
            }
        }
        let tuning = Tuning {
            flip: Flip::None,
            crop: Some(CropRect::from_corners((0, 0), (50, 100)).unwrap()),
        };
        let processed = process_frame(&frame, &tuning, &colors, 0.0, 3.0);
        assert_eq!((processed.width, processed.height), (50, 100));
        assert!(processed.class_ids.iter().all(|&c| c == 0));
    }

    #[test]
    fn sweep_column_matches_the_reference_arithmetic() {
        let colors = red_set();
        let frame = RgbFrame::new(424, 10);
        let processed = process_frame(&frame, &Tuning::default(), &colors, 7.0, 3.0);
        assert_eq!(processed.column, 141);
    }

    /// Yields a frame only every other call, like a camera having a bad
    /// moment.
    struct FlakySource {
        calls: u32,
    }

    impl crate::source::FrameSource for FlakySource {
        fn dimensions(&self) -> (usize, usize) {
            (8, 8)
        }
        fn grab(&mut self) -> Result<Option<RgbFrame>, crate::source::SourceError> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                Ok(None)
            } else {
                Ok(Some(RgbFrame::new(8, 8)))
            }
        }
    }

    #[test]
    fn transient_empty_captures_do_not_stop_the_engine() {
        let colors = red_set();
        let (ens, _log) = six_note_ensemble();
        let shared = Shared::new(ens, Tuning::default());

        let handle = spawn(Box::new(FlakySource { calls: 0 }), colors, shared.clone());
        thread::sleep(Duration::from_millis(200));
        // Still pumping: empty reads were skipped, not treated as loss.
        assert!(!handle.is_finished());
        assert!(shared.monitor.lock().unwrap().is_some());

        shared.request_stop();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn stop_flag_ends_the_engine() {
        use crate::source::SyntheticSource;
        let colors = red_set();
        let (ens, _log) = six_note_ensemble();
        let shared = Shared::new(ens, Tuning::default());

        let source = Box::new(SyntheticSource::new(32, 24, vec![[255, 0, 0]]));
        let handle = spawn(source, colors, shared.clone());
        thread::sleep(Duration::from_millis(120));
        shared.request_stop();
        assert!(handle.join().unwrap().is_ok());
        // The engine published at least one monitor frame before exiting.
        assert!(shared.monitor.lock().unwrap().is_some());
    }
}
