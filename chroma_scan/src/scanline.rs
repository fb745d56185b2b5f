//! Spatial-to-musical quantisation.
//!
//! One classified column (the vertical strip under the sweep line) is split
//! into `note_count` contiguous spans, one per scale step, so "an object is
//! present in this band of the frame" becomes "this note should sound"
//! regardless of where exactly in the band the object sits.

// ════════════════════════════════════════════════════════════════════════════
// NoteDecision
// ════════════════════════════════════════════════════════════════════════════

/// Verdict for one note span.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoteDecision {
    Off,
    /// The span contains at least one matching pixel; `intensity` is the
    /// matching fraction of the *whole* column, a coverage signal shared by
    /// every span of the colour.
    On { intensity: f32 },
}

impl NoteDecision {
    pub fn is_on(&self) -> bool {
        matches!(self, NoteDecision::On { .. })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// map_column
// ════════════════════════════════════════════════════════════════════════════

/// Partition `class_ids` into `note_count` spans and decide each note.
///
/// Span `n` covers `[len·n / count, len·(n+1) / count)` — exact integer
/// arithmetic, so the spans tile `[0, len)` with no gaps or overlaps and
/// adjacent spans differ in width by at most one pixel.  A zero-width span
/// (more notes than pixels) always decides Off.
pub fn map_column(class_ids: &[u8], color_index: u8, note_count: usize) -> Vec<NoteDecision> {
    let len = class_ids.len();
    if note_count == 0 {
        return Vec::new();
    }

    let matching = class_ids.iter().filter(|&&id| id == color_index).count();
    let intensity = if len == 0 { 0.0 } else { matching as f32 / len as f32 };

    (0..note_count)
        .map(|n| {
            let start = len * n / note_count;
            let stop  = len * (n + 1) / note_count;
            if class_ids[start..stop].iter().any(|&id| id == color_index) {
                NoteDecision::On { intensity }
            } else {
                NoteDecision::Off
            }
        })
        .collect()
}

/// Span boundaries for a column of `len` pixels split into `count` spans.
/// Exposed for the monitor overlay, which draws the span grid.
pub fn span_bounds(len: usize, count: usize, n: usize) -> (usize, usize) {
    (len * n / count, len * (n + 1) / count)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
