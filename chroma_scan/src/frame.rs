//! Frame buffers and the camera-facing transforms applied before analysis:
//! flip, crop, and the two-click crop picker driven from the monitor window.

use palette::{Hsv, IntoColor, Srgb};

use crate::ScanError;

// ════════════════════════════════════════════════════════════════════════════
// RgbFrame
// ════════════════════════════════════════════════════════════════════════════

/// A decoded video frame, 8-bit RGB, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct RgbFrame {
    pub width:  usize,
    pub height: usize,
    /// `3 * width * height` bytes, R G B interleaved.
    pub data:   Vec<u8>,
}

impl RgbFrame {
    /// A black frame of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        RgbFrame { width, height, data: vec![0; 3 * width * height] }
    }

    /// Build from an interleaved RGB byte buffer.  `data.len()` must equal
    /// `3 * width * height`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), 3 * width * height, "RGB buffer size mismatch");
        RgbFrame { width, height, data }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = 3 * (y * self.width + x);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = 3 * (y * self.width + x);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Apply a flip transform, returning the transformed frame.
    pub fn flipped(&self, flip: Flip) -> RgbFrame {
        if flip == Flip::None {
            return self.clone();
        }
        let mut out = RgbFrame::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let (sx, sy) = match flip {
                    Flip::None     => (x, y),
                    Flip::Mirror   => (self.width - 1 - x, y),
                    Flip::Vertical => (x, self.height - 1 - y),
                };
                out.set_pixel(x, y, self.pixel(sx, sy));
            }
        }
        out
    }

    /// Extract the crop region, clamped to the frame bounds.
    pub fn cropped(&self, crop: &CropRect) -> RgbFrame {
        let x0 = crop.x0.min(self.width);
        let y0 = crop.y0.min(self.height);
        let x1 = crop.x1.min(self.width);
        let y1 = crop.y1.min(self.height);
        let mut out = RgbFrame::new(x1.saturating_sub(x0), y1.saturating_sub(y0));
        for y in y0..y1 {
            for x in x0..x1 {
                out.set_pixel(x - x0, y - y0, self.pixel(x, y));
            }
        }
        out
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HsvFrame
// ════════════════════════════════════════════════════════════════════════════

/// Per-channel HSV planes, each component normalised to [0, 1].
///
/// Hue is stored as a fraction of the full circle so that band arithmetic
/// can wrap with a plain `rem_euclid(1.0)`.
#[derive(Clone, Debug)]
pub struct HsvFrame {
    pub width:  usize,
    pub height: usize,
    pub h: Vec<f32>,
    pub s: Vec<f32>,
    pub v: Vec<f32>,
}

impl HsvFrame {
    /// Convert a decoded RGB frame to normalised HSV planes.
    pub fn from_rgb(frame: &RgbFrame) -> HsvFrame {
        let n = frame.width * frame.height;
        let mut h = Vec::with_capacity(n);
        let mut s = Vec::with_capacity(n);
        let mut v = Vec::with_capacity(n);
        for px in frame.data.chunks_exact(3) {
            let rgb = Srgb::new(
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            );
            let hsv: Hsv = rgb.into_color();
            h.push(hsv.hue.into_positive_degrees() / 360.0);
            s.push(hsv.saturation);
            v.push(hsv.value);
        }
        HsvFrame { width: frame.width, height: frame.height, h, s, v }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Flip
// ════════════════════════════════════════════════════════════════════════════

/// Frame flip applied before analysis, set by the operator for whichever way
/// the camera happens to be mounted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flip {
    None,
    /// Flip top-to-bottom.
    Vertical,
    /// Mirror left-to-right.
    Mirror,
}

impl Flip {
    /// Decode the configuration-file flip code.  Unknown codes fall back to
    /// no flip rather than failing, since the next frame corrects the view.
    pub fn from_code(code: i32) -> Flip {
        match code {
            1 => Flip::Mirror,
            2 => Flip::Vertical,
            _ => Flip::None,
        }
    }

    /// Next flip mode, for a single cycle key in the monitor window.
    pub fn cycled(self) -> Flip {
        match self {
            Flip::None     => Flip::Mirror,
            Flip::Mirror   => Flip::Vertical,
            Flip::Vertical => Flip::None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CropRect + CropPicker
// ════════════════════════════════════════════════════════════════════════════

/// Axis-aligned crop rectangle in frame pixel coordinates, half-open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl CropRect {
    /// Build from two corner points in any order.  Zero-area rectangles are
    /// rejected so a double-click cannot blank the frame.
    pub fn from_corners(p0: (usize, usize), p1: (usize, usize)) -> Result<CropRect, ScanError> {
        let rect = CropRect {
            x0: p0.0.min(p1.0),
            y0: p0.1.min(p1.1),
            x1: p0.0.max(p1.0),
            y1: p0.1.max(p1.1),
        };
        if rect.x0 == rect.x1 || rect.y0 == rect.y1 {
            return Err(ScanError::EmptyCrop);
        }
        Ok(rect)
    }

    pub fn width(&self) -> usize  { self.x1 - self.x0 }
    pub fn height(&self) -> usize { self.y1 - self.y0 }
}

/// Three-step click cycle for picking a crop rectangle in the monitor
/// window: first click anchors a corner, second click completes the
/// rectangle, third click clears it again.
#[derive(Clone, Copy, Debug, Default)]
pub struct CropPicker {
    anchor: Option<(usize, usize)>,
    armed_clear: bool,
}

/// Result of feeding one click into the [`CropPicker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickerOutcome {
    /// First corner stored, waiting for the opposite one.
    Anchored,
    /// Rectangle complete.
    Picked(CropRect),
    /// Third click: drop the active crop.
    Cleared,
}

impl CropPicker {
    pub fn new() -> Self {
        CropPicker::default()
    }

    pub fn click(&mut self, x: usize, y: usize) -> PickerOutcome {
        if self.armed_clear {
            self.armed_clear = false;
            self.anchor = None;
            return PickerOutcome::Cleared;
        }
        match self.anchor.take() {
            None => {
                self.anchor = Some((x, y));
                PickerOutcome::Anchored
            }
            Some(p0) => match CropRect::from_corners(p0, (x, y)) {
                Ok(rect) => {
                    self.armed_clear = true;
                    PickerOutcome::Picked(rect)
                }
                // Degenerate pair: treat the click as a fresh anchor.
                Err(_) => {
                    self.anchor = Some((x, y));
                    PickerOutcome::Anchored
                }
            },
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: usize, h: usize) -> RgbFrame {
        let mut f = RgbFrame::new(w, h);
        for y in 0..h {
            for x in 0..w {
                f.set_pixel(x, y, [x as u8, y as u8, 0]);
            }
        }
        f
    }

    #[test]
    fn mirror_swaps_columns() {
        let f = gradient_frame(4, 2);
        let m = f.flipped(Flip::Mirror);
        assert_eq!(m.pixel(0, 0), f.pixel(3, 0));
        assert_eq!(m.pixel(3, 1), f.pixel(0, 1));
    }

    #[test]
    fn vertical_swaps_rows() {
        let f = gradient_frame(2, 4);
        let v = f.flipped(Flip::Vertical);
        assert_eq!(v.pixel(0, 0), f.pixel(0, 3));
        assert_eq!(v.pixel(1, 3), f.pixel(1, 0));
    }

    #[test]
    fn flip_none_is_identity() {
        let f = gradient_frame(3, 3);
        assert_eq!(f.flipped(Flip::None), f);
    }

    #[test]
    fn crop_extracts_region() {
        let f = gradient_frame(10, 10);
        let rect = CropRect::from_corners((2, 3), (6, 8)).unwrap();
        let c = f.cropped(&rect);
        assert_eq!((c.width, c.height), (4, 5));
        assert_eq!(c.pixel(0, 0), f.pixel(2, 3));
        assert_eq!(c.pixel(3, 4), f.pixel(5, 7));
    }

    #[test]
    fn crop_corners_normalise() {
        let a = CropRect::from_corners((6, 8), (2, 3)).unwrap();
        let b = CropRect::from_corners((2, 3), (6, 8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn crop_zero_area_rejected() {
        assert_eq!(CropRect::from_corners((4, 4), (4, 9)), Err(ScanError::EmptyCrop));
    }

    #[test]
    fn crop_clamps_to_frame() {
        let f = gradient_frame(5, 5);
        let rect = CropRect::from_corners((3, 3), (40, 40)).unwrap();
        let c = f.cropped(&rect);
        assert_eq!((c.width, c.height), (2, 2));
    }

    #[test]
    fn picker_three_click_cycle() {
        let mut picker = CropPicker::new();
        assert_eq!(picker.click(1, 2), PickerOutcome::Anchored);
        assert_eq!(
            picker.click(5, 9),
            PickerOutcome::Picked(CropRect::from_corners((1, 2), (5, 9)).unwrap())
        );
        assert_eq!(picker.click(7, 7), PickerOutcome::Cleared);
        // Cycle restarts.
        assert_eq!(picker.click(0, 0), PickerOutcome::Anchored);
    }

    #[test]
    fn picker_ignores_degenerate_pair() {
        let mut picker = CropPicker::new();
        picker.click(4, 4);
        // Same point: re-anchor instead of producing a zero-area crop.
        assert_eq!(picker.click(4, 4), PickerOutcome::Anchored);
        assert!(matches!(picker.click(8, 8), PickerOutcome::Picked(_)));
    }

    #[test]
    fn hsv_of_pure_red() {
        let mut f = RgbFrame::new(1, 1);
        f.set_pixel(0, 0, [255, 0, 0]);
        let hsv = HsvFrame::from_rgb(&f);
        assert!(hsv.h[0] < 1e-3);
        assert!((hsv.s[0] - 1.0).abs() < 1e-3);
        assert!((hsv.v[0] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn hsv_of_pure_green_is_one_third() {
        let mut f = RgbFrame::new(1, 1);
        f.set_pixel(0, 0, [0, 255, 0]);
        let hsv = HsvFrame::from_rgb(&f);
        assert!((hsv.h[0] - 1.0 / 3.0).abs() < 1e-3);
    }
}
