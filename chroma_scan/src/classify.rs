//! Per-colour HSV band classification.
//!
//! Each configured colour selects the pixels whose value and saturation
//! clear its thresholds and whose hue falls inside a wrapping band
//! `[h, h + width) mod 1.0`.  The raw selection is then cleaned with
//! disk-shaped morphology (erode, dilate, close) to drop speckle and fill
//! small holes before the masks are flattened into one class-id plane.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, dilate, erode};

use crate::frame::HsvFrame;
use crate::ScanError;

/// Default hue band width (fraction of the full hue circle).
pub const DEFAULT_HUE_WIDTH: f32 = 0.2;
/// Default saturation/value thresholds.
pub const DEFAULT_SV_MIN: f32 = 0.3;

// ════════════════════════════════════════════════════════════════════════════
// ColorConfig + ColorSet
// ════════════════════════════════════════════════════════════════════════════

/// One colour class: a wrapping hue band with saturation/value gates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorConfig {
    /// Class id written into the flattened plane.  Nonzero; 0 means
    /// "no class".
    pub index:     u8,
    /// Display colour for the monitor overlay only.
    pub display:   [u8; 3],
    /// Band start hue in [0, 1); the band may straddle the 0/1 seam.
    pub hue:       f32,
    /// Band width as a fraction of the hue circle.
    pub hue_width: f32,
    /// Minimum saturation for membership.
    pub sat_min:   f32,
    /// Minimum value for membership.
    pub val_min:   f32,
}

impl ColorConfig {
    /// A colour at `hue` with the default band width and thresholds.
    pub fn new(index: u8, display: [u8; 3], hue: f32) -> Result<ColorConfig, ScanError> {
        ColorConfig {
            index,
            display,
            hue,
            hue_width: DEFAULT_HUE_WIDTH,
            sat_min:   DEFAULT_SV_MIN,
            val_min:   DEFAULT_SV_MIN,
        }
        .validated()
    }

    /// Range-check every field, normalising nothing: construction is where
    /// bad thresholds are rejected, not first use.
    pub fn validated(self) -> Result<ColorConfig, ScanError> {
        if self.index == 0 {
            return Err(ScanError::ReservedIndex);
        }
        for (field, value) in [
            ("hue", self.hue),
            ("hue_width", self.hue_width),
            ("sat_min", self.sat_min),
            ("val_min", self.val_min),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanError::OutOfRange { field, value });
            }
        }
        Ok(self)
    }

    /// Hue band membership with wraparound at the 0/1 seam.
    pub fn hue_in_band(&self, h: f32) -> bool {
        (h - self.hue).rem_euclid(1.0) < self.hue_width
    }

    /// Full membership test for one pixel.
    fn matches(&self, h: f32, s: f32, v: f32) -> bool {
        v > self.val_min && s > self.sat_min && self.hue_in_band(h)
    }
}

/// An ordered, validated set of named colour classes.
///
/// Order matters: it is the last-write-wins order used when masks are
/// flattened into the class-id plane.
#[derive(Clone, Debug)]
pub struct ColorSet {
    entries: Vec<(String, ColorConfig)>,
}

impl ColorSet {
    /// Validate that class indices are unique (and, via each config's own
    /// validation, nonzero and in range).
    pub fn new(entries: Vec<(String, ColorConfig)>) -> Result<ColorSet, ScanError> {
        let mut seen = [false; 256];
        for (_, config) in &entries {
            config.validated()?;
            if seen[config.index as usize] {
                return Err(ScanError::DuplicateIndex(config.index));
            }
            seen[config.index as usize] = true;
        }
        Ok(ColorSet { entries })
    }

    pub fn entries(&self) -> &[(String, ColorConfig)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ColorConfig> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ColorConfig> {
        self.entries.iter_mut().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Mask extraction
// ════════════════════════════════════════════════════════════════════════════

/// One colour's cleaned membership mask.  Pixels are 255 (member) or 0.
#[derive(Clone, Debug)]
pub struct Mask {
    pub index:   u8,
    pub display: [u8; 3],
    pub pixels:  GrayImage,
}

impl Mask {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y)[0] != 0
    }
}

/// Classify an HSV frame against every colour in the set.
///
/// The returned masks are parallel to `set.entries()`.  Overlapping bands
/// are allowed; the overlap is resolved later by [`flatten`].
pub fn classify(frame: &HsvFrame, set: &ColorSet) -> Vec<Mask> {
    set.entries()
        .iter()
        .map(|(_, config)| Mask {
            index:   config.index,
            display: config.display,
            pixels:  cleaned_band_mask(frame, config),
        })
        .collect()
}

fn cleaned_band_mask(frame: &HsvFrame, config: &ColorConfig) -> GrayImage {
    let raw = GrayImage::from_fn(frame.width as u32, frame.height as u32, |x, y| {
        let i = y as usize * frame.width + x as usize;
        if config.matches(frame.h[i], frame.s[i], frame.v[i]) {
            image::Luma([255u8])
        } else {
            image::Luma([0u8])
        }
    });

    // Speckle removal then gap fill, disk structuring element throughout.
    let eroded  = erode(&raw, Norm::L2, 2);
    let dilated = dilate(&eroded, Norm::L2, 3);
    close(&dilated, Norm::L2, 2)
}

/// Flatten masks into one class-id plane, last-write-wins in mask order.
/// 0 means no class.
pub fn flatten(masks: &[Mask], width: usize, height: usize) -> Vec<u8> {
    let mut plane = vec![0u8; width * height];
    for mask in masks {
        for (x, y, px) in mask.pixels.enumerate_pixels() {
            if px[0] != 0 {
                plane[y as usize * width + x as usize] = mask.index;
            }
        }
    }
    plane
}

/// Extract the vertical column at `x` from a flattened class-id plane.
pub fn column(plane: &[u8], width: usize, height: usize, x: usize) -> Vec<u8> {
    (0..height).map(|y| plane[y * width + x]).collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HsvFrame;

    fn config(index: u8, hue: f32, width: f32) -> ColorConfig {
        ColorConfig {
            index,
            display: [255, 0, 0],
            hue,
            hue_width: width,
            sat_min: DEFAULT_SV_MIN,
            val_min: DEFAULT_SV_MIN,
        }
    }

    /// Frame filled with one solid HSV value.
    fn solid_hsv(w: usize, h: usize, hue: f32, s: f32, v: f32) -> HsvFrame {
        HsvFrame {
            width:  w,
            height: h,
            h: vec![hue; w * h],
            s: vec![s; w * h],
            v: vec![v; w * h],
        }
    }

    // ── hue band membership ──────────────────────────────────────────────

    #[test]
    fn band_is_reflexive_at_centre() {
        // For any hue h and width w, a band starting at (h - w/2) mod 1
        // contains h.
        for i in 0..20 {
            let h = i as f32 / 20.0;
            let w = 0.15;
            let c = config(1, (h - w / 2.0).rem_euclid(1.0), w);
            assert!(c.hue_in_band(h), "hue {h} not in band centred on it");
        }
    }

    #[test]
    fn band_wraps_past_one() {
        let c = config(1, 0.95, 0.2);
        assert!(c.hue_in_band(0.96));
        assert!(c.hue_in_band(0.02));
        assert!(c.hue_in_band(0.05));
        assert!(!c.hue_in_band(0.16));
        assert!(!c.hue_in_band(0.90));
    }

    #[test]
    fn band_without_wrap() {
        let c = config(1, 0.2, 0.2);
        assert!(c.hue_in_band(0.2));
        assert!(c.hue_in_band(0.39));
        assert!(!c.hue_in_band(0.41));
        assert!(!c.hue_in_band(0.19));
    }

    // ── validation ───────────────────────────────────────────────────────

    #[test]
    fn index_zero_rejected() {
        assert_eq!(
            ColorConfig::new(0, [0, 0, 0], 0.5),
            Err(ScanError::ReservedIndex)
        );
    }

    #[test]
    fn out_of_range_hue_rejected() {
        let err = config(1, 1.5, 0.2).validated().unwrap_err();
        assert!(matches!(err, ScanError::OutOfRange { field: "hue", .. }));
    }

    #[test]
    fn duplicate_indices_rejected() {
        let entries = vec![
            ("red".to_string(), config(1, 0.9, 0.2)),
            ("blue".to_string(), config(1, 0.5, 0.2)),
        ];
        assert!(matches!(
            ColorSet::new(entries),
            Err(ScanError::DuplicateIndex(1))
        ));
    }

    #[test]
    fn set_lookup_by_name() {
        let set = ColorSet::new(vec![
            ("red".to_string(), config(1, 0.9, 0.2)),
            ("green".to_string(), config(2, 0.25, 0.2)),
        ])
        .unwrap();
        assert_eq!(set.get("green").unwrap().index, 2);
        assert!(set.get("mauve").is_none());
    }

    // ── classification + morphology ──────────────────────────────────────

    #[test]
    fn solid_matching_frame_survives_cleanup() {
        let frame = solid_hsv(32, 32, 0.96, 0.8, 0.8);
        let set = ColorSet::new(vec![("red".to_string(), config(1, 0.9, 0.2))]).unwrap();
        let masks = classify(&frame, &set);
        // Interior pixels stay set after erosion/dilation/closing.
        assert!(masks[0].contains(16, 16));
    }

    #[test]
    fn dark_pixels_never_match() {
        let frame = solid_hsv(16, 16, 0.96, 0.8, 0.1); // under val_min
        let set = ColorSet::new(vec![("red".to_string(), config(1, 0.9, 0.2))]).unwrap();
        let masks = classify(&frame, &set);
        assert!(masks[0].pixels.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn single_pixel_speckle_is_erased() {
        // One matching pixel in a sea of non-members: erosion removes it.
        let mut frame = solid_hsv(32, 32, 0.5, 0.0, 0.0);
        let i = 16 * 32 + 16;
        frame.h[i] = 0.96;
        frame.s[i] = 0.9;
        frame.v[i] = 0.9;
        let set = ColorSet::new(vec![("red".to_string(), config(1, 0.9, 0.2))]).unwrap();
        let masks = classify(&frame, &set);
        assert!(masks[0].pixels.pixels().all(|p| p[0] == 0));
    }

    // ── flatten ──────────────────────────────────────────────────────────

    #[test]
    fn flatten_last_write_wins() {
        let frame = solid_hsv(24, 24, 0.95, 0.8, 0.8);
        // Two bands that both cover hue 0.95; the later entry overwrites.
        let set = ColorSet::new(vec![
            ("a".to_string(), config(1, 0.9, 0.2)),
            ("b".to_string(), config(2, 0.85, 0.2)),
        ])
        .unwrap();
        let masks = classify(&frame, &set);
        let plane = flatten(&masks, 24, 24);
        assert_eq!(plane[12 * 24 + 12], 2);
    }

    #[test]
    fn column_reads_down_the_plane() {
        let plane: Vec<u8> = vec![
            1, 0, 0, //
            0, 2, 0, //
            0, 0, 3,
        ];
        assert_eq!(column(&plane, 3, 3, 0), vec![1, 0, 0]);
        assert_eq!(column(&plane, 3, 3, 2), vec![0, 0, 3]);
    }
}
