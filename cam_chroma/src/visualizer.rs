//! Software-rendered monitor window using `minifb`.
//!
//! Shows the processed frame in greyscale with every classified pixel
//! tinted halfway toward its voice's display colour, plus a 2-px line at
//! the column the sweep is currently sampling.  Input:
//!
//! * left click ×2 — pick a crop rectangle (third click clears it)
//! * `F`           — cycle the flip mode
//! * `Up` / `Down` — nudge the sweep period
//! * `Q` / `Esc`   — quit

use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use log::info;

use chroma_scan::frame::PickerOutcome;
use chroma_scan::CropPicker;

use crate::engine::{MonitorFrame, Shared};
use crate::AppError;

const PERIOD_STEP: f64 = 0.25;
const PERIOD_MIN:  f64 = 0.25;
const LINE_COLOR:  u32 = 0x00FFFFFF;
const BG_COLOR:    u32 = 0x00101018;

// ════════════════════════════════════════════════════════════════════════════
// Frame composition
// ════════════════════════════════════════════════════════════════════════════

/// Paint a monitor frame into an 0RGB buffer.
pub fn compose(frame: &MonitorFrame) -> Vec<u32> {
    let mut buf = vec![BG_COLOR; frame.width * frame.height];
    for (i, px) in buf.iter_mut().enumerate() {
        let g = frame.gray[i] as u32;
        let (r, gg, b) = match display_of(frame, frame.class_ids[i]) {
            // 50/50 blend toward the voice's display colour.
            Some([dr, dg, db]) => (
                (g + dr as u32) / 2,
                (g + dg as u32) / 2,
                (g + db as u32) / 2,
            ),
            None => (g, g, g),
        };
        *px = (r << 16) | (gg << 8) | b;
    }

    if frame.width > 0 {
        let x0 = frame.column.min(frame.width - 1);
        let x1 = (frame.column + 1).min(frame.width - 1);
        for y in 0..frame.height {
            buf[y * frame.width + x0] = LINE_COLOR;
            buf[y * frame.width + x1] = LINE_COLOR;
        }
    }
    buf
}

fn display_of(frame: &MonitorFrame, class: u8) -> Option<[u8; 3]> {
    if class == 0 {
        return None;
    }
    frame
        .displays
        .iter()
        .find(|(index, _)| *index == class)
        .map(|(_, rgb)| *rgb)
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:     Window,
    picker:     CropPicker,
    mouse_down: bool,
}

impl Visualizer {
    pub fn new(width: usize, height: usize) -> Result<Visualizer, AppError> {
        let mut window = Window::new(
            "cam_chroma — colour instrument",
            width,
            height,
            WindowOptions::default(),
        )
        .map_err(|e| AppError::Window(e.to_string()))?;
        window.limit_update_rate(Some(std::time::Duration::from_millis(16)));

        Ok(Visualizer {
            window,
            picker: CropPicker::new(),
            mouse_down: false,
        })
    }

    /// Poll input and repaint.  Returns false once the operator quits.
    pub fn tick(&mut self, shared: &Shared) -> bool {
        if !self.window.is_open()
            || self.window.is_key_pressed(Key::Q, KeyRepeat::No)
            || self.window.is_key_pressed(Key::Escape, KeyRepeat::No)
        {
            return false;
        }

        self.poll_keys(shared);
        self.poll_mouse(shared);

        let composed = shared
            .monitor
            .lock()
            .unwrap()
            .as_ref()
            .map(|frame| (compose(frame), frame.width, frame.height));
        match composed {
            Some((buf, w, h)) if w > 0 && h > 0 => {
                let _ = self.window.update_with_buffer(&buf, w, h);
            }
            _ => self.window.update(),
        }
        true
    }

    fn poll_keys(&mut self, shared: &Shared) {
        if self.window.is_key_pressed(Key::F, KeyRepeat::No) {
            let mut tuning = shared.tuning.lock().unwrap();
            tuning.flip = tuning.flip.cycled();
            info!("flip mode: {:?}", tuning.flip);
        }

        let nudge = |delta: f64| {
            let mut ensemble = shared.ensemble.lock().unwrap();
            let period = (ensemble.period() + delta).max(PERIOD_MIN);
            if ensemble.set_period(period).is_ok() {
                info!("sweep period: {period:.2}s");
            }
        };
        if self.window.is_key_pressed(Key::Up, KeyRepeat::Yes) {
            nudge(PERIOD_STEP);
        }
        if self.window.is_key_pressed(Key::Down, KeyRepeat::Yes) {
            nudge(-PERIOD_STEP);
        }
    }

    fn poll_mouse(&mut self, shared: &Shared) {
        let down = self.window.get_mouse_down(MouseButton::Left);
        let clicked = down && !self.mouse_down;
        self.mouse_down = down;
        if !clicked {
            return;
        }
        let Some((mx, my)) = self.window.get_mouse_pos(MouseMode::Discard) else {
            return;
        };

        match self.picker.click(mx.max(0.0) as usize, my.max(0.0) as usize) {
            PickerOutcome::Anchored => info!("crop corner anchored"),
            PickerOutcome::Picked(rect) => {
                info!("crop set: {rect:?}");
                shared.tuning.lock().unwrap().crop = Some(rect);
            }
            PickerOutcome::Cleared => {
                info!("crop cleared");
                shared.tuning.lock().unwrap().crop = None;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(width: usize, height: usize, column: usize) -> MonitorFrame {
        MonitorFrame {
            width,
            height,
            gray: vec![100; width * height],
            class_ids: vec![0; width * height],
            column,
            displays: vec![(1, [255, 0, 0])],
        }
    }

    #[test]
    fn unclassified_pixels_stay_grey() {
        let frame = monitor(8, 4, 6);
        let buf = compose(&frame);
        assert_eq!(buf[0], 0x00646464);
    }

    #[test]
    fn classified_pixels_blend_toward_display_colour() {
        let mut frame = monitor(8, 4, 6);
        frame.class_ids[9] = 1;
        let buf = compose(&frame);
        // (100+255)/2 = 177 red, (100+0)/2 = 50 green and blue.
        assert_eq!(buf[9], 0x00B13232);
    }

    #[test]
    fn progress_line_is_two_pixels_wide() {
        let frame = monitor(8, 4, 3);
        let buf = compose(&frame);
        for y in 0..4 {
            assert_eq!(buf[y * 8 + 3], LINE_COLOR);
            assert_eq!(buf[y * 8 + 4], LINE_COLOR);
            assert_ne!(buf[y * 8 + 5], LINE_COLOR);
        }
    }

    #[test]
    fn progress_line_clamps_at_the_right_edge() {
        let frame = monitor(8, 2, 7);
        let buf = compose(&frame);
        assert_eq!(buf[7], LINE_COLOR);
        assert_ne!(buf[6], LINE_COLOR);
    }

    #[test]
    fn unknown_class_id_renders_grey() {
        let mut frame = monitor(8, 4, 6);
        frame.class_ids[0] = 9;
        let buf = compose(&frame);
        assert_eq!(buf[0], 0x00646464);
    }
}
