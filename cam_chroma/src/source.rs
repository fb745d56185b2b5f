//! Frame sources.
//!
//! The engine only sees the [`FrameSource`] trait.  The synthetic source is
//! always available so the whole pipeline runs without hardware; the real
//! camera sits behind the `camera` feature.

use thiserror::Error;

use chroma_scan::RgbFrame;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("opening capture device {0}: {1}")]
    Open(u32, String),
    #[error("capture failed: {0}")]
    Capture(String),
}

/// A stream of frames.
///
/// `grab` distinguishes a transient empty read (`Ok(None)`, skip the tick)
/// from device loss (`Err`, which terminates the engine).
pub trait FrameSource: Send {
    fn dimensions(&self) -> (usize, usize);
    fn grab(&mut self) -> Result<Option<RgbFrame>, SourceError>;
}

// ════════════════════════════════════════════════════════════════════════════
// Synthetic source
// ════════════════════════════════════════════════════════════════════════════

/// Deterministic generator: one horizontal band of each palette colour,
/// drifting downward a little every frame so notes actually change.
pub struct SyntheticSource {
    width:   usize,
    height:  usize,
    palette: Vec<[u8; 3]>,
    tick:    u64,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize, palette: Vec<[u8; 3]>) -> SyntheticSource {
        let palette = if palette.is_empty() {
            vec![[220, 30, 30], [30, 200, 40], [40, 60, 220]]
        } else {
            palette
        };
        SyntheticSource { width, height, palette, tick: 0 }
    }
}

impl FrameSource for SyntheticSource {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<Option<RgbFrame>, SourceError> {
        let bands = self.palette.len();
        let band_h = (self.height / (2 * bands)).max(1);
        let offset = (self.tick as usize * 2) % self.height;
        self.tick += 1;

        let mut frame = RgbFrame::new(self.width, self.height);
        for (b, &rgb) in self.palette.iter().enumerate() {
            let top = (b * 2 * band_h + offset) % self.height;
            for dy in 0..band_h {
                let y = (top + dy) % self.height;
                for x in 0..self.width {
                    frame.set_pixel(x, y, rgb);
                }
            }
        }
        Ok(Some(frame))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Camera source (feature `camera`)
// ════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "camera")]
mod camera {
    use super::{FrameSource, SourceError};
    use chroma_scan::RgbFrame;
    use log::{info, warn};
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;

    /// Consecutive failed reads before the device is declared lost.
    const MAX_CONSECUTIVE_FAILURES: u32 = 30;

    pub struct CameraSource {
        camera:   Camera,
        width:    usize,
        height:   usize,
        failures: u32,
    }

    impl CameraSource {
        pub fn open(index: u32) -> Result<CameraSource, SourceError> {
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = Camera::new(CameraIndex::Index(index), requested)
                .map_err(|e| SourceError::Open(index, e.to_string()))?;
            camera
                .open_stream()
                .map_err(|e| SourceError::Open(index, e.to_string()))?;

            let resolution = camera.resolution();
            info!(
                "camera {index} open at {}x{}",
                resolution.width(),
                resolution.height()
            );
            Ok(CameraSource {
                camera,
                width:    resolution.width() as usize,
                height:   resolution.height() as usize,
                failures: 0,
            })
        }

        /// A single failed read or decode is transient: report "no frame
        /// this tick" and let the engine retry.  Only an unbroken run of
        /// failures means the device is actually gone.
        fn skip(&mut self, what: &str, detail: String) -> Result<Option<RgbFrame>, SourceError> {
            self.failures += 1;
            if self.failures >= MAX_CONSECUTIVE_FAILURES {
                return Err(SourceError::Capture(format!(
                    "{what} failed {} times in a row: {detail}",
                    self.failures
                )));
            }
            warn!("{what} failed, skipping tick: {detail}");
            Ok(None)
        }
    }

    impl FrameSource for CameraSource {
        fn dimensions(&self) -> (usize, usize) {
            (self.width, self.height)
        }

        fn grab(&mut self) -> Result<Option<RgbFrame>, SourceError> {
            let frame = match self.camera.frame() {
                Ok(frame) => frame,
                Err(e) => return self.skip("camera read", e.to_string()),
            };
            let decoded = match frame.decode_image::<RgbFormat>() {
                Ok(decoded) => decoded,
                Err(e) => return self.skip("frame decode", e.to_string()),
            };
            self.failures = 0;
            Ok(Some(RgbFrame::from_raw(
                decoded.width() as usize,
                decoded.height() as usize,
                decoded.into_raw(),
            )))
        }
    }

    impl Drop for CameraSource {
        fn drop(&mut self) {
            let _ = self.camera.stop_stream();
        }
    }
}

#[cfg(feature = "camera")]
pub use camera::CameraSource;

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
