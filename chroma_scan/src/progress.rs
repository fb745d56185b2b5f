//! Sweep timing: where in the repeating period we are, and which frame
//! column that position samples.
//!
//! Both functions are pure; the engine accumulates `elapsed` from monotonic
//! deltas between captures and never resets it.

/// Fractional position in the repeating cycle, in `[0, 1)`.
///
/// `period` must be positive; the ensemble validates it before it gets
/// here.
pub fn progress(elapsed: f64, period: f64) -> f64 {
    (elapsed % period) / period
}

/// Frame column sampled at `progress`, for a frame `width` pixels wide.
pub fn column_index(progress: f64, width: usize) -> usize {
    ((width.saturating_sub(1)) as f64 * progress) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_wraps_modulo_period() {
        assert!((progress(7.0, 3.0) - 1.0 / 3.0).abs() < 1e-12);
        assert!((progress(0.0, 3.0)).abs() < 1e-12);
        assert!((progress(2.9, 3.0) - 2.9 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn progress_stays_below_one() {
        for i in 0..1000 {
            let p = progress(i as f64 * 0.173, 2.5);
            assert!((0.0..1.0).contains(&p));
        }
    }

    #[test]
    fn column_index_scales_by_width_minus_one() {
        assert_eq!(column_index(1.0 / 3.0, 424), 141);
        assert_eq!(column_index(0.0, 424), 0);
        assert_eq!(column_index(0.999_999, 424), 422);
    }

    #[test]
    fn column_index_never_reaches_width() {
        for i in 0..100 {
            let p = i as f64 / 100.0;
            assert!(column_index(p, 640) < 640);
        }
    }

    #[test]
    fn single_column_frame_always_samples_zero() {
        assert_eq!(column_index(0.7, 1), 0);
        assert_eq!(column_index(0.7, 0), 0);
    }
}
