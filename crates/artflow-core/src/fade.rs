//! Timed interpolation of a channel's values

use std::time::{Duration, Instant};

use crate::curve::ValueCurve;

/// A fade from a captured start state to a target state.
///
/// Start and target always have the width of the channel that owns the
/// fade. A zero duration jumps to the target on the first advance.
#[derive(Debug, Clone, PartialEq)]
pub struct Fade {
    start_values: Vec<u8>,
    target_values: Vec<u8>,
    duration: Duration,
    started: Instant,
    curve: ValueCurve,
}

impl Fade {
    /// Create a fade. Lengths are validated by the channel before this is
    /// called.
    pub fn new(
        start_values: Vec<u8>,
        target_values: Vec<u8>,
        duration: Duration,
        started: Instant,
        curve: ValueCurve,
    ) -> Self {
        debug_assert_eq!(start_values.len(), target_values.len());
        Self {
            start_values,
            target_values,
            duration,
            started,
            curve,
        }
    }

    /// Elapsed fraction at `now`, clamped to 0.0-1.0.
    ///
    /// Times before the start count as progress 0; a zero duration is
    /// always complete.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Write the interpolated values for `now` into `values` and report
    /// whether the fade has reached its target.
    ///
    /// Each slot is rounded to the nearest integer and clamped to 0-255.
    pub fn advance(&self, now: Instant, values: &mut [u8]) -> bool {
        let progress = self.progress(now);
        for ((slot, &start), &target) in values
            .iter_mut()
            .zip(&self.start_values)
            .zip(&self.target_values)
        {
            *slot = self.curve.interpolate(start, target, progress);
        }
        progress >= 1.0
    }

    /// Values captured when the fade was installed
    pub fn start_values(&self) -> &[u8] {
        &self.start_values
    }

    /// Values the fade ends on
    pub fn target_values(&self) -> &[u8] {
        &self.target_values
    }

    /// Total fade time
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Easing curve
    pub fn curve(&self) -> ValueCurve {
        self.curve
    }

    /// Time the fade was installed
    pub fn started(&self) -> Instant {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fade(start: Vec<u8>, target: Vec<u8>, ms: u64, t0: Instant) -> Fade {
        Fade::new(
            start,
            target,
            Duration::from_millis(ms),
            t0,
            ValueCurve::Linear,
        )
    }

    #[test]
    fn test_progress() {
        let t0 = Instant::now();
        let f = fade(vec![0], vec![255], 1000, t0);
        assert_eq!(f.progress(t0), 0.0);
        assert_eq!(f.progress(t0 + Duration::from_millis(250)), 0.25);
        assert_eq!(f.progress(t0 + Duration::from_millis(5000)), 1.0);
    }

    #[test]
    fn test_zero_duration_jumps() {
        let t0 = Instant::now();
        let f = fade(vec![10, 20], vec![200, 0], 0, t0);
        let mut values = vec![10, 20];
        assert!(f.advance(t0, &mut values));
        assert_eq!(values, vec![200, 0]);
    }

    #[test]
    fn test_advance_midway() {
        let t0 = Instant::now();
        let f = fade(vec![0, 200, 50], vec![100, 100, 50], 1000, t0);
        let mut values = vec![0; 3];
        let done = f.advance(t0 + Duration::from_millis(500), &mut values);
        assert!(!done);
        assert_eq!(values, vec![50, 150, 50]);
    }

    #[test]
    fn test_advance_to_end() {
        let t0 = Instant::now();
        let f = fade(vec![3, 250], vec![251, 7], 400, t0);
        let mut values = vec![3, 250];
        assert!(f.advance(t0 + Duration::from_millis(400), &mut values));
        assert_eq!(values, vec![251, 7]);
    }

    #[test]
    fn test_before_start_holds_start_values() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let f = fade(vec![42], vec![0], 100, t0);
        let mut values = vec![0];
        assert!(!f.advance(Instant::now(), &mut values));
        assert_eq!(values, vec![42]);
    }
}
