//! Timed cross-fade progress.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    started: Instant,
    duration: Duration,
}

impl Transition {
    pub fn new(started: Instant, duration: Duration) -> Self {
        Self { started, duration }
    }

    /// Fraction of the fade elapsed at `now`, in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress() {
        let start = Instant::now();
        let fade = Transition::new(start, Duration::from_millis(150));

        assert_eq!(fade.progress(start), 0.0);
        assert!((fade.progress(start + Duration::from_millis(75)) - 0.5).abs() < 1e-6);
        assert!(!fade.is_complete(start + Duration::from_millis(149)));
        assert!(fade.is_complete(start + Duration::from_millis(150)));
        assert_eq!(fade.progress(start + Duration::from_secs(10)), 1.0);
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let start = Instant::now();
        assert!(Transition::new(start, Duration::ZERO).is_complete(start));
    }
}
