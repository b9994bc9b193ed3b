// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::{Duration, Instant};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Counts frames and reports an average rate once per `interval`.
#[derive(Debug)]
pub struct FpsClock {
    interval: Duration,
    window_start: Instant,
    frames: u32,
}

impl FpsClock {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            window_start: start,
            frames: 0,
        }
    }

    /// Records one frame at `now`. Returns the average fps when the current
    /// window has lasted at least `interval`, and starts a new window.
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames = self.frames.saturating_add(1);
        let dt = now.saturating_duration_since(self.window_start);
        if dt < self.interval {
            return None;
        }
        let fps = self.frames as f64 / dt.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }
}

impl Default for FpsClock {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Window title with the frame rate appended.
pub fn fps_title(base: &str, fps: f64) -> String {
    format!("{base}    {fps:.1} FPS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_interval() {
        let t0 = Instant::now();
        let mut clock = FpsClock::starting_at(Duration::from_secs(1), t0);
        for i in 1..60 {
            assert!(clock.tick_at(t0 + Duration::from_millis(i * 16)).is_none());
        }
        let fps = clock.tick_at(t0 + Duration::from_secs(1)).unwrap();
        assert!((fps - 60.0).abs() < 1e-9);
        // new window starts from the reporting instant
        assert!(clock.tick_at(t0 + Duration::from_millis(1500)).is_none());
    }

    #[test]
    fn title_has_one_decimal() {
        assert_eq!(fps_title("EasyVK", 59.94), "EasyVK    59.9 FPS");
    }

    #[test]
    fn init_tracing_is_repeatable() {
        init_tracing();
        init_tracing();
    }
}
