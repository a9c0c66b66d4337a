//! Frame timing.

use std::time::{Duration, Instant};

/// Tracks delta and elapsed time across frames.
///
/// Owned by the frame-loop driver and passed to whatever needs timing.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    delta: Duration,
    frame_count: u64,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last_tick: start,
            delta: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Advance to a new frame.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.frame_count += 1;
    }

    /// Seconds between the two most recent ticks.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Seconds from start to the most recent tick.
    pub fn elapsed_seconds(&self) -> f32 {
        self.last_tick
            .saturating_duration_since(self.start)
            .as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_accumulate() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start);

        timer.tick_at(start + Duration::from_millis(10));
        timer.tick_at(start + Duration::from_millis(25));

        assert_eq!(timer.frame_count(), 2);
        assert!((timer.delta_seconds() - 0.015).abs() < 1e-6);
        assert!((timer.elapsed_seconds() - 0.025).abs() < 1e-6);
    }
}
