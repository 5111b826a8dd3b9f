//! Frame clock
//!
//! Counts native frames and accumulates variable delta time. Frame numbers
//! start at 0 before the first tick; the first ticked frame is 1.

use std::time::Duration;

/// Simulation time tracker
#[derive(Debug, Clone, Default)]
pub struct SimulationTime {
    tick_count: u64,
    accumulated_secs: f64,
    last_delta: f32,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current frame number (0 until the first tick).
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Advance to the next frame with the given delta in seconds.
    pub fn advance(&mut self, delta_seconds: f32) -> u64 {
        self.tick_count += 1;
        self.accumulated_secs += f64::from(delta_seconds);
        self.last_delta = delta_seconds;
        self.tick_count
    }

    pub fn last_delta(&self) -> f32 {
        self.last_delta
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_secs_f64(self.accumulated_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_counts_frames() {
        let mut time = SimulationTime::new();
        assert_eq!(time.tick_count(), 0);
        assert_eq!(time.advance(0.5), 1);
        assert_eq!(time.advance(0.25), 2);
        assert_eq!(time.last_delta(), 0.25);
        assert_eq!(time.total_time(), Duration::from_millis(750));
    }
}
