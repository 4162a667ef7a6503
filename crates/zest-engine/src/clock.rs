//! Fixed-rate tick driver

use zest_common::TICKS_PER_SECOND;

/// Upper bound on catch-up ticks per update, so a stalled host does not
/// spiral into running hundreds of ticks at once
const MAX_CATCH_UP: u32 = 5;

/// Converts elapsed wall time into whole engine ticks
#[derive(Debug, Clone, Default)]
pub struct GameClock {
    accumulator: f64,
    paused: bool,
    stopped: bool,
}

impl GameClock {
    pub fn tick_length() -> f64 {
        1.0 / TICKS_PER_SECOND as f64
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Toggle pause; returns whether the clock is now paused
    pub fn pause_resume(&mut self) -> bool {
        self.paused = !self.paused;
        self.accumulator = 0.0;
        self.paused
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        self.accumulator = 0.0;
    }

    pub fn start(&mut self) {
        self.stopped = false;
    }

    /// Feed elapsed seconds; returns how many ticks are due
    pub fn update(&mut self, elapsed: f64) -> u32 {
        if self.paused || self.stopped || !elapsed.is_finite() || elapsed <= 0.0 {
            return 0;
        }
        self.accumulator += elapsed;
        let step = Self::tick_length();
        let mut ticks = 0;
        // small epsilon so exact multiples of 50ms are not lost to rounding
        while self.accumulator + 1e-9 >= step {
            self.accumulator -= step;
            ticks += 1;
        }
        if ticks > MAX_CATCH_UP {
            tracing::debug!("Dropping {} late ticks", ticks - MAX_CATCH_UP);
            ticks = MAX_CATCH_UP;
        }
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_partial_ticks() {
        let mut clock = GameClock::default();
        assert_eq!(clock.update(0.03), 0);
        assert_eq!(clock.update(0.03), 1);
        assert_eq!(clock.update(0.04), 1);
        assert_eq!(clock.update(0.1), 2);
    }

    #[test]
    fn paused_clock_does_not_tick() {
        let mut clock = GameClock::default();
        assert!(clock.pause_resume());
        assert_eq!(clock.update(1.0), 0);
        assert!(!clock.pause_resume());
        assert_eq!(clock.update(0.05), 1);
    }

    #[test]
    fn stop_and_start() {
        let mut clock = GameClock::default();
        clock.stop();
        assert_eq!(clock.update(0.5), 0);
        clock.start();
        assert_eq!(clock.update(0.05), 1);
    }

    #[test]
    fn catch_up_is_capped() {
        let mut clock = GameClock::default();
        assert_eq!(clock.update(10.0), MAX_CATCH_UP);
    }
}
