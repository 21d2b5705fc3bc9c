//! The simulation clock: elapsed time, step size, and default stop time.

use crate::error::TimeError;

/// Shared time state for one simulation.
///
/// Owned by the simulator and advanced exactly once per tick, between
/// the compute phase and the commit phase. Entities never hold a clock;
/// they receive the current time and step size through their step
/// context, so there is exactly one logical clock per simulation.
///
/// Invariants: `dt > 0`; `t` is monotonically non-decreasing within a
/// run (only [`reset()`](Clock::reset) moves it backwards, to zero).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Clock {
    t: f64,
    dt: f64,
    stop: f64,
}

impl Default for Clock {
    /// A clock at t = 0 with a 1 ms step and a 5 s default stop time.
    fn default() -> Self {
        Self {
            t: 0.0,
            dt: 1e-3,
            stop: 5.0,
        }
    }
}

impl Clock {
    /// Create a clock at t = 0 with the given step size and stop time.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::InvalidStepSize`] unless `dt` is finite and
    /// strictly positive.
    pub fn new(dt: f64, stop: f64) -> Result<Self, TimeError> {
        let mut clock = Self {
            t: 0.0,
            dt: 1e-3,
            stop,
        };
        clock.set_step_size(dt)?;
        Ok(clock)
    }

    /// Elapsed simulation time, seconds.
    pub fn now(&self) -> f64 {
        self.t
    }

    /// Current step size, seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Default stop time used when a run specifies neither `stop` nor
    /// `continue_for`.
    pub fn stop(&self) -> f64 {
        self.stop
    }

    /// Move forward one time step.
    pub fn step(&mut self) {
        self.t += self.dt;
    }

    /// Rewind elapsed time to zero. Step size and stop time are kept.
    pub fn reset(&mut self) {
        self.t = 0.0;
    }

    /// Change the step size.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::InvalidStepSize`] unless `dt` is finite and
    /// strictly positive.
    pub fn set_step_size(&mut self, dt: f64) -> Result<(), TimeError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(TimeError::InvalidStepSize { value: dt });
        }
        self.dt = dt;
        Ok(())
    }

    /// Change the default stop time.
    pub fn set_stop(&mut self, stop: f64) {
        self.stop = stop;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn step_advances_by_dt() {
        let mut clock = Clock::new(0.25, 5.0).unwrap();
        clock.step();
        clock.step();
        assert!((clock.now() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn reset_rewinds_to_zero() {
        let mut clock = Clock::default();
        clock.step();
        clock.reset();
        assert_eq!(clock.now(), 0.0);
        assert_eq!(clock.dt(), 1e-3);
    }

    #[test]
    fn rejects_zero_negative_and_nan_dt() {
        assert!(Clock::new(0.0, 1.0).is_err());
        assert!(Clock::new(-1e-3, 1.0).is_err());
        assert!(Clock::new(f64::NAN, 1.0).is_err());

        let mut clock = Clock::default();
        assert!(clock.set_step_size(f64::INFINITY).is_err());
        // A failed update leaves the old step size in place.
        assert_eq!(clock.dt(), 1e-3);
    }

    #[test]
    fn time_is_monotonic_across_steps() {
        let mut clock = Clock::default();
        let mut prev = clock.now();
        for _ in 0..1000 {
            clock.step();
            assert!(clock.now() > prev);
            prev = clock.now();
        }
    }

    proptest! {
        #[test]
        fn any_positive_finite_dt_is_accepted(dt in 1e-9f64..1e3) {
            let clock = Clock::new(dt, 1.0).unwrap();
            prop_assert_eq!(clock.dt(), dt);
        }
    }
}
