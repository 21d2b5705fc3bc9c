//! Run-loop configuration and results.

use std::time::Duration;

use osmion_core::RunError;

/// Configuration for one call to [`Simulator::run`].
///
/// The stop time resolves in priority order: `continue_for` (relative
/// to the current clock) wins over an absolute `stop`, which wins over
/// the clock's own default stop time. A run with no `continue_for`
/// starts from a clean slate: the clock rewinds to zero and monitors
/// are cleared.
///
/// [`Simulator::run`]: crate::simulator::Simulator::run
#[derive(Clone, Copy, Debug)]
pub struct RunConfig {
    /// Run this many seconds past the current clock time. Takes
    /// precedence over `stop`.
    pub continue_for: Option<f64>,
    /// Absolute stop time, seconds.
    pub stop: Option<f64>,
    /// Step size, seconds.
    pub dt: f64,
    /// Seconds of simulated time between monitor publishes.
    pub publish_interval: f64,
    /// Seconds of simulated time between monitor collections. Defaults
    /// to `dt` when unset; clamped to at most `publish_interval`.
    pub collect_interval: Option<f64>,
    /// Log wall-clock progress when the run finishes.
    pub log_progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            continue_for: None,
            stop: None,
            dt: 1e-3,
            publish_interval: 100.0,
            collect_interval: None,
            log_progress: false,
        }
    }
}

impl RunConfig {
    /// A fresh run to an absolute stop time.
    pub fn to_stop(stop: f64, dt: f64) -> Self {
        Self {
            stop: Some(stop),
            dt,
            ..Self::default()
        }
    }

    /// Continue the current simulation for `duration` more seconds.
    pub fn continue_for(duration: f64, dt: f64) -> Self {
        Self {
            continue_for: Some(duration),
            dt,
            ..Self::default()
        }
    }

    /// Check the sampling intervals.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidInterval`] for a non-positive or
    /// non-finite publish or collect interval.
    pub fn validate(&self) -> Result<(), RunError> {
        if !self.publish_interval.is_finite() || self.publish_interval <= 0.0 {
            return Err(RunError::InvalidInterval {
                value: self.publish_interval,
            });
        }
        if let Some(ci) = self.collect_interval {
            if !ci.is_finite() || ci <= 0.0 {
                return Err(RunError::InvalidInterval { value: ci });
            }
        }
        Ok(())
    }

    /// The collect interval actually used: the configured one (capped
    /// at the publish interval) or `dt`.
    pub fn effective_collect_interval(&self) -> f64 {
        self.collect_interval
            .unwrap_or(self.dt)
            .min(self.publish_interval)
    }
}

/// What a finished run did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Number of ticks executed.
    pub ticks: u64,
    /// Wall-clock time spent.
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_interval_defaults_to_dt_and_caps_at_publish() {
        let cfg = RunConfig::to_stop(1.0, 1e-3);
        assert_eq!(cfg.effective_collect_interval(), 1e-3);

        let cfg = RunConfig {
            collect_interval: Some(500.0),
            publish_interval: 100.0,
            ..RunConfig::default()
        };
        assert_eq!(cfg.effective_collect_interval(), 100.0);
    }

    #[test]
    fn rejects_bad_intervals() {
        let cfg = RunConfig {
            publish_interval: 0.0,
            ..RunConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RunError::InvalidInterval { .. })));

        let cfg = RunConfig {
            collect_interval: Some(f64::NAN),
            ..RunConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
