//! Observation boundary: time-series collection during a run.
//!
//! Monitors read entity state through the simulator's keyed access and
//! never mutate it. The run loop calls [`Monitor::collect`] on collect
//! boundaries and [`Monitor::publish`] on publish boundaries; a run
//! that starts from a clean slate calls [`Monitor::clear`] first.

use crate::simulator::Simulator;

/// Something that samples simulation state during a run.
pub trait Monitor {
    /// Sample whatever this monitor tracks. Called on every collect
    /// boundary with the pre-tick state.
    fn collect(&mut self, sim: &Simulator);

    /// Flush or render accumulated samples. Called on publish
    /// boundaries and once after the final tick.
    fn publish(&mut self) {}

    /// Drop accumulated samples. Called when a run rewinds the clock.
    fn clear(&mut self) {}
}

/// One tracked time series.
#[derive(Clone, Debug)]
struct Series {
    compartment: String,
    key: String,
    samples: Vec<(f64, f64)>,
}

/// Records `(time, value)` series for chosen compartment fields.
///
/// The standard monitor for tests and headless analysis. Tracks fields
/// by compartment name and key, matching the keyed access exposed by
/// [`Simulator::value`].
///
/// [`Simulator::value`]: crate::simulator::Simulator::value
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    series: Vec<Series>,
}

impl Recorder {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `key` of the named compartment.
    pub fn track(&mut self, compartment: impl Into<String>, key: impl Into<String>) {
        self.series.push(Series {
            compartment: compartment.into(),
            key: key.into(),
            samples: Vec::new(),
        });
    }

    /// The samples collected so far for one tracked series.
    pub fn samples(&self, compartment: &str, key: &str) -> Option<&[(f64, f64)]> {
        self.series
            .iter()
            .find(|s| s.compartment == compartment && s.key == key)
            .map(|s| s.samples.as_slice())
    }

    /// The most recent sample for one tracked series.
    pub fn last(&self, compartment: &str, key: &str) -> Option<(f64, f64)> {
        self.samples(compartment, key)?.last().copied()
    }
}

impl Monitor for Recorder {
    fn collect(&mut self, sim: &Simulator) {
        let t = sim.now();
        for s in &mut self.series {
            if let Some(v) = sim.value(&s.compartment, &s.key) {
                s.samples.push((t, v));
            }
        }
    }

    fn publish(&mut self) {
        for s in &self.series {
            tracing::debug!(
                compartment = %s.compartment,
                key = %s.key,
                samples = s.samples.len(),
                "series updated"
            );
        }
    }

    fn clear(&mut self) {
        for s in &mut self.series {
            s.samples.clear();
        }
    }
}
