//! The simulator: entity registry, clock, deferred-update queue, and
//! the two-phase run loop.

use std::time::Instant;

use indexmap::IndexMap;

use osmion_core::{Clock, CompartmentId, DiffusionId, RunError, StepError};
use osmion_model::{Compartment, Diffusion, StepContext};
use osmion_model::update::DeferredUpdate;

use crate::config::{RunConfig, RunReport};
use crate::monitor::Monitor;

/// A registered entity, in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityRef {
    /// A compartment.
    Compartment(CompartmentId),
    /// A diffusion link.
    Diffusion(DiffusionId),
}

/// Owns one simulation: the clock, every registered entity, and the
/// deferred-update queue.
///
/// Each tick runs two phases. Phase one walks the entities in
/// registration order; each computes against the frozen pre-tick state
/// and enqueues [`DeferredUpdate`]s without mutating anything, so every
/// entity observes the same snapshot regardless of registration order.
/// The clock then advances, and phase two applies the queue in FIFO
/// order. An entity may rely on its own earlier updates having
/// committed before its own finalizer runs, but not on any ordering
/// relative to other entities' commits within the same tick.
///
/// Multiple simulators are fully independent; nothing is shared between
/// instances.
#[derive(Debug, Default)]
pub struct Simulator {
    clock: Clock,
    compartments: Vec<Compartment>,
    diffusions: Vec<Diffusion>,
    order: Vec<EntityRef>,
    names: IndexMap<String, CompartmentId>,
    queue: Vec<DeferredUpdate>,
}

impl Simulator {
    /// An empty simulator with a default clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty simulator with the given clock.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Current simulation time, seconds.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// The simulation clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Register a compartment, returning its ID. IDs are sequential in
    /// registration order.
    pub fn add_compartment(&mut self, comp: Compartment) -> CompartmentId {
        let id = CompartmentId(self.compartments.len() as u32);
        if self.names.insert(comp.name().to_owned(), id).is_some() {
            tracing::warn!(name = %comp.name(), "compartment name shadows an earlier one");
        }
        self.compartments.push(comp);
        self.order.push(EntityRef::Compartment(id));
        id
    }

    /// Register an independent copy of an existing compartment under a
    /// new name.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::UnknownCompartment`] if `id` does not
    /// resolve.
    pub fn duplicate_compartment(
        &mut self,
        id: CompartmentId,
        name: impl Into<String>,
    ) -> Result<CompartmentId, RunError> {
        let copy = self
            .compartment(id)
            .ok_or(RunError::UnknownCompartment(id))?
            .duplicate(name);
        Ok(self.add_compartment(copy))
    }

    /// Register a diffusion link, returning its ID.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::UnknownCompartment`] if either endpoint is
    /// not registered.
    pub fn add_diffusion(&mut self, diffusion: Diffusion) -> Result<DiffusionId, RunError> {
        for end in [diffusion.a(), diffusion.b()] {
            if self.compartment(end).is_none() {
                return Err(RunError::UnknownCompartment(end));
            }
        }
        let id = DiffusionId(self.diffusions.len() as u32);
        self.diffusions.push(diffusion);
        self.order.push(EntityRef::Diffusion(id));
        Ok(id)
    }

    /// Look up a compartment.
    pub fn compartment(&self, id: CompartmentId) -> Option<&Compartment> {
        self.compartments.get(id.0 as usize)
    }

    /// Mutable access to a compartment, for perturbations between runs.
    /// Never call during a run; in-run mutation goes through deferred
    /// updates only.
    pub fn compartment_mut(&mut self, id: CompartmentId) -> Option<&mut Compartment> {
        self.compartments.get_mut(id.0 as usize)
    }

    /// Resolve a compartment by name.
    pub fn find(&self, name: &str) -> Option<CompartmentId> {
        self.names.get(name).copied()
    }

    /// Look up a diffusion link.
    pub fn diffusion(&self, id: DiffusionId) -> Option<&Diffusion> {
        self.diffusions.get(id.0 as usize)
    }

    /// Keyed read access for observers: `value("soma", "cli")`.
    pub fn value(&self, compartment: &str, key: &str) -> Option<f64> {
        self.compartment(self.find(compartment)?)?.value(key)
    }

    /// Entities in registration order.
    pub fn entities(&self) -> &[EntityRef] {
        &self.order
    }

    /// Rewind the clock to zero and drop any queued updates. Entity
    /// state is kept.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.queue.clear();
    }

    /// Execute one tick: compute phase, clock advance, commit phase.
    ///
    /// # Errors
    ///
    /// Propagates the first [`StepError`] from the compute phase; the
    /// queue is dropped without committing in that case.
    pub fn tick(&mut self) -> Result<(), StepError> {
        if let Err(e) = self.step_entities() {
            self.queue.clear();
            return Err(e);
        }
        self.clock.step();
        self.apply_updates();
        Ok(())
    }

    /// Drive the run loop described by `config`.
    ///
    /// Equivalent to [`run_observed`](Simulator::run_observed) with no
    /// monitors.
    ///
    /// # Errors
    ///
    /// See [`run_observed`](Simulator::run_observed).
    pub fn run(&mut self, config: RunConfig) -> Result<RunReport, RunError> {
        self.run_observed(config, &mut [])
    }

    /// Drive the run loop, sampling the given monitors on collect and
    /// publish boundaries.
    ///
    /// A run without `continue_for` starts clean: the clock rewinds to
    /// zero and every monitor is cleared first. A continuing run skips
    /// the collect at its first tick; the previous run's trailing
    /// collect already sampled that instant.
    ///
    /// # Errors
    ///
    /// - [`RunError::InvalidInterval`] for bad sampling intervals.
    /// - [`RunError::Time`] for a bad `dt`.
    /// - [`RunError::StopBeforeStart`] when the resolved stop time
    ///   precedes the clock.
    /// - [`RunError::Step`] if an entity fails mid-run.
    pub fn run_observed(
        &mut self,
        config: RunConfig,
        monitors: &mut [&mut dyn Monitor],
    ) -> Result<RunReport, RunError> {
        config.validate()?;

        let stop = match config.continue_for {
            Some(more) => self.clock.now() + more,
            None => {
                self.reset();
                for m in monitors.iter_mut() {
                    m.clear();
                }
                config.stop.unwrap_or(self.clock.stop())
            }
        };
        self.clock.set_step_size(config.dt)?;
        let now = self.clock.now();
        if stop < now {
            return Err(RunError::StopBeforeStart { stop, now });
        }

        let dt = config.dt;
        let t_start = (now / dt).round() as u64;
        let t_stop = (stop / dt).round() as u64;
        let collect_every = ((config.effective_collect_interval() / dt).round() as u64).max(1);
        let publish_every = ((config.publish_interval / dt).round() as u64).max(1);

        let continuing = config.continue_for.is_some();
        let started = Instant::now();
        for i in t_start..t_stop {
            if i % collect_every == 0 && !(continuing && i == t_start) {
                for m in monitors.iter_mut() {
                    m.collect(self);
                }
            }
            if i % publish_every == 0 {
                for m in monitors.iter_mut() {
                    m.publish();
                }
            }
            self.tick()?;
        }
        for m in monitors.iter_mut() {
            m.collect(self);
            m.publish();
        }

        let report = RunReport {
            ticks: t_stop - t_start,
            duration: started.elapsed(),
        };
        if config.log_progress {
            tracing::info!(
                ticks = report.ticks,
                elapsed_ms = report.duration.as_millis() as u64,
                t = self.clock.now(),
                "run finished"
            );
        }
        Ok(report)
    }

    /// Phase one: every entity computes against the frozen snapshot and
    /// enqueues its updates.
    fn step_entities(&mut self) -> Result<(), StepError> {
        let Self {
            clock,
            compartments,
            diffusions,
            order,
            queue,
            ..
        } = self;
        let mut ctx = StepContext::new(clock.now(), clock.dt(), queue);
        for entity in order.iter() {
            match *entity {
                EntityRef::Compartment(id) => {
                    compartments[id.0 as usize].step(id, &mut ctx);
                }
                EntityRef::Diffusion(id) => {
                    diffusions[id.0 as usize].step(compartments, &mut ctx)?;
                }
            }
        }
        Ok(())
    }

    /// Phase two: commit the queue in FIFO order.
    ///
    /// A dangling target is a programming error, not a recoverable
    /// condition; fail loudly.
    fn apply_updates(&mut self) {
        let Self {
            compartments,
            queue,
            ..
        } = self;
        for update in queue.drain(..) {
            match compartments.get_mut(update.target.0 as usize) {
                Some(comp) => comp.apply(update.kind),
                None => panic!("deferred update targets unknown compartment {}", update.target),
            }
        }
    }
}
