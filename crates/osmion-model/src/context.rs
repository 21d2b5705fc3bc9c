//! The per-tick view entities get during the compute phase.

use osmion_core::CompartmentId;

use crate::compartment::Compartment;
use crate::update::{DeferredUpdate, Field, UpdateKind};

/// Read-only time information plus write access to the update queue.
///
/// Handed to each entity's compute phase. Entities cannot reach the
/// clock or other entities' mutable state through it; enqueuing
/// deferred updates is the only side effect available.
#[derive(Debug)]
pub struct StepContext<'a> {
    t: f64,
    dt: f64,
    queue: &'a mut Vec<DeferredUpdate>,
}

impl<'a> StepContext<'a> {
    /// Build a context for one compute phase over the given queue.
    pub fn new(t: f64, dt: f64, queue: &'a mut Vec<DeferredUpdate>) -> Self {
        Self { t, dt, queue }
    }

    /// Simulation time at the start of this tick, seconds.
    pub fn now(&self) -> f64 {
        self.t
    }

    /// Step size of this tick, seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Queue an additive update.
    pub fn change(&mut self, target: CompartmentId, field: Field, delta: f64) {
        self.queue
            .push(DeferredUpdate::new(target, UpdateKind::Change { field, delta }));
    }

    /// Queue an overwrite.
    pub fn set(&mut self, target: CompartmentId, field: Field, value: f64) {
        self.queue
            .push(DeferredUpdate::new(target, UpdateKind::Set { field, value }));
    }

    /// Queue a finalizer to run after this entity's earlier updates.
    pub fn finalize(&mut self, target: CompartmentId, f: fn(&mut Compartment)) {
        self.queue
            .push(DeferredUpdate::new(target, UpdateKind::Function(f)));
    }

    /// Number of updates queued so far this tick.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}
