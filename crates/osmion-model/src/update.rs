//! Deferred updates: the only way entity state changes during a run.
//!
//! During the compute phase entities enqueue updates instead of
//! mutating anything. The engine applies the queue in FIFO order after
//! the clock has advanced, so every entity's compute phase saw the
//! same pre-tick snapshot.

use osmion_core::CompartmentId;

use crate::compartment::Compartment;

/// A scalar field of a [`Compartment`] addressable by deferred updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Intracellular sodium concentration, M.
    Nai,
    /// Intracellular potassium concentration, M.
    Ki,
    /// Intracellular chloride concentration, M.
    Cli,
    /// Mobile impermeant-anion concentration, M.
    XiMobile,
    /// Valence of the mobile impermeant-anion pool.
    Xz,
    /// Average impermeant-anion valence.
    Z,
    /// Membrane voltage, V.
    V,
    /// Pending next-tick volume, L.
    W2,
    /// Pump flux, mol dm⁻² s⁻¹.
    Jp,
    /// KCC2 cotransporter flux, mol dm⁻² s⁻¹.
    Jkcc2,
    /// Potassium Nernst potential, V.
    Ek,
    /// Chloride Nernst potential, V.
    Ecl,
    /// KCC2 pump-rate parameter.
    Pkcc2,
}

/// What a deferred update does when committed.
///
/// No `PartialEq`: the `Function` variant holds a function pointer and
/// pointer identity is not a meaningful equality.
#[derive(Clone, Copy, Debug)]
pub enum UpdateKind {
    /// Add `delta` to the field. Deltas from several sources accumulate.
    Change {
        /// The field to adjust.
        field: Field,
        /// The signed increment.
        delta: f64,
    },
    /// Overwrite the field. Used for derived quantities recomputed from
    /// the snapshot each tick.
    Set {
        /// The field to overwrite.
        field: Field,
        /// The replacement value.
        value: f64,
    },
    /// Run a finalizer against the compartment after the preceding
    /// updates for it have been applied. Enqueued last by an entity's
    /// compute phase, so FIFO order guarantees it sees the committed
    /// per-tick deltas.
    Function(fn(&mut Compartment)),
}

/// One queued state change, bound for a single compartment.
#[derive(Clone, Copy, Debug)]
pub struct DeferredUpdate {
    /// The compartment to modify.
    pub target: CompartmentId,
    /// The modification to apply.
    pub kind: UpdateKind,
}

impl DeferredUpdate {
    /// Convenience constructor.
    pub fn new(target: CompartmentId, kind: UpdateKind) -> Self {
        Self { target, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_then_set_is_order_dependent() {
        let mut c = Compartment::builder("t").build().unwrap();
        let before = c.nai();
        c.apply(UpdateKind::Change {
            field: Field::Nai,
            delta: 1e-3,
        });
        assert!((c.nai() - before - 1e-3).abs() < 1e-15);
        c.apply(UpdateKind::Set {
            field: Field::Nai,
            value: 0.05,
        });
        assert_eq!(c.nai(), 0.05);
    }

    #[test]
    fn function_updates_run_against_the_target() {
        fn zero_sodium(c: &mut Compartment) {
            c.apply(UpdateKind::Set {
                field: Field::Nai,
                value: 0.0,
            });
        }
        let mut c = Compartment::builder("t").build().unwrap();
        c.apply(UpdateKind::Function(zero_sodium));
        assert_eq!(c.nai(), 0.0);
    }
}
