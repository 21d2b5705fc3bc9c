//! Strongly-typed entity identifiers.

use std::fmt;

/// Identifies a compartment within a simulation.
///
/// Compartments are assigned sequential IDs in registration order;
/// `CompartmentId(n)` is the n-th compartment added to the simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompartmentId(pub u32);

impl fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CompartmentId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a diffusion link between two compartments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiffusionId(pub u32);

impl fmt::Display for DiffusionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DiffusionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
