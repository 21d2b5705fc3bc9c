//! Model entities for the Osmion framework: compartments, diffusion
//! links, and the deferred-update protocol that connects them to the
//! tick engine.
//!
//! A tick has two phases. In the compute phase every entity reads the
//! frozen pre-tick state and describes its effects as
//! [`DeferredUpdate`]s through a [`StepContext`]; nothing is mutated.
//! In the commit phase the engine applies the queued updates in FIFO
//! order. All entities therefore observe the same consistent snapshot
//! regardless of registration order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod compartment;
pub mod context;
pub mod diffusion;
pub mod update;

pub use compartment::{Compartment, CompartmentBuilder, GeometryMode};
pub use context::StepContext;
pub use diffusion::{Diffusion, DiffusionBuilder};
pub use update::{DeferredUpdate, Field, UpdateKind};
