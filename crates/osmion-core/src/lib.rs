//! Core types and constants for the Osmion electrodiffusion framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the physical constants, ion species, strongly-typed IDs, the
//! simulation clock, and the error types shared across the workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod constants;
pub mod error;
pub mod id;
pub mod ion;

pub use clock::Clock;
pub use error::{CompartmentError, DiffusionError, RunError, StepError, TimeError};
pub use id::{CompartmentId, DiffusionId};
pub use ion::Ion;
