//! Osmion: neuronal ion electrodiffusion and osmotic volume simulation.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Osmion sub-crates. For most users, adding `osmion` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use osmion::prelude::*;
//!
//! // Two compartments at the same resting state, joined by chloride
//! // diffusion.
//! let mut sim = Simulator::new();
//! let soma = sim.add_compartment(
//!     Compartment::builder("soma")
//!         .z(-0.85)
//!         .cli(0.015292947537423218)
//!         .ki(0.023836660428807395)
//!         .nai(0.1135388427892471)
//!         .build()
//!         .unwrap(),
//! );
//! let dendrite = sim.duplicate_compartment(soma, "dendrite").unwrap();
//! sim.add_diffusion(
//!     Diffusion::builder(soma, dendrite)
//!         .ion(Ion::Cl, 2.03e-7)
//!         .build()
//!         .unwrap(),
//! )
//! .unwrap();
//!
//! let report = sim.run(RunConfig::to_stop(1.0, 1e-3)).unwrap();
//! assert_eq!(report.ticks, 1000);
//! let cli = sim.value("soma", "cli").unwrap();
//! assert!(cli > 0.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`core`] | `osmion-core` | Constants, IDs, ions, clock, error types |
//! | [`model`] | `osmion-model` | Compartments, diffusion links, deferred updates |
//! | [`engine`] | `osmion-engine` | The simulator, run configuration, monitors |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Constants, IDs, ions, the clock, and error types (`osmion-core`).
pub use osmion_core as core;

/// Compartments, diffusion links, and the deferred-update protocol
/// (`osmion-model`).
pub use osmion_model as model;

/// The simulator, run configuration, and monitors (`osmion-engine`).
pub use osmion_engine as engine;

/// Common imports for typical Osmion usage.
///
/// ```rust
/// use osmion::prelude::*;
/// ```
pub mod prelude {
    pub use osmion_core::{
        Clock, CompartmentError, CompartmentId, DiffusionError, DiffusionId, Ion, RunError,
    };
    pub use osmion_engine::{Monitor, Recorder, RunConfig, RunReport, Simulator};
    pub use osmion_model::{Compartment, CompartmentBuilder, Diffusion, DiffusionBuilder, GeometryMode};
}
