//! Tick engine driving Osmion simulations.
//!
//! Provides the top-level [`Simulator`] that owns the clock, the
//! registered entities, and the deferred-update queue, and drives the
//! two-phase run loop: every entity computes against the frozen
//! pre-tick snapshot, the clock advances, and the queued updates commit
//! in FIFO order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod monitor;
pub mod simulator;

pub use config::{RunConfig, RunReport};
pub use monitor::{Monitor, Recorder};
pub use simulator::{EntityRef, Simulator};
