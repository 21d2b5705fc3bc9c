//! Error types for the Osmion framework, organized by subsystem:
//! clock, compartment construction, diffusion construction, per-tick
//! stepping, and the run loop.
//!
//! All fatal conditions are raised at the point of detection and never
//! caught or retried inside the core: the simulation is deterministic
//! and a fatal error aborts the run.

use std::error::Error;
use std::fmt;

use crate::id::CompartmentId;
use crate::ion::Ion;

/// Errors from clock configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeError {
    /// The step size is zero, negative, or non-finite.
    InvalidStepSize {
        /// The rejected value.
        value: f64,
    },
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStepSize { value } => {
                write!(f, "step size must be finite and positive, got {value}")
            }
        }
    }
}

impl Error for TimeError {}

/// Errors detected while constructing a [`Compartment`].
///
/// Every variant describes a physically invalid initial state and is
/// fatal: there is no partially-constructed compartment.
///
/// [`Compartment`]: ../../osmion_model/compartment/struct.Compartment.html
#[derive(Clone, Debug, PartialEq)]
pub enum CompartmentError {
    /// The explicit or derived chloride concentration is negative.
    NegativeChloride {
        /// The offending concentration, M.
        cli: f64,
    },
    /// The derived impermeant-anion concentration is negative.
    NegativeImpermeant {
        /// The offending concentration, M.
        xi: f64,
    },
    /// The impermeant-anion valence is zero: the anion concentration
    /// `xi = (cli − ki − nai) / z` is undefined. IEEE-754 division does
    /// not trap, so the guard is explicit.
    ZeroValence,
    /// Chloride was left to be derived from bulk neutrality, but the
    /// valence is −1 and the neutrality system is singular. Provide an
    /// explicit chloride concentration instead.
    IndeterminateChloride,
    /// Radius or length is zero, negative, or non-finite.
    InvalidGeometry {
        /// Description of the offending dimension.
        reason: String,
    },
    /// The fixed/mobile anion split ratio is outside (0, 1).
    InvalidRatio {
        /// The rejected ratio.
        ratio: f64,
    },
}

impl fmt::Display for CompartmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeChloride { cli } => {
                write!(f, "chloride concentration is negative: {cli} M")
            }
            Self::NegativeImpermeant { xi } => {
                write!(f, "impermeant-anion concentration is negative: {xi} M")
            }
            Self::ZeroValence => {
                write!(f, "impermeant-anion valence is zero")
            }
            Self::IndeterminateChloride => {
                write!(
                    f,
                    "chloride cannot be derived for valence -1; give cli explicitly"
                )
            }
            Self::InvalidGeometry { reason } => write!(f, "invalid geometry: {reason}"),
            Self::InvalidRatio { ratio } => {
                write!(f, "anion split ratio must lie in (0, 1), got {ratio}")
            }
        }
    }
}

impl Error for CompartmentError {}

/// Errors detected while constructing a [`Diffusion`] link.
///
/// [`Diffusion`]: ../../osmion_model/diffusion/struct.Diffusion.html
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DiffusionError {
    /// Both endpoints are the same compartment.
    SelfCoupling,
    /// No ion species were configured.
    NoIons,
    /// The same ion was configured twice.
    DuplicateIon(Ion),
    /// A diffusion coefficient is zero, negative, or non-finite.
    InvalidCoefficient {
        /// The offending species.
        ion: Ion,
        /// The rejected coefficient, dm²/s.
        value: f64,
    },
}

impl fmt::Display for DiffusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfCoupling => write!(f, "diffusion link joins a compartment to itself"),
            Self::NoIons => write!(f, "diffusion link has no ion species"),
            Self::DuplicateIon(ion) => write!(f, "ion '{ion}' configured twice"),
            Self::InvalidCoefficient { ion, value } => {
                write!(
                    f,
                    "diffusion coefficient for '{ion}' must be finite and positive, got {value}"
                )
            }
        }
    }
}

impl Error for DiffusionError {}

/// Errors from an entity's per-tick `step()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepError {
    /// A diffusion link references a compartment the simulator does not
    /// hold. Cannot happen through the public registration API, which
    /// validates both endpoints.
    UnknownCompartment(CompartmentId),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCompartment(id) => {
                write!(f, "step references unknown compartment {id}")
            }
        }
    }
}

impl Error for StepError {}

/// Errors from the simulator's registration and run-loop API.
#[derive(Clone, Debug, PartialEq)]
pub enum RunError {
    /// Clock configuration was rejected.
    Time(TimeError),
    /// An entity failed during the compute phase.
    Step(StepError),
    /// A registration or lookup referenced a compartment that does not
    /// exist.
    UnknownCompartment(CompartmentId),
    /// A sampling interval is zero, negative, or non-finite.
    InvalidInterval {
        /// The rejected interval, seconds.
        value: f64,
    },
    /// The resolved stop time precedes the current clock time.
    StopBeforeStart {
        /// The resolved stop time, seconds.
        stop: f64,
        /// The clock time at the start of the run, seconds.
        now: f64,
    },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time(e) => write!(f, "clock: {e}"),
            Self::Step(e) => write!(f, "step: {e}"),
            Self::UnknownCompartment(id) => write!(f, "unknown compartment {id}"),
            Self::InvalidInterval { value } => {
                write!(f, "interval must be finite and positive, got {value}")
            }
            Self::StopBeforeStart { stop, now } => {
                write!(f, "stop time {stop} s precedes current time {now} s")
            }
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Time(e) => Some(e),
            Self::Step(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TimeError> for RunError {
    fn from(e: TimeError) -> Self {
        Self::Time(e)
    }
}

impl From<StepError> for RunError {
    fn from(e: StepError) -> Self {
        Self::Step(e)
    }
}
