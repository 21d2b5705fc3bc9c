//! Permeant ion species tracked by the model.

use std::fmt;

/// A permeant ion species with an intracellular concentration field.
///
/// The impermeant anion `X` is not listed here: it never crosses a
/// diffusion link, and its (variable, non-integer) valence is carried
/// per compartment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ion {
    /// Sodium, valence +1.
    Na,
    /// Potassium, valence +1.
    K,
    /// Chloride, valence −1.
    Cl,
}

impl Ion {
    /// Signed valence of the species.
    pub fn valence(self) -> f64 {
        match self {
            Self::Na | Self::K => 1.0,
            Self::Cl => -1.0,
        }
    }

    /// Lower-case chemical symbol, matching the keyed-access names
    /// (`"na"` → `nai` intracellular concentration).
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Na => "na",
            Self::K => "k",
            Self::Cl => "cl",
        }
    }
}

impl fmt::Display for Ion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
