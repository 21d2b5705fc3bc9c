//! Physical constants and default membrane parameters.
//!
//! Units follow the decimetre convention used throughout the model:
//! lengths in dm, volumes in litres, concentrations in mol/L (M),
//! conductances in S/dm², time in seconds, voltages in volts.

/// Universal gas constant, J K⁻¹ mol⁻¹.
pub const R: f64 = 8.31446;

/// Faraday's constant, C mol⁻¹.
pub const FARADAY: f64 = 96_485.33;

/// Boltzmann constant, J K⁻¹.
pub const K_B: f64 = 1.38e-23;

/// Elementary charge, C.
pub const Q_E: f64 = 1.602_176_620_898e-19;

/// Absolute temperature, K (25 °C).
pub const TEMPERATURE: f64 = 25.0 + 273.15;

/// Thermal voltage RT/F, V. Scales every Nernst potential.
pub const RTF: f64 = R * TEMPERATURE / FARADAY;

/// Sodium leak conductance, S/dm².
pub const GNA: f64 = 3e-9;

/// Potassium leak conductance, S/dm².
pub const GK: f64 = 5e-8;

/// Chloride leak conductance, S/dm².
pub const GCL: f64 = 5e-8;

/// ATPase pump stoichiometry: sodium ions extruded per cycle.
pub const CNA: f64 = 3.0;

/// ATPase pump stoichiometry: potassium ions imported per cycle.
pub const CK: f64 = 2.0;

/// Default constant element of the pump rate, mol C⁻¹ dm⁻² s⁻¹.
pub const DEFAULT_PUMP_RATE: f64 = 1e-5 / FARADAY;

/// Extracellular sodium concentration, M.
pub const NAO: f64 = 138e-3;

/// Extracellular chloride concentration, M.
pub const CLO: f64 = 119e-3;

/// Extracellular potassium concentration, M.
pub const KO: f64 = 2.8e-3;

/// Extracellular impermeant-anion concentration, M.
pub const XO: f64 = 21.8e-3;

/// Extracellular (target) osmolarity, M. Fixed for the whole simulation.
pub const OSO: f64 = XO + NAO + CLO + KO;

/// Default compartment radius, dm (5 µm).
pub const DEFAULT_RADIUS: f64 = 5e-5;

/// Default compartment length, dm (100 µm).
pub const DEFAULT_LENGTH: f64 = 100e-5;

/// Specific membrane capacitance, F/dm².
pub const CAPACITANCE: f64 = 7e-6;

/// Membrane folding factor (Fraser and Huang): infolding multiplies
/// the effective membrane area over the smooth cylindrical surface.
/// At the default radius this yields an area-to-volume ratio of
/// 4·10⁶ dm⁻¹.
pub const MEMBRANE_FOLDING: f64 = 100.0;

/// Partial molar volume of water, L/mol.
pub const VW: f64 = 0.018;

/// Default osmotic water permeability, dm/s.
pub const DEFAULT_PW: f64 = 0.0015;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermal_voltage_is_about_26_mv() {
        assert!((RTF - 0.0257).abs() < 1e-3, "RTF = {RTF}");
    }

    #[test]
    fn target_osmolarity_sums_extracellular_species() {
        assert!((OSO - 0.2816).abs() < 1e-12, "OSO = {OSO}");
    }

    #[test]
    fn folded_area_to_volume_ratio_matches_fraser_huang() {
        // ar = folding · 2πrL / (πr²L) = 2·folding/r.
        let ar = 2.0 * MEMBRANE_FOLDING / DEFAULT_RADIUS;
        assert!((ar - 4e6).abs() < 1e-6, "ar = {ar}");
    }

    #[test]
    fn default_pump_rate_is_positive_and_small() {
        assert!(DEFAULT_PUMP_RATE > 0.0);
        assert!(DEFAULT_PUMP_RATE < 1e-9);
    }
}
