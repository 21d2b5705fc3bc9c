//! A compartment: one well-mixed cylindrical segment of a neuron with
//! its own ionic concentrations, membrane voltage, and volume.
//!
//! Each tick a compartment recomputes its derived electrochemistry
//! from the frozen snapshot, solves the leak/pump/cotransporter flux
//! equations for one `dt`, and enqueues the results as deferred
//! updates. The last update it enqueues is its own
//! [`update_values`](Compartment::update_values) finalizer, which runs
//! after the raw concentration deltas have committed and performs the
//! osmotic volume correction.

use osmion_core::constants::{
    CAPACITANCE, CK, CLO, CNA, DEFAULT_LENGTH, DEFAULT_PUMP_RATE, DEFAULT_PW, DEFAULT_RADIUS,
    FARADAY, GCL, GK, GNA, KO, MEMBRANE_FOLDING, NAO, OSO, RTF, VW, XO,
};
use osmion_core::{CompartmentError, CompartmentId, Ion};

use crate::context::StepContext;
use crate::update::{Field, UpdateKind};

/// Which dimension absorbs a volume change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeometryMode {
    /// Radius is fixed; length follows volume (`L = w / πr²`).
    #[default]
    VariableLength,
    /// Length is fixed; radius follows volume (`r = √(w / πL)`).
    VariableRadius,
}

/// Membrane-tension correction, active in stretch mode.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Stretch {
    /// Penalty per unit radius deviation, M/dm.
    tension: f64,
    /// Resting radius captured at construction, dm.
    r_rest: f64,
}

/// Linear upregulation of the KCC2 pump rate over time.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Kcc2Ramp {
    /// Increase per second.
    rate: f64,
    /// Ceiling; the ramp stops once `pkcc2` reaches it.
    max: f64,
}

/// One well-mixed cylindrical compartment.
///
/// State changes only through [`apply`](Compartment::apply) during the
/// commit phase; [`step`](Compartment::step) takes `&self` and cannot
/// mutate anything.
#[derive(Clone, Debug)]
pub struct Compartment {
    name: String,

    // ── Geometry ──
    radius: f64,
    length: f64,
    w: f64,
    w2: f64,
    sa: f64,
    ar: f64,
    geometry: GeometryMode,
    stretch: Option<Stretch>,

    // ── Ionic state, M ──
    nai: f64,
    ki: f64,
    cli: f64,
    /// Fixed (immobile) impermeant-anion fraction.
    xm: f64,
    /// Mobile impermeant-anion fraction. Without a configured split
    /// this holds all of `xi` and `xm` is zero.
    x_mobile: f64,
    /// Valence of the fixed fraction.
    xm_z: f64,
    /// Valence of the mobile fraction.
    x_z: f64,
    /// Effective average impermeant-anion valence.
    z: f64,
    /// Mobile-charge decay rate, per second. Zero disables the decay.
    dz: f64,

    // ── Derived, recomputed each tick ──
    v: f64,
    osi: f64,
    jp: f64,
    jkcc2: f64,
    ek: f64,
    ecl: f64,

    // ── Membrane parameters ──
    gna: f64,
    gk: f64,
    gcl: f64,
    gx: f64,
    p: f64,
    pkcc2: f64,
    ramp: Option<Kcc2Ramp>,
    pw: f64,
}

impl Compartment {
    /// Start building a compartment with the given name and default
    /// parameters.
    pub fn builder(name: impl Into<String>) -> CompartmentBuilder {
        CompartmentBuilder::new(name)
    }

    /// Compartment name, used for keyed lookup in the simulator.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Radius, dm.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Length, dm.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Volume, L.
    pub fn volume(&self) -> f64 {
        self.w
    }

    /// Effective membrane surface area, dm². Includes the
    /// [`MEMBRANE_FOLDING`] factor over the smooth cylindrical surface.
    pub fn surface_area(&self) -> f64 {
        self.sa
    }

    /// Membrane voltage, V.
    pub fn voltage(&self) -> f64 {
        self.v
    }

    /// Intracellular sodium, M.
    pub fn nai(&self) -> f64 {
        self.nai
    }

    /// Intracellular potassium, M.
    pub fn ki(&self) -> f64 {
        self.ki
    }

    /// Intracellular chloride, M.
    pub fn cli(&self) -> f64 {
        self.cli
    }

    /// Total impermeant-anion concentration, M.
    pub fn xi(&self) -> f64 {
        self.xm + self.x_mobile
    }

    /// Effective impermeant-anion valence.
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Intracellular osmolarity as of the last commit, M.
    pub fn osmolarity(&self) -> f64 {
        self.osi
    }

    /// KCC2 pump-rate parameter.
    pub fn pkcc2(&self) -> f64 {
        self.pkcc2
    }

    /// Intracellular concentration of a permeant species, M.
    pub fn concentration(&self, ion: Ion) -> f64 {
        match ion {
            Ion::Na => self.nai,
            Ion::K => self.ki,
            Ion::Cl => self.cli,
        }
    }

    /// Sodium Nernst potential, V.
    pub fn ena(&self) -> f64 {
        RTF * (NAO / self.nai).ln()
    }

    /// Potassium Nernst potential as of the last commit, V.
    pub fn ek(&self) -> f64 {
        self.ek
    }

    /// Chloride Nernst potential as of the last commit, V.
    pub fn ecl(&self) -> f64 {
        self.ecl
    }

    /// Keyed read access for observers. Returns `None` for an unknown
    /// key. Keys mirror the field names used in plots and data dumps.
    pub fn value(&self, key: &str) -> Option<f64> {
        Some(match key {
            "nai" => self.nai,
            "ki" => self.ki,
            "cli" => self.cli,
            "xi" => self.xi(),
            "z" => self.z,
            "v" => self.v,
            "w" => self.w,
            "radius" => self.radius,
            "length" => self.length,
            "osi" => self.osi,
            "jp" => self.jp,
            "jkcc2" => self.jkcc2,
            "ek" => self.ek,
            "ecl" => self.ecl,
            "ena" => self.ena(),
            "pkcc2" => self.pkcc2,
            "gx" => self.gx,
            _ => return None,
        })
    }

    /// An independent copy of this compartment's current state under a
    /// new name. The copy is not registered anywhere.
    pub fn duplicate(&self, name: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.name = name.into();
        copy
    }

    /// Split the impermeant anions into a fixed fraction `ratio` and a
    /// mobile remainder, both starting at the current valence. Used to
    /// model anion-flux events where only part of the pool moves.
    ///
    /// # Errors
    ///
    /// Returns [`CompartmentError::InvalidRatio`] unless `ratio` lies
    /// strictly between zero and one.
    pub fn set_anion_ratio(&mut self, ratio: f64) -> Result<(), CompartmentError> {
        if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
            return Err(CompartmentError::InvalidRatio { ratio });
        }
        let xi = self.xi();
        self.xm = ratio * xi;
        self.x_mobile = (1.0 - ratio) * xi;
        self.xm_z = self.z;
        self.x_z = self.z;
        Ok(())
    }

    /// Set the mobile-charge decay rate, per second. Nonzero rates
    /// drive the per-tick valence evolution.
    pub fn set_anion_flux_rate(&mut self, dz: f64) {
        self.dz = dz;
    }

    /// Set the anion leak conductance, S/dm². Zero disables the leak.
    pub fn set_gx(&mut self, gx: f64) {
        self.gx = gx;
    }

    /// Voltage scaling constant F/(C·Ar), V·L/mol.
    fn voltage_scale(&self) -> f64 {
        FARADAY / (CAPACITANCE * self.ar)
    }

    fn charge_voltage(&self) -> f64 {
        self.voltage_scale() * (self.nai + self.ki - self.cli + self.z * self.xi())
    }

    /// Compute one tick's worth of physics against the frozen snapshot
    /// and enqueue the results.
    ///
    /// Enqueue order matters: derived-value `Set`s first, then the
    /// concentration `Change`s, then the `update_values` finalizer,
    /// which relies on FIFO commit order to observe the committed
    /// deltas of this same tick.
    pub fn step(&self, id: CompartmentId, ctx: &mut StepContext<'_>) {
        let dt = ctx.dt();
        let xi = self.xi();

        let v = self.charge_voltage();
        let jp = self.p * (self.nai / NAO).powi(3);
        let ek = RTF * (KO / self.ki).ln();
        let ecl = RTF * (self.cli / CLO).ln();
        let jkcc2 = self.pkcc2 * (ek - ecl);

        let osi = self.nai + self.ki + self.cli + xi;
        let mut driving = osi - OSO;
        if let Some(s) = self.stretch {
            driving -= s.tension * (self.radius - s.r_rest);
        }
        let w2 = self.w + dt * VW * self.pw * self.sa * driving;

        ctx.set(id, Field::V, v);
        ctx.set(id, Field::Jp, jp);
        ctx.set(id, Field::Ek, ek);
        ctx.set(id, Field::Ecl, ecl);
        ctx.set(id, Field::Jkcc2, jkcc2);
        ctx.set(id, Field::W2, w2);

        if let Some(ramp) = self.ramp {
            if self.pkcc2 < ramp.max {
                let delta = (ramp.rate * dt).min(ramp.max - self.pkcc2);
                ctx.change(id, Field::Pkcc2, delta);
            }
        }

        if self.dz != 0.0 && xi > 0.0 {
            let xz = self.x_z - self.dz * dt;
            let z = (self.xm * self.xm_z + self.x_mobile * xz) / xi;
            ctx.set(id, Field::Xz, xz);
            ctx.set(id, Field::Z, z);
        }

        let ena = RTF * (NAO / self.nai).ln();
        let dna = -dt * self.ar * (self.gna * (v - ena) + CNA * jp);
        let dk = -dt * self.ar * (self.gk * (v - ek) - CK * jp + jkcc2);
        let dcl = dt * self.ar * (self.gcl * (v - ecl) - jkcc2);

        ctx.change(id, Field::Nai, dna);
        ctx.change(id, Field::Ki, dk);
        ctx.change(id, Field::Cli, dcl);

        if self.gx != 0.0 && self.x_mobile > 0.0 {
            let ex = (RTF / self.z) * (XO / xi).ln();
            let dx = dt * self.ar * self.gx * (v - ex);
            ctx.change(id, Field::XiMobile, dx);
        }

        ctx.finalize(id, Compartment::update_values);
    }

    /// Osmotic volume correction, run as a commit-phase finalizer after
    /// this tick's concentration deltas have been applied.
    ///
    /// Rescaling every concentration by `w / w2` conserves total moles
    /// across the volume change; geometry then follows the new volume
    /// per the configured [`GeometryMode`].
    pub fn update_values(&mut self) {
        self.osi = self.nai + self.ki + self.cli + self.xi();
        let scale = self.w / self.w2;
        self.nai *= scale;
        self.ki *= scale;
        self.cli *= scale;
        self.xm *= scale;
        self.x_mobile *= scale;
        self.w = self.w2;
        match self.geometry {
            GeometryMode::VariableLength => {
                self.length = self.w / (std::f64::consts::PI * self.radius * self.radius);
            }
            GeometryMode::VariableRadius => {
                self.radius = (self.w / (std::f64::consts::PI * self.length)).sqrt();
            }
        }
        self.sa = MEMBRANE_FOLDING * 2.0 * std::f64::consts::PI * self.radius * self.length;
        self.ar = self.sa / self.w;
    }

    /// Apply one committed update.
    pub fn apply(&mut self, kind: UpdateKind) {
        match kind {
            UpdateKind::Change { field, delta } => *self.field_mut(field) += delta,
            UpdateKind::Set { field, value } => *self.field_mut(field) = value,
            UpdateKind::Function(f) => f(self),
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut f64 {
        match field {
            Field::Nai => &mut self.nai,
            Field::Ki => &mut self.ki,
            Field::Cli => &mut self.cli,
            Field::XiMobile => &mut self.x_mobile,
            Field::Xz => &mut self.x_z,
            Field::Z => &mut self.z,
            Field::V => &mut self.v,
            Field::W2 => &mut self.w2,
            Field::Jp => &mut self.jp,
            Field::Jkcc2 => &mut self.jkcc2,
            Field::Ek => &mut self.ek,
            Field::Ecl => &mut self.ecl,
            Field::Pkcc2 => &mut self.pkcc2,
        }
    }
}

/// Builds a [`Compartment`], validating the physical state.
///
/// Chloride may be given explicitly or left to be derived from bulk
/// electroneutrality and the fixed target osmolarity.
#[derive(Clone, Debug)]
pub struct CompartmentBuilder {
    name: String,
    radius: f64,
    length: f64,
    z: f64,
    nai: f64,
    ki: f64,
    cli: Option<f64>,
    pkcc2: f64,
    p: f64,
    gna: f64,
    gk: f64,
    gcl: f64,
    gx: f64,
    pw: f64,
    geometry: GeometryMode,
    stretch: Option<f64>,
    ramp: Option<(f64, f64)>,
    dz: f64,
}

impl CompartmentBuilder {
    /// Defaults: 5 µm radius, 100 µm length, `z = −1`, resting
    /// concentrations, no cotransport, standard leak conductances.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            radius: DEFAULT_RADIUS,
            length: DEFAULT_LENGTH,
            z: -1.0,
            nai: 140e-3,
            ki: 2.5e-3,
            cli: Some(78.3931e-3),
            pkcc2: 0.0,
            p: DEFAULT_PUMP_RATE,
            gna: GNA,
            gk: GK,
            gcl: GCL,
            gx: 0.0,
            pw: DEFAULT_PW,
            geometry: GeometryMode::default(),
            stretch: None,
            ramp: None,
            dz: 0.0,
        }
    }

    /// Radius, dm.
    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Length, dm.
    pub fn length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    /// Impermeant-anion valence. Must be nonzero; physically negative.
    pub fn z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }

    /// Initial intracellular sodium, M.
    pub fn nai(mut self, nai: f64) -> Self {
        self.nai = nai;
        self
    }

    /// Initial intracellular potassium, M.
    pub fn ki(mut self, ki: f64) -> Self {
        self.ki = ki;
        self
    }

    /// Initial intracellular chloride, M.
    pub fn cli(mut self, cli: f64) -> Self {
        self.cli = Some(cli);
        self
    }

    /// Derive chloride from bulk electroneutrality and the target
    /// osmolarity instead of giving it explicitly.
    pub fn derive_chloride(mut self) -> Self {
        self.cli = None;
        self
    }

    /// KCC2 pump-rate parameter.
    pub fn pkcc2(mut self, pkcc2: f64) -> Self {
        self.pkcc2 = pkcc2;
        self
    }

    /// Constant element of the ATPase pump rate.
    pub fn pump_rate(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    /// Sodium leak conductance, S/dm².
    pub fn gna(mut self, gna: f64) -> Self {
        self.gna = gna;
        self
    }

    /// Potassium leak conductance, S/dm².
    pub fn gk(mut self, gk: f64) -> Self {
        self.gk = gk;
        self
    }

    /// Chloride leak conductance, S/dm².
    pub fn gcl(mut self, gcl: f64) -> Self {
        self.gcl = gcl;
        self
    }

    /// Impermeant-anion leak conductance, S/dm². Zero disables it.
    pub fn gx(mut self, gx: f64) -> Self {
        self.gx = gx;
        self
    }

    /// Osmotic water permeability, dm/s.
    pub fn pw(mut self, pw: f64) -> Self {
        self.pw = pw;
        self
    }

    /// Which dimension absorbs volume changes.
    pub fn geometry(mut self, mode: GeometryMode) -> Self {
        self.geometry = mode;
        self
    }

    /// Enable the membrane-tension correction with the given penalty
    /// coefficient, M/dm. The resting radius is captured at build time.
    pub fn stretch(mut self, tension: f64) -> Self {
        self.stretch = Some(tension);
        self
    }

    /// Ramp `pkcc2` up at `rate` per second until it reaches `max`.
    pub fn kcc2_ramp(mut self, rate: f64, max: f64) -> Self {
        self.ramp = Some((rate, max));
        self
    }

    /// Mobile-charge decay rate, per second.
    pub fn anion_flux_rate(mut self, dz: f64) -> Self {
        self.dz = dz;
        self
    }

    /// Validate and construct the compartment.
    ///
    /// # Errors
    ///
    /// - [`CompartmentError::InvalidGeometry`] for a non-positive or
    ///   non-finite radius or length.
    /// - [`CompartmentError::ZeroValence`] for `z = 0`.
    /// - [`CompartmentError::IndeterminateChloride`] when chloride is
    ///   derived and `z = −1` makes the neutrality system singular.
    /// - [`CompartmentError::NegativeChloride`] /
    ///   [`CompartmentError::NegativeImpermeant`] for initial states
    ///   with a negative concentration.
    pub fn build(self) -> Result<Compartment, CompartmentError> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(CompartmentError::InvalidGeometry {
                reason: format!("radius {} dm", self.radius),
            });
        }
        if !self.length.is_finite() || self.length <= 0.0 {
            return Err(CompartmentError::InvalidGeometry {
                reason: format!("length {} dm", self.length),
            });
        }
        if self.z == 0.0 {
            return Err(CompartmentError::ZeroValence);
        }

        let cli = match self.cli {
            Some(cli) => cli,
            None => {
                // Solve cli + z·xi = −(nai + ki) (electroneutrality)
                // and nai + ki + cli + xi = OSO simultaneously.
                if self.z == -1.0 {
                    return Err(CompartmentError::IndeterminateChloride);
                }
                (self.z * OSO - (self.z - 1.0) * (self.nai + self.ki)) / (self.z + 1.0)
            }
        };
        if cli < 0.0 {
            return Err(CompartmentError::NegativeChloride { cli });
        }
        let xi = (cli - self.ki - self.nai) / self.z;
        if xi < 0.0 {
            return Err(CompartmentError::NegativeImpermeant { xi });
        }

        let osi = self.nai + self.ki + cli + xi;
        if (osi - OSO).abs() > 1e-9 {
            tracing::warn!(
                name = %self.name,
                osi,
                target = OSO,
                "initial state is not osmotically neutral; volume will drift"
            );
        }

        let w = std::f64::consts::PI * self.radius * self.radius * self.length;
        let sa = MEMBRANE_FOLDING * 2.0 * std::f64::consts::PI * self.radius * self.length;
        let ar = sa / w;

        let mut comp = Compartment {
            name: self.name,
            radius: self.radius,
            length: self.length,
            w,
            w2: w,
            sa,
            ar,
            geometry: self.geometry,
            stretch: self.stretch.map(|tension| Stretch {
                tension,
                r_rest: self.radius,
            }),
            nai: self.nai,
            ki: self.ki,
            cli,
            xm: 0.0,
            x_mobile: xi,
            xm_z: self.z,
            x_z: self.z,
            z: self.z,
            dz: self.dz,
            v: 0.0,
            osi,
            jp: 0.0,
            jkcc2: 0.0,
            ek: 0.0,
            ecl: 0.0,
            gna: self.gna,
            gk: self.gk,
            gcl: self.gcl,
            gx: self.gx,
            p: self.p,
            pkcc2: self.pkcc2,
            ramp: self.ramp.map(|(rate, max)| Kcc2Ramp { rate, max }),
            pw: self.pw,
        };
        comp.v = comp.charge_voltage();
        comp.jp = comp.p * (comp.nai / NAO).powi(3);
        comp.ek = RTF * (KO / comp.ki).ln();
        comp.ecl = RTF * (comp.cli / CLO).ln();
        comp.jkcc2 = comp.pkcc2 * (comp.ek - comp.ecl);
        Ok(comp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::DeferredUpdate;
    use proptest::prelude::*;

    // Near-steady resting state used across the test suite.
    fn resting() -> CompartmentBuilder {
        Compartment::builder("c")
            .z(-0.85)
            .cli(0.015292947537423218)
            .ki(0.023836660428807395)
            .nai(0.1135388427892471)
    }

    #[test]
    fn derives_impermeant_anions_from_neutrality() {
        let c = resting().build().unwrap();
        let expected = (c.cli() - c.ki() - c.nai()) / c.z();
        assert!((c.xi() - expected).abs() < 1e-15);
        assert!(c.xi() > 0.0);
    }

    #[test]
    fn derived_chloride_is_neutral_and_isotonic() {
        let c = Compartment::builder("c")
            .z(-0.85)
            .nai(0.1135)
            .ki(0.0238)
            .derive_chloride()
            .build()
            .unwrap();
        // Bulk charge: nai + ki − cli + z·xi = 0.
        let charge = c.nai() + c.ki() - c.cli() + c.z() * c.xi();
        assert!(charge.abs() < 1e-12, "residual charge {charge}");
        assert!((c.osmolarity() - OSO).abs() < 1e-12);
    }

    #[test]
    fn rejects_invalid_initial_states() {
        // Forces a negative derived chloride.
        let err = Compartment::builder("c")
            .z(-0.85)
            .nai(1e-3)
            .ki(1e-3)
            .derive_chloride()
            .build()
            .unwrap_err();
        assert!(matches!(err, CompartmentError::NegativeChloride { .. }));

        // cli < nai + ki with z < 0 makes xi negative.
        let err = Compartment::builder("c")
            .nai(0.2)
            .ki(0.1)
            .cli(0.01)
            .build()
            .unwrap_err();
        assert!(matches!(err, CompartmentError::NegativeImpermeant { .. }));

        let err = Compartment::builder("c").z(0.0).build().unwrap_err();
        assert!(matches!(err, CompartmentError::ZeroValence));

        let err = Compartment::builder("c")
            .z(-1.0)
            .derive_chloride()
            .build()
            .unwrap_err();
        assert!(matches!(err, CompartmentError::IndeterminateChloride));

        // z = −1 with explicit chloride is fine.
        assert!(Compartment::builder("c").z(-1.0).cli(1e-3).nai(1e-3).ki(1e-3).build().is_ok());

        let err = Compartment::builder("c").radius(0.0).build().unwrap_err();
        assert!(matches!(err, CompartmentError::InvalidGeometry { .. }));
    }

    #[test]
    fn step_enqueues_deltas_and_finalizer_in_order() {
        let c = resting().build().unwrap();
        let id = CompartmentId(0);
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        c.step(id, &mut ctx);
        drop(ctx);

        // Derived sets come first, concentration changes after, the
        // finalizer last.
        assert!(matches!(
            queue.first().unwrap().kind,
            UpdateKind::Set { field: Field::V, .. }
        ));
        assert!(matches!(queue.last().unwrap().kind, UpdateKind::Function(_)));
        let change_idx: Vec<usize> = queue
            .iter()
            .enumerate()
            .filter(|(_, u)| matches!(u.kind, UpdateKind::Change { .. }))
            .map(|(i, _)| i)
            .collect();
        let set_idx: Vec<usize> = queue
            .iter()
            .enumerate()
            .filter(|(_, u)| matches!(u.kind, UpdateKind::Set { .. }))
            .map(|(i, _)| i)
            .collect();
        assert!(set_idx.iter().max() < change_idx.iter().min());
    }

    #[test]
    fn step_does_not_mutate_the_compartment() {
        let c = resting().build().unwrap();
        let before = c.clone();
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        c.step(CompartmentId(0), &mut ctx);
        assert_eq!(c.nai(), before.nai());
        assert_eq!(c.volume(), before.volume());
        assert_eq!(c.voltage(), before.voltage());
    }

    #[test]
    fn commit_applies_a_full_tick() {
        let mut c = resting().build().unwrap();
        let id = CompartmentId(0);
        let mut queue: Vec<DeferredUpdate> = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        c.step(id, &mut ctx);
        drop(ctx);
        let moles_na = c.nai() * c.volume();
        for u in queue {
            c.apply(u.kind);
        }
        // Voltage was recomputed, volume committed, concentrations moved.
        assert!(c.voltage().abs() < 1.0);
        assert!((c.volume() - c.w2).abs() < 1e-30);
        // Mole count only changed by the membrane flux, not the rescale.
        let flux = moles_na - c.nai() * c.volume();
        assert!(flux.abs() < 1e-12);
    }

    #[test]
    fn update_values_conserves_moles_across_volume_change() {
        let mut c = resting().build().unwrap();
        let moles: f64 = (c.nai() + c.ki() + c.cli() + c.xi()) * c.volume();
        c.apply(UpdateKind::Set {
            field: Field::W2,
            value: c.volume() * 1.25,
        });
        c.update_values();
        let after: f64 = (c.nai() + c.ki() + c.cli() + c.xi()) * c.volume();
        assert!((moles - after).abs() < moles * 1e-12);
        // Radius fixed, length follows volume by default.
        assert!((c.length() / DEFAULT_LENGTH - 1.25).abs() < 1e-12);
        assert!((c.radius() - DEFAULT_RADIUS).abs() < 1e-30);
    }

    #[test]
    fn variable_radius_mode_keeps_length_fixed() {
        let mut c = resting().geometry(GeometryMode::VariableRadius).build().unwrap();
        c.apply(UpdateKind::Set {
            field: Field::W2,
            value: c.volume() * 4.0,
        });
        c.update_values();
        assert!((c.length() - DEFAULT_LENGTH).abs() < 1e-30);
        assert!((c.radius() / DEFAULT_RADIUS - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stretch_tension_opposes_swelling() {
        // The enqueued tentative volume for one tick.
        fn enqueued_w2(c: &Compartment) -> f64 {
            let mut queue = Vec::new();
            let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
            c.step(CompartmentId(0), &mut ctx);
            drop(ctx);
            queue
                .iter()
                .find_map(|u| match u.kind {
                    UpdateKind::Set {
                        field: Field::W2,
                        value,
                    } => Some(value),
                    _ => None,
                })
                .unwrap()
        }
        fn inflate(c: &mut Compartment) {
            c.apply(UpdateKind::Set {
                field: Field::W2,
                value: c.volume() * 1.5,
            });
            c.update_values();
        }

        let mut free = resting()
            .geometry(GeometryMode::VariableRadius)
            .build()
            .unwrap();
        let mut held = resting()
            .geometry(GeometryMode::VariableRadius)
            .stretch(1e4)
            .build()
            .unwrap();

        // At the resting radius the tension term vanishes.
        assert!((enqueued_w2(&held) - enqueued_w2(&free)).abs() < 1e-30);

        inflate(&mut free);
        inflate(&mut held);
        assert!(held.radius() > DEFAULT_RADIUS);

        // Past the resting radius, tension pulls the tentative volume
        // below the purely osmotic one.
        let w2_free = enqueued_w2(&free);
        let w2_held = enqueued_w2(&held);
        assert!(
            w2_held < w2_free,
            "tension did not oppose swelling: {w2_held} vs {w2_free}"
        );
    }

    #[test]
    fn anion_ratio_splits_the_pool_without_changing_totals() {
        let mut c = resting().build().unwrap();
        let xi = c.xi();
        c.set_anion_ratio(0.98).unwrap();
        assert!((c.xi() - xi).abs() < 1e-15);
        assert!(c.set_anion_ratio(0.0).is_err());
        assert!(c.set_anion_ratio(1.0).is_err());
        assert!(c.set_anion_ratio(f64::NAN).is_err());
    }

    #[test]
    fn anion_flux_rate_drifts_the_effective_valence() {
        let mut c = resting().build().unwrap();
        c.set_anion_ratio(0.98).unwrap();
        c.set_anion_flux_rate(0.1);
        let z_before = c.z();
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        c.step(CompartmentId(0), &mut ctx);
        drop(ctx);
        for u in queue {
            c.apply(u.kind);
        }
        // 98% of the pool keeps its charge; the mobile 2% drifted.
        assert!(c.z() < z_before);
        assert!((c.z() - z_before).abs() < 0.1 * 1e-3);
    }

    #[test]
    fn kcc2_ramp_raises_pkcc2_and_stops_at_the_ceiling() {
        let mut c = resting().kcc2_ramp(1e-9, 2e-12).build().unwrap();
        for _ in 0..10 {
            let mut queue = Vec::new();
            let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
            c.step(CompartmentId(0), &mut ctx);
            drop(ctx);
            for u in queue {
                c.apply(u.kind);
            }
        }
        assert!((c.pkcc2() - 2e-12).abs() < 1e-24);
    }

    #[test]
    fn duplicate_copies_state_under_a_new_name() {
        let c = resting().pkcc2(1e-8).build().unwrap();
        let d = c.duplicate("copy");
        assert_eq!(d.name(), "copy");
        assert_eq!(d.nai(), c.nai());
        assert_eq!(d.pkcc2(), c.pkcc2());
    }

    #[test]
    fn keyed_access_covers_the_observed_fields() {
        let c = resting().build().unwrap();
        for key in [
            "nai", "ki", "cli", "xi", "z", "v", "w", "radius", "length", "osi", "jp", "jkcc2",
            "ek", "ecl", "ena", "pkcc2", "gx",
        ] {
            assert!(c.value(key).is_some(), "missing key {key}");
        }
        assert!(c.value("bogus").is_none());
    }

    proptest! {
        #[test]
        fn rescale_conserves_moles(factor in 0.5f64..2.0) {
            let mut c = resting().build().unwrap();
            let moles = c.nai() * c.volume();
            c.apply(UpdateKind::Set { field: Field::W2, value: c.volume() * factor });
            c.update_values();
            prop_assert!((c.nai() * c.volume() - moles).abs() < moles * 1e-9);
        }

        #[test]
        fn negative_derived_states_always_rejected(nai in 1e-4f64..5e-3, ki in 1e-4f64..5e-3) {
            // Tiny cation totals cannot reach the target osmolarity
            // with a negative-valence anion; chloride goes negative.
            let r = Compartment::builder("c")
                .z(-0.85)
                .nai(nai)
                .ki(ki)
                .derive_chloride()
                .build();
            prop_assert!(
                matches!(r, Err(CompartmentError::NegativeChloride { .. })),
                "expected NegativeChloride error, got {:?}",
                r
            );
        }
    }
}
