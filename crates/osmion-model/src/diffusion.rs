//! Electrodiffusion between two compartments: Fick's law plus an
//! electrophoretic drift term, per configured ion.
//!
//! The flux applied to one endpoint is the exact negative of the flux
//! applied to the other, normalized by each compartment's own length,
//! so total ion moles exchanged across the link are conserved.

use smallvec::SmallVec;

use osmion_core::constants::{K_B, Q_E, TEMPERATURE};
use osmion_core::{CompartmentId, DiffusionError, Ion, StepError};

use crate::compartment::Compartment;
use crate::context::StepContext;
use crate::update::Field;

/// One diffusing species: coefficient, derived mobility, and the last
/// computed net flux, kept for inspection.
#[derive(Clone, Copy, Debug)]
struct Channel {
    ion: Ion,
    /// Diffusion coefficient, dm²/s.
    d: f64,
    /// Electrophoretic mobility, dm²/(V·s).
    mu: f64,
    last_flux: f64,
}

/// A diffusion link between two compartments.
///
/// Holds compartment IDs rather than references; the simulator resolves
/// them each tick. `step` recomputes the midpoint separation every tick
/// because compartment lengths change under volume dynamics.
#[derive(Clone, Debug)]
pub struct Diffusion {
    a: CompartmentId,
    b: CompartmentId,
    ions: SmallVec<[Channel; 3]>,
    dx: f64,
}

impl Diffusion {
    /// Start building a link between `a` and `b`.
    pub fn builder(a: CompartmentId, b: CompartmentId) -> DiffusionBuilder {
        DiffusionBuilder::new(a, b)
    }

    /// First endpoint.
    pub fn a(&self) -> CompartmentId {
        self.a
    }

    /// Second endpoint.
    pub fn b(&self) -> CompartmentId {
        self.b
    }

    /// Midpoint separation as of the last tick, dm.
    pub fn separation(&self) -> f64 {
        self.dx
    }

    /// Net flux of `ion` computed on the last tick, signed toward `a`.
    /// `None` if the ion is not configured on this link.
    pub fn net_flux(&self, ion: Ion) -> Option<f64> {
        self.ions.iter().find(|c| c.ion == ion).map(|c| c.last_flux)
    }

    /// Einstein-relation mobility for a diffusion coefficient,
    /// dm²/(V·s) from dm²/s.
    pub fn mobility(d: f64, ion: Ion) -> f64 {
        d * Q_E * ion.valence().abs() / (K_B * TEMPERATURE)
    }

    /// Compute this tick's fluxes against the frozen snapshot and
    /// enqueue the concentration deltas for both endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::UnknownCompartment`] if an endpoint ID does
    /// not resolve; unreachable through the simulator's registration
    /// API, which validates both endpoints.
    pub fn step(
        &mut self,
        compartments: &[Compartment],
        ctx: &mut StepContext<'_>,
    ) -> Result<(), StepError> {
        let a = compartments
            .get(self.a.0 as usize)
            .ok_or(StepError::UnknownCompartment(self.a))?;
        let b = compartments
            .get(self.b.0 as usize)
            .ok_or(StepError::UnknownCompartment(self.b))?;

        self.dx = a.length() / 2.0 + b.length() / 2.0;
        let dv = a.voltage() - b.voltage();
        let dt = ctx.dt();

        for ch in &mut self.ions {
            let ca = a.concentration(ch.ion);
            let cb = b.concentration(ch.ion);
            let fick = -ch.d * (ca - cb) / self.dx;
            let drift = -(ch.mu * ch.ion.valence() * dv / self.dx) * (ca + cb);
            let j = (fick + drift / 2.0) * dt;
            ch.last_flux = j;

            let field = match ch.ion {
                Ion::Na => Field::Nai,
                Ion::K => Field::Ki,
                Ion::Cl => Field::Cli,
            };
            // Dividing by each endpoint's own length converts the
            // shared flux into per-compartment concentration deltas
            // that conserve total moles for equal radii.
            ctx.change(self.a, field, j / a.length());
            ctx.change(self.b, field, -j / b.length());
        }
        Ok(())
    }
}

/// Builds a [`Diffusion`], validating endpoints and coefficients.
#[derive(Clone, Debug)]
pub struct DiffusionBuilder {
    a: CompartmentId,
    b: CompartmentId,
    ions: SmallVec<[(Ion, f64); 3]>,
}

impl DiffusionBuilder {
    /// A link between `a` and `b` with no species yet.
    pub fn new(a: CompartmentId, b: CompartmentId) -> Self {
        Self {
            a,
            b,
            ions: SmallVec::new(),
        }
    }

    /// Let `ion` diffuse across the link with coefficient `d`, dm²/s.
    pub fn ion(mut self, ion: Ion, d: f64) -> Self {
        self.ions.push((ion, d));
        self
    }

    /// Validate and construct the link.
    ///
    /// # Errors
    ///
    /// [`DiffusionError::SelfCoupling`] if both endpoints are the same
    /// compartment, [`DiffusionError::NoIons`] if no species were
    /// added, [`DiffusionError::DuplicateIon`] for a repeated species,
    /// [`DiffusionError::InvalidCoefficient`] for a non-positive or
    /// non-finite coefficient.
    pub fn build(self) -> Result<Diffusion, DiffusionError> {
        if self.a == self.b {
            return Err(DiffusionError::SelfCoupling);
        }
        if self.ions.is_empty() {
            return Err(DiffusionError::NoIons);
        }
        let mut channels: SmallVec<[Channel; 3]> = SmallVec::new();
        for (ion, d) in self.ions {
            if channels.iter().any(|c| c.ion == ion) {
                return Err(DiffusionError::DuplicateIon(ion));
            }
            if !d.is_finite() || d <= 0.0 {
                return Err(DiffusionError::InvalidCoefficient { ion, value: d });
            }
            channels.push(Channel {
                ion,
                d,
                mu: Diffusion::mobility(d, ion),
                last_flux: 0.0,
            });
        }
        Ok(Diffusion {
            a: self.a,
            b: self.b,
            ions: channels,
            dx: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::UpdateKind;

    // 2.03 µm²/ms expressed in dm²/s.
    const D_CL: f64 = 2.03e-7;

    fn pair() -> (Compartment, Compartment) {
        let a = Compartment::builder("a")
            .z(-0.85)
            .cli(0.015292947537423218)
            .ki(0.023836660428807395)
            .nai(0.1135388427892471)
            .build()
            .unwrap();
        let b = a.duplicate("b");
        (a, b)
    }

    #[test]
    fn builder_rejects_degenerate_links() {
        let id = CompartmentId(0);
        assert!(matches!(
            Diffusion::builder(id, id).ion(Ion::Cl, D_CL).build(),
            Err(DiffusionError::SelfCoupling)
        ));
        assert!(matches!(
            Diffusion::builder(CompartmentId(0), CompartmentId(1)).build(),
            Err(DiffusionError::NoIons)
        ));
        assert!(matches!(
            Diffusion::builder(CompartmentId(0), CompartmentId(1))
                .ion(Ion::Cl, D_CL)
                .ion(Ion::Cl, D_CL)
                .build(),
            Err(DiffusionError::DuplicateIon(Ion::Cl))
        ));
        assert!(matches!(
            Diffusion::builder(CompartmentId(0), CompartmentId(1))
                .ion(Ion::Cl, -1.0)
                .build(),
            Err(DiffusionError::InvalidCoefficient { .. })
        ));
    }

    #[test]
    fn einstein_relation_mobility() {
        // mu/D = q/(kT) ≈ 38.9 V⁻¹ for a monovalent ion at 25 °C.
        let mu = Diffusion::mobility(D_CL, Ion::Cl);
        assert!((mu / D_CL - 38.94).abs() < 0.1);
    }

    #[test]
    fn identical_endpoints_produce_zero_flux() {
        let (a, b) = pair();
        let comps = vec![a, b];
        let mut d = Diffusion::builder(CompartmentId(0), CompartmentId(1))
            .ion(Ion::Cl, D_CL)
            .build()
            .unwrap();
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        d.step(&comps, &mut ctx).unwrap();
        drop(ctx);
        assert!(d.net_flux(Ion::Cl).unwrap().abs() < 1e-30);
        for u in &queue {
            if let UpdateKind::Change { delta, .. } = u.kind {
                assert!(delta.abs() < 1e-30);
            }
        }
    }

    #[test]
    fn flux_runs_down_the_concentration_gradient() {
        let (a, mut b) = pair();
        b.apply(UpdateKind::Change {
            field: Field::Cli,
            delta: 1e-3,
        });
        let comps = vec![a, b];
        let mut d = Diffusion::builder(CompartmentId(0), CompartmentId(1))
            .ion(Ion::Cl, D_CL)
            .build()
            .unwrap();
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        d.step(&comps, &mut ctx).unwrap();
        drop(ctx);
        // b is richer in chloride, so a gains.
        let j = d.net_flux(Ion::Cl).unwrap();
        assert!(j > 0.0);
        match queue[0].kind {
            UpdateKind::Change { delta, .. } => assert!(delta > 0.0),
            _ => panic!("expected a concentration change"),
        }
    }

    #[test]
    fn paired_deltas_conserve_moles_for_equal_radii() {
        let (a, mut b) = pair();
        b.apply(UpdateKind::Change {
            field: Field::Cli,
            delta: 5e-3,
        });
        let wa = a.volume();
        let wb = b.volume();
        let comps = vec![a, b];
        let mut d = Diffusion::builder(CompartmentId(0), CompartmentId(1))
            .ion(Ion::Cl, D_CL)
            .build()
            .unwrap();
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        d.step(&comps, &mut ctx).unwrap();
        drop(ctx);
        let mut moles = 0.0;
        for u in &queue {
            if let UpdateKind::Change { delta, .. } = u.kind {
                let w = if u.target == CompartmentId(0) { wa } else { wb };
                moles += delta * w;
            }
        }
        assert!(moles.abs() < 1e-25, "net moles created: {moles}");
    }

    #[test]
    fn separation_tracks_half_lengths() {
        let (a, b) = pair();
        let expect = a.length() / 2.0 + b.length() / 2.0;
        let comps = vec![a, b];
        let mut d = Diffusion::builder(CompartmentId(0), CompartmentId(1))
            .ion(Ion::Cl, D_CL)
            .build()
            .unwrap();
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        d.step(&comps, &mut ctx).unwrap();
        assert!((d.separation() - expect).abs() < 1e-18);
    }

    #[test]
    fn dangling_endpoint_is_a_step_error() {
        let (a, _) = pair();
        let comps = vec![a];
        let mut d = Diffusion::builder(CompartmentId(0), CompartmentId(7))
            .ion(Ion::Cl, D_CL)
            .build()
            .unwrap();
        let mut queue = Vec::new();
        let mut ctx = StepContext::new(0.0, 1e-3, &mut queue);
        assert_eq!(
            d.step(&comps, &mut ctx),
            Err(StepError::UnknownCompartment(CompartmentId(7)))
        );
    }
}
