//! Construction of parton-level phase-space points from integration variables.
//!
//! Every final state has its own [`PhaseSpaceBuilder`], selected once with [`builder_for`]. The
//! builders process the particle roles in a fixed order: energies that are not integration
//! variables are reconstructed with [`solve`] from the mass constraints of the already built
//! legs.

use crate::error::{Error, Result};
use crate::kinematics::{wrap_phi, LorentzVector, Vector3};
use crate::objects::{Object, Observable};
use crate::physics::{
    DELTA_M2_HIGGS, DELTA_M2_TOP, DELTA_M2_W, HIGGS_MASS, LEPTON_MASS, TOP_MASS,
};
use crate::solver::{solve, NO_SOLUTION};
use crate::topology::{FinalState, Hypothesis, PsVar, Role, TfKind, VarKind};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

/// Bijection between the phase-space variables of a (final state, hypothesis, lost roles)
/// combination and the coordinates of the integration domain.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableMap {
    final_state: FinalState,
    vars: Vec<PsVar>,
    index: BTreeMap<PsVar, usize>,
}

impl VariableMap {
    /// Builds the map. Variables required by the final state come first, followed by the
    /// direction ($\cos\theta$, then $\phi$) of every role in `lost`, in the given order.
    ///
    /// # Errors
    ///
    /// Fails if `hypothesis` cannot be tested in `final_state` or if `lost` contains a role that
    /// is not matched to jets or appears twice.
    pub fn new(final_state: FinalState, hypothesis: Hypothesis, lost: &[Role]) -> Result<Self> {
        if !final_state.supports(hypothesis) {
            return Err(Error::UnsupportedHypothesis(final_state, hypothesis));
        }

        let ttbb = hypothesis == Hypothesis::TTBB;
        let energy = |role| PsVar::new(role, VarKind::Energy);
        let cos = |role| PsVar::new(role, VarKind::CosTheta);
        let phi = |role| PsVar::new(role, VarKind::Phi);

        let mut vars = match final_state {
            FinalState::LH => vec![
                energy(Role::Q1),
                cos(Role::QBar2),
                phi(Role::QBar2),
                energy(Role::B),
            ],
            FinalState::LL => vec![
                cos(Role::QBar1),
                phi(Role::QBar1),
                cos(Role::QBar2),
                phi(Role::QBar2),
                energy(Role::B),
            ],
            FinalState::HH => vec![energy(Role::Q1), energy(Role::Q2), energy(Role::B)],
            FinalState::TTH => vec![
                PsVar::new(Role::T, VarKind::Momentum),
                cos(Role::T),
                phi(Role::T),
                PsVar::new(Role::TBar, VarKind::Momentum),
                cos(Role::TBar),
                phi(Role::TBar),
                PsVar::new(Role::H, VarKind::Pz),
            ],
        };

        if ttbb && final_state.has_decays() {
            vars.push(energy(Role::BBar));
        }

        for (position, &role) in lost.iter().enumerate() {
            if final_state.jet_slot(role).is_none() {
                return Err(Error::InvalidLostRole(final_state, role));
            }

            if lost[..position].contains(&role) {
                return Err(Error::DuplicateLostRole(role));
            }

            vars.push(cos(role));
            vars.push(phi(role));
        }

        let index = vars.iter().enumerate().map(|(i, &var)| (var, i)).collect();

        Ok(Self {
            final_state,
            vars,
            index,
        })
    }

    /// The final state of this map.
    pub const fn final_state(&self) -> FinalState {
        self.final_state
    }

    /// The variables, ordered by their coordinate index.
    pub fn vars(&self) -> &[PsVar] {
        &self.vars
    }

    /// Number of integration variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if there are no integration variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The coordinate index of `var`.
    pub fn index(&self, var: PsVar) -> Option<usize> {
        self.index.get(&var).copied()
    }

    /// Roles whose energy is an integration variable. Their energy windows enter the
    /// permutation constants.
    pub fn energy_roles(&self) -> Vec<Role> {
        self.vars
            .iter()
            .filter(|var| var.kind == VarKind::Energy)
            .map(|var| var.role)
            .collect()
    }

    /// Lower and upper bounds of every coordinate. Energies are fractions in $[0, 1]$ of their
    /// window, polar angles are given by their cosine and azimuths lie in $[-\pi, \pi]$, except
    /// for the neutrino azimuth relative to the missing transverse momentum in the semi-leptonic
    /// final state, which uses `neutrino_phi`. Undecayed tops have momenta up to `emax`, the
    /// longitudinal momentum of the Higgs lies in $[-E_\mathrm{max}/2, E_\mathrm{max}/2]$.
    pub fn bounds(&self, emax: f64, neutrino_phi: (f64, f64)) -> (Vec<f64>, Vec<f64>) {
        self.vars
            .iter()
            .map(|var| match var.kind {
                VarKind::Energy => (0.0, 1.0),
                VarKind::CosTheta if matches!(var.role, Role::T | Role::TBar) => (-0.99, 0.99),
                VarKind::CosTheta => (-1.0, 1.0),
                VarKind::Phi
                    if self.final_state == FinalState::LH && var.role == Role::QBar2 =>
                {
                    neutrino_phi
                }
                VarKind::Phi => (-PI, PI),
                VarKind::Momentum => (0.0, emax),
                VarKind::Pz => (-0.5 * emax, 0.5 * emax),
            })
            .unzip()
    }
}

impl fmt::Display for VariableMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, var) in self.vars.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", i, var)?;
        }
        Ok(())
    }
}

/// A generated parton of a [`PhaseSpacePoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parton {
    /// Four-momentum.
    pub p4: LorentzVector<f64>,
    /// How the parton is compared against the detector.
    pub kind: TfKind,
    /// Electric charge; zero if unknown.
    pub charge: i32,
}

/// One parton per role, built fresh for every evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseSpacePoint {
    partons: [Option<Parton>; 11],
}

impl PhaseSpacePoint {
    /// Removes all partons.
    pub fn clear(&mut self) {
        self.partons = Default::default();
    }

    /// Stores `parton` for `role`.
    pub fn set(&mut self, role: Role, parton: Parton) {
        self.partons[role.index()] = Some(parton);
    }

    /// The parton in `role`, if it was built.
    pub fn get(&self, role: Role) -> Option<&Parton> {
        self.partons[role.index()].as_ref()
    }

    /// The four-momentum of `role`, or the null vector if the role was not built.
    pub fn p4(&self, role: Role) -> LorentzVector<f64> {
        self.get(role).map_or_else(LorentzVector::default, |parton| parton.p4)
    }

    /// Iterates over the built partons in role order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &Parton)> {
        Role::ALL
            .iter()
            .zip(self.partons.iter())
            .filter_map(|(&role, parton)| parton.as_ref().map(|p| (role, p)))
    }
}

/// The observed objects of an event.
#[derive(Clone, Copy, Debug)]
pub struct Event<'a> {
    /// Jets, ordered as in the permutations.
    pub jets: &'a [Object],
    /// Charged leptons.
    pub leptons: &'a [Object],
    /// Missing transverse momentum.
    pub met: Option<&'a Object>,
}

impl<'a> Event<'a> {
    /// The jet matched to `role` by `perm`.
    pub fn jet(
        &self,
        final_state: FinalState,
        perm: &[Option<usize>],
        role: Role,
    ) -> Option<&'a Object> {
        let index = (*perm.get(final_state.jet_slot(role)?)?)?;
        self.jets.get(index)
    }

    /// The lepton matched to `role`.
    pub fn lepton(&self, final_state: FinalState, role: Role) -> Option<&'a Object> {
        self.leptons.get(final_state.lepton_slot(role)?)
    }
}

/// Everything a builder needs besides the integration point and the permutation. Written once
/// per assumption, read-only afterwards.
#[derive(Clone, Copy, Debug)]
pub struct BuildContext<'a> {
    /// Observed objects.
    pub event: Event<'a>,
    /// Variable map of the current assumption.
    pub map: &'a VariableMap,
    /// Hypothesis under test.
    pub hypothesis: Hypothesis,
    /// Upper energy bound for partons without a matched jet.
    pub emax: f64,
}

/// Builds phase-space points for one final state.
pub trait PhaseSpaceBuilder: Send + Sync {
    /// The final state handled by this builder.
    fn final_state(&self) -> FinalState;

    /// Fills `point` from the coordinates `x` and the jet assignment `perm`. Returns `false` if
    /// the point is not physical; all roles are filled nevertheless.
    fn build(
        &self,
        ctx: &BuildContext,
        x: &[f64],
        perm: &[Option<usize>],
        point: &mut PhaseSpacePoint,
    ) -> bool;
}

/// Returns the builder for `final_state`.
pub fn builder_for(final_state: FinalState) -> Box<dyn PhaseSpaceBuilder> {
    match final_state {
        FinalState::LH => Box::new(SemiLeptonic),
        FinalState::LL => Box::new(DiLeptonic),
        FinalState::HH => Box::new(FullyHadronic),
        FinalState::TTH => Box::new(Undecayed),
    }
}

/// Shared state of one build.
struct Legs<'a, 'b> {
    ctx: &'a BuildContext<'b>,
    x: &'a [f64],
    perm: &'a [Option<usize>],
    point: &'a mut PhaseSpacePoint,
    accepted: bool,
}

impl<'a, 'b> Legs<'a, 'b> {
    fn new(
        ctx: &'a BuildContext<'b>,
        x: &'a [f64],
        perm: &'a [Option<usize>],
        point: &'a mut PhaseSpacePoint,
    ) -> Self {
        point.clear();

        Self {
            ctx,
            x,
            perm,
            point,
            accepted: true,
        }
    }

    fn final_state(&self) -> FinalState {
        self.ctx.map.final_state()
    }

    fn value(&self, role: Role, kind: VarKind) -> f64 {
        self.ctx
            .map
            .index(PsVar::new(role, kind))
            .and_then(|i| self.x.get(i).copied())
            .unwrap_or(0.0)
    }

    fn jet(&self, role: Role) -> Option<&'b Object> {
        self.ctx.event.jet(self.final_state(), self.perm, role)
    }

    fn free_direction(&self, role: Role) -> Vector3<f64> {
        Vector3::from_cos_theta_phi(
            self.value(role, VarKind::CosTheta),
            self.value(role, VarKind::Phi),
        )
    }

    fn direction(&self, role: Role) -> Vector3<f64> {
        self.jet(role)
            .map_or_else(|| self.free_direction(role), |jet| jet.p4().vect().unit())
    }

    fn set(
        &mut self,
        role: Role,
        energy: f64,
        mass: f64,
        dir: &Vector3<f64>,
        kind: TfKind,
        charge: i32,
    ) {
        let p4 = LorentzVector::from_direction(dir, energy, mass);
        self.point.set(role, Parton { p4, kind, charge });
    }

    fn solve(
        &mut self,
        parent: &LorentzVector<f64>,
        delta_m2: f64,
        mass: f64,
        dir: &Vector3<f64>,
        target: f64,
    ) -> f64 {
        solve(parent, delta_m2, mass, dir, target).unwrap_or_else(|| {
            self.accepted = false;
            NO_SOLUTION
        })
    }

    /// A quark whose energy is a fraction of the window of its jet, or of $[M, E_\mathrm{max}]$
    /// if it is lost.
    fn quark_from_fraction(&mut self, role: Role) {
        let mass = role.quark_mass();
        let jet = self.jet(role);
        let (low, high) = jet
            .and_then(|jet| jet.energy_window(role.is_b()))
            .unwrap_or((mass, self.ctx.emax));
        let energy = low + (high - low) * self.value(role, VarKind::Energy);
        let dir = self.direction(role);
        self.set(role, energy, mass, &dir, TfKind::for_quark(role, jet.is_some()), 0);
    }

    /// A quark whose energy follows from $p_\mathrm{parent} \cdot p = \Delta M^2$.
    fn quark_from_constraint(&mut self, role: Role, parent: &LorentzVector<f64>, delta_m2: f64) {
        let mass = role.quark_mass();
        let jet = self.jet(role);
        let target = jet.map_or(NO_SOLUTION, |jet| jet.p4().t);
        let dir = self.direction(role);
        let energy = self.solve(parent, delta_m2, mass, &dir, target);
        self.set(role, energy, mass, &dir, TfKind::for_quark(role, jet.is_some()), 0);
    }

    fn lepton(&mut self, role: Role) {
        match self.ctx.event.lepton(self.final_state(), role) {
            Some(lepton) => {
                let charge = lepton.observable(Observable::Charge).unwrap_or(0.0).round() as i32;
                let dir = lepton.p4().vect().unit();
                self.set(role, lepton.p4().t, LEPTON_MASS, &dir, TfKind::MuReco, charge);
            }
            None => self.accepted = false,
        }
    }

    /// A neutrino with free direction whose azimuth is measured relative to `phi_offset`.
    fn neutrino(&mut self, role: Role, lepton: Role, phi_offset: f64) {
        let phi = wrap_phi(self.value(role, VarKind::Phi) + phi_offset);
        let dir = Vector3::from_cos_theta_phi(self.value(role, VarKind::CosTheta), phi);
        let parent = self.point.p4(lepton);
        let energy = self.solve(&parent, DELTA_M2_W, 0.0, &dir, NO_SOLUTION);
        self.set(role, energy, 0.0, &dir, TfKind::Met, 0);
    }

    fn hadronic_top(&mut self, q: Role, qbar: Role, b: Role) {
        self.quark_from_fraction(q);
        let w = self.point.p4(q);
        self.quark_from_constraint(qbar, &w, DELTA_M2_W);
        let w = w + self.point.p4(qbar);
        self.quark_from_constraint(b, &w, DELTA_M2_TOP);
    }

    fn leptonic_top(&mut self, lepton: Role, neutrino: Role, b: Role, phi_offset: f64) {
        self.lepton(lepton);
        self.neutrino(neutrino, lepton, phi_offset);
        let w = self.point.p4(lepton) + self.point.p4(neutrino);
        self.quark_from_constraint(b, &w, DELTA_M2_TOP);
    }

    /// The additional b pair: the second energy is free for tt+bb and fixed by the Higgs mass
    /// otherwise.
    fn b_pair(&mut self) {
        self.quark_from_fraction(Role::B);

        if self.ctx.hypothesis == Hypothesis::TTBB {
            self.quark_from_fraction(Role::BBar);
        } else {
            let b = self.point.p4(Role::B);
            self.quark_from_constraint(Role::BBar, &b, DELTA_M2_HIGGS);
        }
    }
}

/// One top decays hadronically, the other one into a charged lepton and a neutrino.
#[derive(Clone, Copy, Debug, Default)]
pub struct SemiLeptonic;

impl PhaseSpaceBuilder for SemiLeptonic {
    fn final_state(&self) -> FinalState {
        FinalState::LH
    }

    fn build(
        &self,
        ctx: &BuildContext,
        x: &[f64],
        perm: &[Option<usize>],
        point: &mut PhaseSpacePoint,
    ) -> bool {
        let met_phi = ctx.event.met.map_or(0.0, |met| met.p4().phi());
        let mut legs = Legs::new(ctx, x, perm, point);
        legs.hadronic_top(Role::Q1, Role::QBar1, Role::B1);
        legs.leptonic_top(Role::Q2, Role::QBar2, Role::B2, met_phi);
        legs.b_pair();
        legs.accepted
    }
}

/// Both tops decay into a charged lepton and a neutrino.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiLeptonic;

impl PhaseSpaceBuilder for DiLeptonic {
    fn final_state(&self) -> FinalState {
        FinalState::LL
    }

    fn build(
        &self,
        ctx: &BuildContext,
        x: &[f64],
        perm: &[Option<usize>],
        point: &mut PhaseSpacePoint,
    ) -> bool {
        let mut legs = Legs::new(ctx, x, perm, point);
        legs.leptonic_top(Role::Q1, Role::QBar1, Role::B1, 0.0);
        legs.leptonic_top(Role::Q2, Role::QBar2, Role::B2, 0.0);
        legs.b_pair();
        legs.accepted
    }
}

/// Both tops decay hadronically.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullyHadronic;

impl PhaseSpaceBuilder for FullyHadronic {
    fn final_state(&self) -> FinalState {
        FinalState::HH
    }

    fn build(
        &self,
        ctx: &BuildContext,
        x: &[f64],
        perm: &[Option<usize>],
        point: &mut PhaseSpacePoint,
    ) -> bool {
        let mut legs = Legs::new(ctx, x, perm, point);
        legs.hadronic_top(Role::Q1, Role::QBar1, Role::B1);
        legs.hadronic_top(Role::Q2, Role::QBar2, Role::B2);
        legs.b_pair();
        legs.accepted
    }
}

/// Undecayed top pair and Higgs boson. The Higgs balances the transverse momentum of the tops.
#[derive(Clone, Copy, Debug, Default)]
pub struct Undecayed;

impl PhaseSpaceBuilder for Undecayed {
    fn final_state(&self) -> FinalState {
        FinalState::TTH
    }

    fn build(
        &self,
        ctx: &BuildContext,
        x: &[f64],
        perm: &[Option<usize>],
        point: &mut PhaseSpacePoint,
    ) -> bool {
        let mut legs = Legs::new(ctx, x, perm, point);

        let top = |role| {
            let dir = legs.free_direction(role);
            let p = legs.value(role, VarKind::Momentum);
            LorentzVector::from_momentum_mass(&(dir * p), TOP_MASS)
        };
        let t = top(Role::T);
        let tbar = top(Role::TBar);
        let h = LorentzVector::from_momentum_mass(
            &Vector3::new(-(t.x + tbar.x), -(t.y + tbar.y), legs.value(Role::H, VarKind::Pz)),
            HIGGS_MASS,
        );

        for &(role, p4) in [(Role::T, t), (Role::TBar, tbar), (Role::H, h)].iter() {
            legs.point.set(
                role,
                Parton {
                    p4,
                    kind: TfKind::Unknown,
                    charge: 0,
                },
            );
        }

        legs.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectKind;
    use crate::physics::W_MASS;
    use assert_approx_eq::assert_approx_eq;

    fn jet(pt: f64, eta: f64, phi: f64) -> Object {
        windowed(LorentzVector::from_pt_eta_phi_m(pt, eta, phi, 0.0))
    }

    fn windowed(p4: LorentzVector<f64>) -> Object {
        let mut jet = Object::new(p4, ObjectKind::Jet);
        let e = p4.t;
        jet.add_observable(Observable::EnergyLowLight, 0.5 * e);
        jet.add_observable(Observable::EnergyHighLight, 1.5 * e);
        jet.add_observable(Observable::EnergyLowB, 0.5 * e);
        jet.add_observable(Observable::EnergyHighB, 1.5 * e);
        jet
    }

    fn lepton(pt: f64, eta: f64, phi: f64, charge: f64) -> Object {
        let p4 = LorentzVector::from_pt_eta_phi_m(pt, eta, phi, 0.0);
        let mut lepton = Object::new(p4, ObjectKind::Lepton);
        lepton.add_observable(Observable::Charge, charge);
        lepton
    }

    fn semileptonic_event() -> (Vec<Object>, Vec<Object>, Object) {
        let jets = vec![
            jet(70.0, 0.5, 0.3),
            jet(55.0, -0.2, 1.6),
            jet(90.0, 1.0, -0.5),
            jet(80.0, -1.2, 2.8),
            jet(60.0, 0.1, -2.0),
            jet(45.0, 0.7, -1.1),
        ];
        let leptons = vec![lepton(50.0, 0.3, 2.5, -1.0)];
        let met = Object::new(LorentzVector::from_args(40.0, -30.0, 26.0, 0.0), ObjectKind::Met);
        (jets, leptons, met)
    }

    #[test]
    fn test_variable_map_is_a_bijection() {
        let lost_lists: [&[Role]; 3] = [&[], &[Role::B1], &[Role::QBar1, Role::B]];

        for &fs in FinalState::ALL.iter() {
            for &hypo in [Hypothesis::TTH, Hypothesis::TTBB].iter() {
                for lost in lost_lists.iter() {
                    let lost: Vec<_> = lost
                        .iter()
                        .copied()
                        .filter(|&r| fs.jet_slot(r).is_some())
                        .collect();
                    let map = match VariableMap::new(fs, hypo, &lost) {
                        Ok(map) => map,
                        Err(_) => {
                            assert!(!fs.supports(hypo));
                            continue;
                        }
                    };

                    let mut indices: Vec<_> =
                        map.vars().iter().map(|&v| map.index(v).unwrap()).collect();
                    indices.sort_unstable();
                    assert_eq!(indices, (0..map.len()).collect::<Vec<_>>());

                    let n_mets = fs.requires_met() as usize;
                    assert_eq!(
                        map.len(),
                        fs.unknowns(hypo, fs.lepton_count(), n_mets) + 2 * lost.len()
                    );
                }
            }
        }
    }

    #[test]
    fn test_variable_map_layout() {
        let lost = [Role::B1, Role::Q1];
        let map = VariableMap::new(FinalState::LH, Hypothesis::TTBB, &lost).unwrap();
        assert_eq!(map.index(PsVar::new(Role::Q1, VarKind::Energy)), Some(0));
        assert_eq!(map.index(PsVar::new(Role::QBar2, VarKind::CosTheta)), Some(1));
        assert_eq!(map.index(PsVar::new(Role::QBar2, VarKind::Phi)), Some(2));
        assert_eq!(map.index(PsVar::new(Role::B, VarKind::Energy)), Some(3));
        assert_eq!(map.index(PsVar::new(Role::BBar, VarKind::Energy)), Some(4));
        assert_eq!(map.index(PsVar::new(Role::B1, VarKind::CosTheta)), Some(5));
        assert_eq!(map.index(PsVar::new(Role::B1, VarKind::Phi)), Some(6));
        assert_eq!(map.index(PsVar::new(Role::Q1, VarKind::CosTheta)), Some(7));
        assert_eq!(map.index(PsVar::new(Role::Q1, VarKind::Phi)), Some(8));
        assert_eq!(map.energy_roles(), vec![Role::Q1, Role::B, Role::BBar]);
    }

    #[test]
    fn test_variable_map_errors() {
        assert!(matches!(
            VariableMap::new(FinalState::TTH, Hypothesis::TTBB, &[]),
            Err(Error::UnsupportedHypothesis(FinalState::TTH, Hypothesis::TTBB))
        ));
        assert!(matches!(
            VariableMap::new(FinalState::LH, Hypothesis::TTH, &[Role::Q2]),
            Err(Error::InvalidLostRole(FinalState::LH, Role::Q2))
        ));
        assert!(matches!(
            VariableMap::new(FinalState::HH, Hypothesis::TTH, &[Role::B, Role::B]),
            Err(Error::DuplicateLostRole(Role::B))
        ));
    }

    #[test]
    fn test_bounds() {
        let map = VariableMap::new(FinalState::LH, Hypothesis::TTH, &[Role::B2]).unwrap();
        let (lower, upper) = map.bounds(4000.0, (-1.0, 2.0));
        assert_eq!(lower, vec![0.0, -1.0, -1.0, 0.0, -1.0, -PI]);
        assert_eq!(upper, vec![1.0, 1.0, 2.0, 1.0, 1.0, PI]);

        let map = VariableMap::new(FinalState::TTH, Hypothesis::TTH, &[]).unwrap();
        let (lower, upper) = map.bounds(4000.0, (-PI, PI));
        assert_eq!(lower, vec![0.0, -0.99, -PI, 0.0, -0.99, -PI, -2000.0]);
        assert_eq!(upper, vec![4000.0, 0.99, PI, 4000.0, 0.99, PI, 2000.0]);
    }

    #[test]
    fn test_semileptonic_point_is_on_shell() {
        let (jets, leptons, met) = semileptonic_event();
        let map = VariableMap::new(FinalState::LH, Hypothesis::TTH, &[]).unwrap();
        let ctx = BuildContext {
            event: Event {
                jets: &jets,
                leptons: &leptons,
                met: Some(&met),
            },
            map: &map,
            hypothesis: Hypothesis::TTH,
            emax: 4000.0,
        };
        let perm: Vec<_> = (0..6).map(Some).collect();
        let x = [0.4, 0.3, 0.7, 0.6];
        let mut point = PhaseSpacePoint::default();

        assert!(builder_for(FinalState::LH).build(&ctx, &x, &perm, &mut point));

        let w1 = point.p4(Role::Q1) + point.p4(Role::QBar1);
        let w2 = point.p4(Role::Q2) + point.p4(Role::QBar2);
        assert_approx_eq!(w1.mass(), W_MASS, 1e-6);
        assert_approx_eq!(w2.mass(), W_MASS, 1e-6);
        assert_approx_eq!((w1 + point.p4(Role::B1)).mass(), TOP_MASS, 1e-6);
        assert_approx_eq!((w2 + point.p4(Role::B2)).mass(), TOP_MASS, 1e-6);
        assert_approx_eq!((point.p4(Role::B) + point.p4(Role::BBar)).mass(), HIGGS_MASS, 1e-6);

        // energy of the first quark is a fraction of the window of its jet
        let e = jets[0].p4().t;
        assert_approx_eq!(point.p4(Role::Q1).t, 0.5 * e + 0.4 * e, 1e-9);

        // neutrino azimuth is relative to the missing transverse momentum
        let nu = point.get(Role::QBar2).unwrap();
        assert_eq!(nu.kind, TfKind::Met);
        assert_approx_eq!(nu.p4.phi(), wrap_phi(0.7 + met.p4().phi()), 1e-9);
        assert_approx_eq!(nu.p4.vect().cos_theta(), 0.3, 1e-9);

        let lep = point.get(Role::Q2).unwrap();
        assert_eq!(lep.kind, TfKind::MuReco);
        assert_eq!(lep.charge, -1);
        assert_eq!(point.get(Role::B1).unwrap().kind, TfKind::BReco);
        assert_eq!(point.iter().count(), 8);
    }

    #[test]
    fn test_lost_quark_uses_free_direction() {
        let (mut jets, leptons, met) = semileptonic_event();
        jets.truncate(5);
        let map = VariableMap::new(FinalState::LH, Hypothesis::TTBB, &[Role::B2]).unwrap();
        let ctx = BuildContext {
            event: Event {
                jets: &jets,
                leptons: &leptons,
                met: Some(&met),
            },
            map: &map,
            hypothesis: Hypothesis::TTBB,
            emax: 4000.0,
        };
        let perm = vec![Some(0), Some(1), Some(2), None, Some(3), Some(4)];
        let x = [0.4, 0.3, 0.7, 0.6, 0.5, -0.25, 1.2];
        let mut point = PhaseSpacePoint::default();

        assert!(builder_for(FinalState::LH).build(&ctx, &x, &perm, &mut point));

        let b2 = point.get(Role::B2).unwrap();
        assert_eq!(b2.kind, TfKind::BLost);
        assert_approx_eq!(b2.p4.vect().cos_theta(), -0.25, 1e-9);
        assert_approx_eq!(b2.p4.phi(), 1.2, 1e-9);

        // tt+bb: the second b energy is free
        let e = jets[4].p4().t;
        assert_approx_eq!(point.p4(Role::BBar).t, 0.5 * e + 0.5 * e, 1e-9);
    }

    #[test]
    fn test_collinear_quarks_are_rejected() {
        let (mut jets, leptons, met) = semileptonic_event();
        jets[0] = windowed(LorentzVector::from_args(60.0, 0.0, 0.0, 60.0));
        jets[1] = windowed(LorentzVector::from_args(30.0, 0.0, 0.0, 30.0));
        let map = VariableMap::new(FinalState::LH, Hypothesis::TTH, &[]).unwrap();
        let ctx = BuildContext {
            event: Event {
                jets: &jets,
                leptons: &leptons,
                met: Some(&met),
            },
            map: &map,
            hypothesis: Hypothesis::TTH,
            emax: 4000.0,
        };
        let perm: Vec<_> = (0..6).map(Some).collect();
        let mut point = PhaseSpacePoint::default();

        assert!(!builder_for(FinalState::LH).build(&ctx, &[0.4, 0.3, 0.7, 0.6], &perm, &mut point));
        assert_eq!(point.p4(Role::QBar1).t, NO_SOLUTION);
        // the remaining roles are filled nevertheless
        assert!(point.get(Role::BBar).is_some());
    }

    #[test]
    fn test_undecayed_point_balances_transverse_momentum() {
        let map = VariableMap::new(FinalState::TTH, Hypothesis::TTH, &[]).unwrap();
        let ctx = BuildContext {
            event: Event {
                jets: &[],
                leptons: &[],
                met: None,
            },
            map: &map,
            hypothesis: Hypothesis::TTH,
            emax: 4000.0,
        };
        let x = [150.0, 0.2, 0.5, 220.0, -0.4, -2.0, 35.0];
        let mut point = PhaseSpacePoint::default();

        assert!(builder_for(FinalState::TTH).build(&ctx, &x, &[], &mut point));

        let sum = point.p4(Role::T) + point.p4(Role::TBar) + point.p4(Role::H);
        assert_approx_eq!(sum.x, 0.0, 1e-9);
        assert_approx_eq!(sum.y, 0.0, 1e-9);
        assert_approx_eq!(point.p4(Role::T).mass(), TOP_MASS, 1e-6);
        assert_approx_eq!(point.p4(Role::H).mass(), HIGGS_MASS, 1e-6);
        assert_approx_eq!(point.p4(Role::H).z, 35.0, 1e-12);
        assert_approx_eq!(point.p4(Role::TBar).spatial_distance(), 220.0, 1e-9);
    }
}
