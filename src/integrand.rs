//! The probability density integrated by the evaluator.
//!
//! For a point $\vec{x}$ of the integration domain the integrand is
//!
//! $$ P(\vec{x}) = \sum_{\pi} c_\pi \, p(\vec{x}, \pi) $$
//!
//! where the sum runs over the accepted permutations $\pi$ of the current assumption, $c_\pi$ is
//! the permutation constant and $p$ is the product of the normalization, the transfer functions and
//! the matrix element, see [`MemIntegrand::probability`].

use crate::config::Config;
use crate::core::{Integrand, Tally};
use crate::kinematics::{LorentzVector, Vector3};
use crate::permutations::Assumption;
use crate::phase_space::{BuildContext, PhaseSpaceBuilder, PhaseSpacePoint};
use crate::physics::{
    B_TO_TOP_MASS2_RATIO, B_YUKAWA2, GLUON, HIGGS_BB_PHASE_SPACE, HIGGS_BREIT_WIGNER, HIGGS_MASS,
    HIGGS_MASS2, TOP_BREIT_WIGNER, TOP_MASS, TOP_MASS2, WEAK_COUPLING4, W_MASS, W_MASS2, W_WIDTH,
};
use crate::providers::{MatrixElement, PartonDensity, ResolutionModel};
use crate::topology::{FinalState, Hypothesis, Role, TfKind};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Momentum fraction above which the parton densities are not evaluated.
const MAX_X: f64 = 0.99;

/// Counters of the integrand, one per worker thread, merged after every iteration.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EvaluationTally {
    /// Number of integrand calls.
    pub calls: usize,
    /// Number of phase-space points without a physical solution.
    pub rejected: usize,
    /// Number of transfer functions, matrix elements or probabilities that were not finite and set
    /// to zero.
    pub non_finite: usize,
}

impl Tally for EvaluationTally {
    fn merge(&mut self, other: Self) {
        self.calls += other.calls;
        self.rejected += other.rejected;
        self.non_finite += other.non_finite;
    }
}

fn transverse(p: &LorentzVector<f64>) -> Vector3<f64> {
    Vector3::new(p.x, p.y, 0.0)
}

/// The integrand of one assumption. All members are shared read-only between worker threads.
pub struct MemIntegrand<'a, T, M, P> {
    config: &'a Config,
    resolution: &'a T,
    matrix: &'a M,
    pdf: &'a P,
    builder: &'a dyn PhaseSpaceBuilder,
    ctx: BuildContext<'a>,
    assumption: &'a Assumption,
    selected: Option<usize>,
}

impl<'a, T, M, P> MemIntegrand<'a, T, M, P>
where
    T: ResolutionModel,
    M: MatrixElement,
    P: PartonDensity,
{
    /// Constructor. The integrand sums over all permutations of `assumption`.
    pub fn new(
        config: &'a Config,
        resolution: &'a T,
        matrix: &'a M,
        pdf: &'a P,
        builder: &'a dyn PhaseSpaceBuilder,
        ctx: BuildContext<'a>,
        assumption: &'a Assumption,
    ) -> Self {
        Self {
            config,
            resolution,
            matrix,
            pdf,
            builder,
            ctx,
            assumption,
            selected: None,
        }
    }

    /// Restricts the sum to the permutation with index `perm`, or lifts the restriction if `perm`
    /// is `None`.
    pub fn select(&mut self, perm: Option<usize>) {
        self.selected = perm;
    }

    fn final_state(&self) -> FinalState {
        self.ctx.map.final_state()
    }

    fn hypothesis(&self) -> Hypothesis {
        self.ctx.hypothesis
    }

    /// The probability density of the permutation with index `perm` at `x`, without the
    /// permutation constant. `point` is used as scratch space and holds the phase-space point
    /// afterwards.
    pub fn probability(
        &self,
        x: &[f64],
        perm: usize,
        point: &mut PhaseSpacePoint,
        tally: &mut EvaluationTally,
    ) -> f64 {
        if self.config.components.is_flat() {
            return 1.0;
        }

        let perm = &self.assumption.permutations()[perm];

        if !self.builder.build(&self.ctx, x, perm, point) {
            trace!("no physical solution for permutation {:?}", perm);
            tally.rejected += 1;
            return 0.0;
        }

        let mut out_of_range = 0;
        let mut p = self.constants();
        p *= self.transfer(point, perm, &mut out_of_range, tally);

        if self.config.tf_suppress > 0 && out_of_range >= self.config.tf_suppress {
            trace!("{} transfer function(s) out of range", out_of_range);
            return 0.0;
        }

        p *= self.matrix(point, tally);

        if !p.is_finite() {
            warn!("probability is {}, set to zero", p);
            tally.non_finite += 1;
            return 0.0;
        }

        p
    }

    /// $(2\pi)^{4 - 3n}/s^2$ for a phase space of $n$ particles.
    fn constants(&self) -> f64 {
        if !self.config.components.constants {
            return 1.0;
        }

        let n = self.final_state().phase_space_dimension(self.hypothesis()) as i32;
        (2.0 * PI).powi(4 - 3 * n) / self.config.sqrts.powi(4)
    }

    fn transfer(
        &self,
        point: &PhaseSpacePoint,
        perm: &[Option<usize>],
        out_of_range: &mut usize,
        tally: &mut EvaluationTally,
    ) -> f64 {
        if !self.config.components.transfer || !self.final_state().has_decays() {
            return 1.0;
        }

        let fs = self.final_state();
        let event = &self.ctx.event;
        let offscale = self.config.tf_offscale;
        let met = event.met.map_or_else(LorentzVector::default, |met| *met.p4());

        let mut w = 1.0;
        // neutrinos, their correction for mismeasured jets, recoil and total transverse momentum
        let mut nu = Vector3::default();
        let mut corr = Vector3::default();
        let mut rho = -transverse(&met);
        let mut pt = Vector3::default();

        for (role, parton) in point.iter() {
            let gen = transverse(&parton.p4);
            pt = pt - gen;

            if parton.kind.is_lepton() {
                if let Some(lepton) = event.lepton(fs, role) {
                    rho = rho - transverse(lepton.p4());
                }
                continue;
            }

            if parton.kind.is_neutrino() {
                nu = nu + gen;
                continue;
            }

            let e_gen = parton.p4.t;
            let e_rec = match event.jet(fs, perm, role) {
                Some(jet) => {
                    let p4 = jet.p4();
                    rho = rho - transverse(p4);
                    corr = corr + transverse(p4) * ((p4.t - e_gen) / p4.pt());
                    p4.t
                }
                None => 0.0,
            };

            let (tf, out) = self.resolution.likelihood(
                &[e_rec],
                &[e_gen, parton.p4.eta()],
                parton.kind,
                offscale,
            );
            w *= tf;
            *out_of_range += out;
        }

        let mut gen_met = nu - corr;
        if !self.config.components.recoil {
            gen_met = gen_met + corr;
        }

        let (tf, out) =
            self.resolution
                .likelihood(&[met.x, met.y], &[gen_met.x, gen_met.y], TfKind::Met, offscale);
        w *= tf;
        *out_of_range += out;

        if self.config.components.sudakov {
            let recoil = if self.assumption.extra_jets() > 0 {
                self.resolution.recoil_saturation() + 1.0
            } else {
                rho.pt()
            };
            let (tf, out) =
                self.resolution
                    .likelihood(&[recoil], &[pt.pt()], TfKind::Recoil, offscale);
            w *= tf;
            *out_of_range += out;
        }

        if !w.is_finite() {
            warn!("transfer function is {}, set to zero", w);
            tally.non_finite += 1;
            return 0.0;
        }

        w
    }

    fn matrix(&self, point: &PhaseSpacePoint, tally: &mut EvaluationTally) -> f64 {
        let m = if self.final_state().has_decays() {
            self.matrix_decayed(point)
        } else {
            self.matrix_undecayed(point)
        };

        if !m.is_finite() {
            warn!("matrix element is {}, set to zero", m);
            tally.non_finite += 1;
            return 0.0;
        }

        m
    }

    fn matrix_decayed(&self, point: &PhaseSpacePoint) -> f64 {
        let p4 = |role| point.p4(role);
        let charge = |role| point.get(role).map_or(0, |parton| parton.charge);

        let b = p4(Role::B);
        let bbar = p4(Role::BBar);

        let mut m = self.t_decay(&p4(Role::Q1), &p4(Role::QBar1), &p4(Role::B1), charge(Role::Q1));
        m *= self.t_decay(&p4(Role::Q2), &p4(Role::QBar2), &p4(Role::B2), charge(Role::Q2));
        m *= self.h_decay(&b, &bbar);

        let top = p4(Role::Q1) + p4(Role::QBar1) + p4(Role::B1);
        let atop = p4(Role::Q2) + p4(Role::QBar2) + p4(Role::B2);
        let (scattering, x1, x2) = self.scattering(&top, &atop, &b, &bbar);

        m * scattering * self.parton_luminosity(x1, x2, b.pt() + bbar.pt())
    }

    fn matrix_undecayed(&self, point: &PhaseSpacePoint) -> f64 {
        let t = point.p4(Role::T);
        let tbar = point.p4(Role::TBar);
        let b = point.p4(Role::H);
        let bbar = LorentzVector::from_args(1e-6, 1e-6, 0.0, 0.0);
        let h = b + bbar;

        let (scattering, x1, x2) = self.scattering(&t, &tbar, &b, &bbar);

        let jacobian = t.beta() * t.spatial_distance() / 2.0 * tbar.beta() * tbar.spatial_distance()
            / 2.0
            / (2.0 * h.t);

        scattering * self.parton_luminosity(x1, x2, h.pt()) * jacobian
    }

    /// Breit-Wigner propagator, Jacobian and squared amplitude of $t \to b q \bar{q}'$. The
    /// amplitude is averaged over $q \leftrightarrow \bar{q}'$ if the charge of `q` is unknown.
    fn t_decay(
        &self,
        q: &LorentzVector<f64>,
        qbar: &LorentzVector<f64>,
        b: &LorentzVector<f64>,
        charge: i32,
    ) -> f64 {
        let components = &self.config.components;

        if !components.decay {
            return 1.0;
        }

        let mut p = TOP_BREIT_WIGNER;

        let w = *q + *qbar;
        let t = w + *b;
        let inv_jac =
            (2.0 * W_MASS2 / qbar.t * (w.t - w.vect().dot(&b.vect().unit()) / b.beta())).abs();

        if components.jacobian {
            p *= q.spatial_distance() * qbar.spatial_distance() * b.spatial_distance()
                / (8.0 * inv_jac);
        }

        let x_e1 = 2.0 * q.dot(&t) / TOP_MASS2;
        let x_e2 = 2.0 * qbar.dot(&t) / TOP_MASS2;
        let amplitude = |x: f64| x * (1.0 - B_TO_TOP_MASS2_RATIO - x);

        let mut m2 = if charge == 0 {
            0.5 * (amplitude(x_e1) + amplitude(x_e2))
        } else {
            amplitude(x_e1)
        };
        m2 *= 32.0 * PI * TOP_MASS2 * TOP_MASS2 * WEAK_COUPLING4 / (W_MASS * W_WIDTH);

        if m2 < 0.0 {
            trace!("negative squared amplitude of the top decay");
            return 0.0;
        }

        p * m2
    }

    /// Breit-Wigner propagator, Jacobian and squared amplitude of $H \to b \bar{b}$. For tt+bb
    /// only the Jacobian remains.
    fn h_decay(&self, b: &LorentzVector<f64>, bbar: &LorentzVector<f64>) -> f64 {
        let components = &self.config.components;

        if !components.decay {
            return 1.0;
        }

        let (mut p, inv_jac, m2) = if self.hypothesis() == Hypothesis::TTH {
            (
                HIGGS_BREIT_WIGNER,
                (2.0 * (b.t - b.vect().dot(&bbar.vect().unit()) / bbar.beta())).abs(),
                2.0 * B_YUKAWA2 * HIGGS_MASS2 * HIGGS_BB_PHASE_SPACE,
            )
        } else {
            (1.0, 1.0, 1.0)
        };

        if components.jacobian {
            p *= b.spatial_distance() * bbar.spatial_distance() / (4.0 * inv_jac);
        }

        p * m2
    }

    /// Squared matrix element of the hard scattering in the frame without transverse momentum,
    /// together with the momentum fractions $x_1, x_2$ of the incoming gluons.
    fn scattering(
        &self,
        top: &LorentzVector<f64>,
        atop: &LorentzVector<f64>,
        b1: &LorentzVector<f64>,
        b2: &LorentzVector<f64>,
    ) -> (f64, f64, f64) {
        let sqrts = self.config.sqrts;
        let tth = self.hypothesis() == Hypothesis::TTH;

        let mut t = LorentzVector::from_momentum_mass(&top.vect(), TOP_MASS);
        let mut tx = LorentzVector::from_momentum_mass(&atop.vect(), TOP_MASS);
        let mut b = LorentzVector::from_momentum_mass(&b1.vect(), 0.0);
        let mut bx = LorentzVector::from_momentum_mass(&b2.vect(), 0.0);
        let mut h = LorentzVector::from_momentum_mass(&(*b1 + *b2).vect(), HIGGS_MASS);

        let sum = if tth { t + tx + h } else { t + tx + b + bx };

        if sum.t > sqrts {
            return (0.0, MAX_X, MAX_X);
        }

        // tolerance of one GeV
        if sum.x.abs() > 1.0 || sum.y.abs() > 1.0 {
            let beta = -Vector3::new(sum.x / sum.t, sum.y / sum.t, 0.0);
            t = t.boost(&beta);
            tx = tx.boost(&beta);
            h = h.boost(&beta);
            b = b.boost(&beta);
            bx = bx.boost(&beta);
        }

        // the last particle absorbs the rounding errors of the boost
        let sum = if tth {
            let p = Vector3::new(-(t.x + tx.x), -(t.y + tx.y), h.z);
            h = LorentzVector::from_momentum_mass(&p, HIGGS_MASS);
            t + tx + h
        } else {
            let p = Vector3::new(-(t.x + tx.x + bx.x), -(t.y + tx.y + bx.y), b.z);
            b = LorentzVector::from_momentum_mass(&p, 0.0);
            t + tx + b + bx
        };

        let x1 = (sum.t + sum.z) / sqrts;
        let x2 = (sum.t - sum.z) / sqrts;

        if !self.config.components.scattering {
            return (1.0, x1, x2);
        }

        let e1 = (sum.t + sum.z) / 2.0;
        let e2 = (sum.t - sum.z) / 2.0;
        let g1 = LorentzVector::from_args(e1, 0.0, 0.0, e1);
        let g2 = LorentzVector::from_args(e2, 0.0, 0.0, -e2);

        let m2 = if tth {
            self.matrix
                .squared_amplitude(Hypothesis::TTH, &[g1, g2, h, t, tx])
        } else {
            self.matrix
                .squared_amplitude(Hypothesis::TTBB, &[g1, g2, t, tx, b, bx])
        };

        (m2, x1, x2)
    }

    /// Product of the gluon densities divided by the momentum fractions. The factorization scale
    /// is fixed for ttH and depends on the transverse momentum `dynamical` of the b pair for tt+bb.
    fn parton_luminosity(&self, x1: f64, x2: f64, dynamical: f64) -> f64 {
        if !self.config.components.pdf {
            return 1.0;
        }

        if x1 > MAX_X || x2 > MAX_X {
            return 0.0;
        }

        let scale = match self.hypothesis() {
            Hypothesis::TTH => (2.0 * TOP_MASS + HIGGS_MASS) / 2.0,
            Hypothesis::TTBB => (4.0 * TOP_MASS2 + dynamical * dynamical).sqrt(),
        };

        let f1 = self.pdf.density(GLUON, x1, scale) / x1;
        let f2 = self.pdf.density(GLUON, x2, scale) / x2;

        f1 * f2 / (x1 * x2)
    }
}

impl<'a, T, M, P> Integrand<f64> for MemIntegrand<'a, T, M, P>
where
    T: ResolutionModel,
    M: MatrixElement,
    P: PartonDensity,
{
    type Tally = EvaluationTally;

    fn call(&self, x: &[f64], tally: &mut EvaluationTally) -> f64 {
        tally.calls += 1;

        let mut point = PhaseSpacePoint::default();
        let perms = match self.selected {
            Some(perm) => perm..(perm + 1).min(self.assumption.len()),
            None => 0..self.assumption.len(),
        };

        perms
            .map(|perm| {
                self.probability(x, perm, &mut point, tally) * self.assumption.constants()[perm]
            })
            .sum()
    }

    fn dim(&self) -> usize {
        self.ctx.map.len()
    }
}
