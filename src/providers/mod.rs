//! Collaborators of the integrand: the detector resolution model, the squared matrix element of
//! the hard scattering and the parton densities.
pub mod reference;

use crate::kinematics::LorentzVector;
use crate::topology::{Hypothesis, TfKind};

/// The detector response, also known as transfer function.
pub trait ResolutionModel: Send + Sync {
    /// The likelihood of observing `reco` if the generated quantities are `gen`. For quarks both
    /// slices are `[energy]` and `[energy, eta]`, for the missing transverse momentum they hold
    /// the transverse components and for the recoil its modulus. The second value is the number
    /// of observables that are further than `offscale` standard deviations off.
    fn likelihood(&self, reco: &[f64], gen: &[f64], kind: TfKind, offscale: f64) -> (f64, usize);

    /// The interval of generated values compatible with `reco` at confidence level `cl`. For
    /// quarks this is an energy window, for [`TfKind::Met`] a window of the neutrino azimuth
    /// relative to the measured missing transverse momentum.
    fn support(&self, reco: &[f64], kind: TfKind, cl: f64) -> (f64, f64);

    /// The recoil value beyond which the recoil likelihood no longer changes. It is used as
    /// observable when there are more jets than partons.
    fn recoil_saturation(&self) -> f64;
}

/// Squared matrix element of the hard scattering.
pub trait MatrixElement: Send + Sync {
    /// Returns $|\mathcal{M}|^2 \ge 0$. The momenta are the two incoming gluons followed by
    /// $H, t, \bar{t}$ for [`Hypothesis::TTH`] and by $t, \bar{t}, b, \bar{b}$ for
    /// [`Hypothesis::TTBB`].
    fn squared_amplitude(&self, hypothesis: Hypothesis, momenta: &[LorentzVector<f64>]) -> f64;
}

/// Parton distribution functions.
pub trait PartonDensity: Send + Sync {
    /// The density $x f(x, Q)$ of the parton `flavor` (PDG code) carrying the momentum fraction `x`
    /// at the scale `scale`.
    fn density(&self, flavor: i32, x: f64, scale: f64) -> f64;
}
