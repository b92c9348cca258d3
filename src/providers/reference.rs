//! Simple, analytic implementations of the collaborators. They make the integrand evaluable
//! without external physics libraries, which is what tests, benchmarks and demos need.

use super::{MatrixElement, PartonDensity, ResolutionModel};
use crate::kinematics::LorentzVector;
use crate::physics::GLUON;
use crate::topology::{Hypothesis, TfKind};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Gaussian detector response.
///
/// Quark energies are smeared with the resolution $\sigma = r E$, the transverse components of
/// the missing momentum with the absolute resolution `met_sigma` and the recoil with
/// `recoil_sigma`. Lost quarks and charged leptons are not smeared.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct GaussianResolution {
    /// Relative energy resolution of light-quark jets.
    pub light_resolution: f64,
    /// Relative energy resolution of b-quark jets.
    pub b_resolution: f64,
    /// Resolution of each component of the missing transverse momentum.
    pub met_sigma: f64,
    /// Resolution of the recoil.
    pub recoil_sigma: f64,
    /// Saturation value of the recoil.
    pub recoil_saturation: f64,
}

impl Default for GaussianResolution {
    fn default() -> Self {
        Self {
            light_resolution: 0.15,
            b_resolution: 0.2,
            met_sigma: 20.0,
            recoil_sigma: 25.0,
            recoil_saturation: 200.0,
        }
    }
}

/// Normalized Gaussian density together with whether `x` lies further than `offscale` standard
/// deviations from `mean`.
fn gauss(x: f64, mean: f64, sigma: f64, offscale: f64) -> (f64, usize) {
    let pull = (x - mean) / sigma;
    let value = (-0.5 * pull * pull).exp() / ((2.0 * PI).sqrt() * sigma);
    (value, (pull.abs() > offscale) as usize)
}

/// Number of standard deviations of the Gaussian contour that contains the probability `cl` of a
/// two-dimensional normal distribution.
fn contour(cl: f64) -> f64 {
    (-2.0 * (1.0 - cl.min(1.0 - 1e-12)).ln()).sqrt()
}

impl GaussianResolution {
    fn energy_resolution(&self, kind: TfKind) -> f64 {
        if kind == TfKind::BReco {
            self.b_resolution
        } else {
            self.light_resolution
        }
    }
}

impl ResolutionModel for GaussianResolution {
    fn likelihood(&self, reco: &[f64], gen: &[f64], kind: TfKind, offscale: f64) -> (f64, usize) {
        match kind {
            TfKind::QReco | TfKind::BReco => {
                let e_gen = gen[0].max(1.0);
                gauss(reco[0], gen[0], self.energy_resolution(kind) * e_gen, offscale)
            }
            TfKind::Met => {
                let (wx, ox) = gauss(reco[0], gen[0], self.met_sigma, offscale);
                let (wy, oy) = gauss(reco[1], gen[1], self.met_sigma, offscale);
                (wx * wy, ox + oy)
            }
            TfKind::Recoil => {
                gauss(reco[0].min(self.recoil_saturation), gen[0], self.recoil_sigma, offscale)
            }
            TfKind::QLost | TfKind::BLost | TfKind::MuReco | TfKind::Unknown => (1.0, 0),
        }
    }

    fn support(&self, reco: &[f64], kind: TfKind, cl: f64) -> (f64, f64) {
        let z = contour(cl);

        match kind {
            TfKind::Met => {
                let met = reco[0].hypot(reco[1]);
                let half = if met > 0.0 {
                    (z * self.met_sigma / met).min(PI)
                } else {
                    PI
                };
                (-half, half)
            }
            _ => {
                let e = reco[0];
                let width = z * self.energy_resolution(kind) * e;
                ((e - width).max(0.0), e + width)
            }
        }
    }

    fn recoil_saturation(&self) -> f64 {
        self.recoil_saturation
    }
}

/// A matrix element that is the same constant for every phase-space point.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ConstantAmplitude {
    /// The value of $|\mathcal{M}|^2$.
    pub value: f64,
}

impl Default for ConstantAmplitude {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

impl MatrixElement for ConstantAmplitude {
    fn squared_amplitude(&self, _: Hypothesis, _: &[LorentzVector<f64>]) -> f64 {
        self.value
    }
}

/// A toy gluon density $x g(x) = A (1 - x)^5$; all quark densities vanish.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ToyGluonDensity {
    /// Normalization $A$.
    pub norm: f64,
}

impl Default for ToyGluonDensity {
    fn default() -> Self {
        Self { norm: 3.0 }
    }
}

impl PartonDensity for ToyGluonDensity {
    fn density(&self, flavor: i32, x: f64, _: f64) -> f64 {
        if flavor == GLUON && x > 0.0 && x < 1.0 {
            self.norm * (1.0 - x).powi(5)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_energy_likelihood() {
        let tf = GaussianResolution::default();
        let (peak, out) = tf.likelihood(&[100.0], &[100.0, 0.5], TfKind::QReco, 3.0);
        assert_eq!(out, 0);
        assert_approx_eq!(peak, 1.0 / ((2.0 * PI).sqrt() * 15.0), 1e-15);

        let (tail, out) = tf.likelihood(&[200.0], &[100.0, 0.5], TfKind::BReco, 3.0);
        assert_eq!(out, 1);
        assert!(tail < peak);

        assert_eq!(tf.likelihood(&[0.0], &[100.0, 0.5], TfKind::BLost, 3.0), (1.0, 0));
    }

    #[test]
    fn test_support() {
        let tf = GaussianResolution::default();
        let (low, high) = tf.support(&[100.0, 0.0], TfKind::QReco, 0.9);
        assert!(low < 100.0 && high > 100.0);
        assert_approx_eq!(high - 100.0, 100.0 - low, 1e-12);

        // a wider confidence level gives a wider window
        let (low_b, high_b) = tf.support(&[100.0, 0.0], TfKind::BReco, 0.99);
        assert!(low_b < low && high_b > high);

        let (low, high) = tf.support(&[0.0, 0.0], TfKind::Met, 0.9);
        assert_eq!((low, high), (-PI, PI));

        let (low, high) = tf.support(&[300.0, 400.0], TfKind::Met, 0.9);
        assert_approx_eq!(high, contour(0.9) * 20.0 / 500.0, 1e-15);
        assert_eq!(low, -high);
    }

    #[test]
    fn test_toy_density() {
        let pdf = ToyGluonDensity::default();
        assert_approx_eq!(pdf.density(GLUON, 0.5, 100.0), 3.0 / 32.0, 1e-15);
        assert_eq!(pdf.density(1, 0.5, 100.0), 0.0);
        assert_eq!(pdf.density(GLUON, 1.0, 100.0), 0.0);
    }
}
