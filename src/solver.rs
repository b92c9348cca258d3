//! On-shell energy reconstruction for a two-body decay with one measured direction.
//!
//! Given the four-momentum $P$ of a (partially reconstructed) parent, the splitting
//! $\Delta M^2 = P \cdot d$ fixed by the mass constraints, the mass $M$ of the daughter $d$ and its
//! direction $\hat{e}$, the energy $E_d = \gamma M$ of the daughter solves
//!
//! $$ \gamma - b \sqrt{\gamma^2 - 1} = a, \qquad a = \frac{\Delta M^2}{E_P M}, \qquad
//! b = \beta_P \cos\angle(\vec{P}, \hat{e}) $$
//!
//! which has up to two roots $\gamma_\pm = (a \pm |b| \sqrt{a^2 + b^2 - 1})/(1 - b^2)$.

use crate::kinematics::{LorentzVector, Vector3};
use crate::physics::MASSLESS_THRESHOLD;
use log::trace;

/// Energy assigned to a daughter for which no physical solution exists.
pub const NO_SOLUTION: f64 = f64::MAX;

/// Returns the energy of a daughter of mass `mass` moving along the unit vector `dir`, such that
/// its Minkowski product with `parent` equals `delta_m2`. If two physical solutions exist, the one
/// closer to `target` is chosen. `None` is returned if there is no physical solution.
pub fn solve(
    parent: &LorentzVector<f64>,
    delta_m2: f64,
    mass: f64,
    dir: &Vector3<f64>,
    target: f64,
) -> Option<f64> {
    let a = delta_m2 / parent.t;
    let b = parent.vect().angle(dir).cos();

    if mass < MASSLESS_THRESHOLD {
        return if b < 1.0 {
            Some(a / (1.0 - b))
        } else {
            trace!("massless daughter collinear with its parent");
            None
        };
    }

    let a = a / mass;
    let b = b * parent.beta();
    let a2 = a * a;
    let b2 = b * b;

    // sign of (a^2 - 1)(1 - b^2) tells whether both roots solve the unsquared equation
    let discr = a2 + b2 - a2 * b2 - 1.0;

    if a2 + b2 - 1.0 < 0.0 {
        trace!("no real root: a = {}, b = {}", a, b);
        return None;
    }

    let root = b.abs() * (a2 + b2 - 1.0).sqrt();
    let g_p = (a + root) / (1.0 - b2);
    let mut g_m = (a - root) / (1.0 - b2);

    if g_p < 1.0 {
        trace!("both roots below threshold: g+ = {}", g_p);
        return None;
    }

    if g_m < 1.0 {
        g_m = g_p;
    }

    if b > 0.0 {
        if discr < 0.0 {
            let (e_p, e_m) = (g_p * mass, g_m * mass);
            Some(if (target - e_p).abs() < (target - e_m).abs() {
                e_p
            } else {
                e_m
            })
        } else {
            Some(g_p * mass)
        }
    } else if discr > 0.0 {
        Some(g_m * mass)
    } else {
        trace!("b <= 0 with negative discriminant");
        None
    }
}
