//! Masses, widths and couplings entering the phase-space construction and the decay amplitudes.
//! All dimensionful quantities are in GeV.

use std::f64::consts::PI;

/// Top-quark mass.
pub const TOP_MASS: f64 = 174.3;
/// Top-quark width.
pub const TOP_WIDTH: f64 = 1.5;
/// W-boson mass.
pub const W_MASS: f64 = 80.19;
/// W-boson width.
pub const W_WIDTH: f64 = 2.08;
/// Higgs-boson mass.
pub const HIGGS_MASS: f64 = 125.0;
/// Higgs-boson width.
pub const HIGGS_WIDTH: f64 = 4.07e-3;
/// b-quark mass.
pub const B_MASS: f64 = 4.8;
/// Light-quark mass.
pub const LIGHT_QUARK_MASS: f64 = 0.0;
/// Charged-lepton mass.
pub const LEPTON_MASS: f64 = 0.0;
/// Vacuum expectation value of the Higgs field.
pub const HIGGS_VEV: f64 = 246.22;
/// SU(2) weak coupling.
pub const WEAK_COUPLING: f64 = 0.6517;

/// Daughters lighter than this are treated as massless by the solver.
pub const MASSLESS_THRESHOLD: f64 = 1e-3;

/// Squared top mass.
pub const TOP_MASS2: f64 = TOP_MASS * TOP_MASS;
/// Squared W mass.
pub const W_MASS2: f64 = W_MASS * W_MASS;
/// Squared Higgs mass.
pub const HIGGS_MASS2: f64 = HIGGS_MASS * HIGGS_MASS;
/// Squared b mass.
pub const B_MASS2: f64 = B_MASS * B_MASS;

/// Mass-squared splitting of $W \to q \bar{q}'$: $p_q \cdot p_{\bar{q}'} = M_W^2/2$.
pub const DELTA_M2_W: f64 = (W_MASS2 - 2.0 * LIGHT_QUARK_MASS * LIGHT_QUARK_MASS) / 2.0;
/// Mass-squared splitting of $t \to W b$: $p_W \cdot p_b = (M_t^2 - M_W^2 - M_b^2)/2$.
pub const DELTA_M2_TOP: f64 = (TOP_MASS2 - W_MASS2 - B_MASS2) / 2.0;
/// Mass-squared splitting of $H \to b \bar{b}$: $p_b \cdot p_{\bar{b}} = (M_H^2 - 2 M_b^2)/2$.
pub const DELTA_M2_HIGGS: f64 = (HIGGS_MASS2 - 2.0 * B_MASS2) / 2.0;

/// Narrow-width factor of the top propagator, $\pi/(M_t \Gamma_t)$.
pub const TOP_BREIT_WIGNER: f64 = PI / (TOP_MASS * TOP_WIDTH);
/// Narrow-width factor of the Higgs propagator, $\pi/(M_H \Gamma_H)$.
pub const HIGGS_BREIT_WIGNER: f64 = PI / (HIGGS_MASS * HIGGS_WIDTH);

/// $M_b^2/M_t^2$, entering the $t \to b W \to b q \bar{q}'$ squared amplitude.
pub const B_TO_TOP_MASS2_RATIO: f64 = B_MASS2 / TOP_MASS2;
/// Fourth power of the weak coupling.
pub const WEAK_COUPLING4: f64 = WEAK_COUPLING * WEAK_COUPLING * WEAK_COUPLING * WEAK_COUPLING;
/// Squared b-quark Yukawa coupling, $2 M_b^2 / v^2$.
pub const B_YUKAWA2: f64 = 2.0 * B_MASS2 / (HIGGS_VEV * HIGGS_VEV);
/// Velocity factor of $H \to b \bar{b}$, $1 - 4 M_b^2/M_H^2$.
pub const HIGGS_BB_PHASE_SPACE: f64 = 1.0 - 4.0 * B_MASS2 / HIGGS_MASS2;

/// PDG code of the gluon.
pub const GLUON: i32 = 21;
