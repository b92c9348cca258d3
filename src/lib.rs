#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! The crate `memir` evaluates the [Matrix Element Method] probability of observed collider events
//! under the $t\bar{t}H(\to b\bar{b})$ and $t\bar{t}b\bar{b}$ hypotheses. The name stands for
//! Matrix Element Method In Rust.
//!
//! # Features
//!
//! - **Four final states**. Semi-leptonic (`LH`), di-leptonic (`LL`) and fully-hadronic (`HH`)
//! decays of the top-quark pair, and undecayed $t\bar{t}H$ (`TTH`).
//! - **Lost quarks**. Quarks that were not reconstructed as jets can be assumed lost; their
//! directions become integration variables.
//! - **Permutation pruning**. Jet-quark assignments are pruned with b-tag strategies and by
//! removing assignments that only differ by swapping indistinguishable quarks.
//! - **Pluggable physics**. The detector resolution, the matrix element of the hard scattering
//! and the parton densities are traits; [`providers::reference`] ships simple analytic versions.
//! - **Reproducible integration**. The bundled PLAIN integrator produces results that only depend
//! on the seed of its random number generator, not on the number of threads it runs on.
//!
//! # What is ...?
//!
//! The probability of an event with observables $y$ under the hypothesis $H$ is
//!
//! $$ P(y|H) = \sum_\pi c_\pi \int \mathrm{d}\Phi \, W(y|\Phi, \pi) \, |\mathcal{M}_H(\Phi)|^2
//! \frac{f(x_1) f(x_2)}{x_1 x_2} $$
//!
//! where we use the following terms:
//!
//! - a *permutation* $\pi$ assigns the observed jets to the quarks of the final state,
//! - the *permutation constant* $c_\pi$ is the product of the widths of the energy windows of
//! the jets whose energies are integrated over,
//! - the *transfer function* $W$ is the likelihood to observe $y$ for the partons $\Phi$,
//! - the *matrix element* $|\mathcal{M}_H|^2$ describes production and decay of the partons,
//! - the *parton densities* $f$ are evaluated at the momentum fractions $x_1, x_2$ of the
//! incoming gluons.
//!
//! [Matrix Element Method]: https://arxiv.org/abs/1502.02485

pub mod callbacks;
pub mod config;
pub mod core;
pub mod error;
pub mod integrand;
pub mod integrators;
pub mod kinematics;
pub mod objects;
pub mod orchestrator;
pub mod permutations;
pub mod phase_space;
pub mod physics;
pub mod providers;
pub mod solver;
pub mod topology;

pub use crate::config::{Components, Config};
pub use crate::error::{Error, Result};
pub use crate::orchestrator::{Evaluator, EvaluatorState, MemOutput};
pub use crate::topology::{FinalState, Hypothesis, Role};
