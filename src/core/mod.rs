//! The core module: integrands, their integration domains and checkpoints.
pub mod estimators;

use crate::error::{Error, Result};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Side information accumulated by an integrand while it is being called, for example counters of
/// rejected points. Every worker thread owns a tally, which are merged after each iteration.
pub trait Tally: Default + Send {
    /// Adds the counts of `other` to `self`.
    fn merge(&mut self, other: Self);
}

impl Tally for () {
    fn merge(&mut self, _: Self) {}
}

/// Integrand trait
pub trait Integrand<T: Copy>: Send + Sync {
    /// The type of the side information collected during calls.
    type Tally: Tally;

    /// Call the integrand with a point `x` of the integration domain.
    fn call(&self, x: &[T], tally: &mut Self::Tally) -> T;

    /// The dimension of the integrand.
    fn dim(&self) -> usize;
}

/// A hyper-rectangle $[a_1, b_1] \times \ldots \times [a_d, b_d]$ the integrand is integrated
/// over.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Domain<T> {
    lower: Vec<T>,
    upper: Vec<T>,
}

impl<T: Float> Domain<T> {
    /// Constructor. Degenerate dimensions with $a_i = b_i$ are allowed.
    ///
    /// # Errors
    ///
    /// Fails if the bounds differ in length, are not finite or if any lower bound is larger than
    /// its upper bound.
    pub fn new(lower: Vec<T>, upper: Vec<T>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::InvalidDomain(format!(
                "{} lower but {} upper bounds",
                lower.len(),
                upper.len()
            )));
        }

        if let Some(i) = lower
            .iter()
            .zip(&upper)
            .position(|(&l, &u)| !l.is_finite() || !u.is_finite() || l > u)
        {
            return Err(Error::InvalidDomain(format!("bad bounds in dimension {}", i)));
        }

        Ok(Self { lower, upper })
    }

    /// The unit hypercube of dimension `dim`.
    pub fn unit(dim: usize) -> Self {
        Self {
            lower: vec![T::zero(); dim],
            upper: vec![T::one(); dim],
        }
    }

    /// The number of dimensions.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower bounds.
    pub fn lower(&self) -> &[T] {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &[T] {
        &self.upper
    }

    /// The volume $\prod_i (b_i - a_i)$.
    pub fn volume(&self) -> T {
        self.lower
            .iter()
            .zip(&self.upper)
            .fold(T::one(), |acc, (&l, &u)| acc * (u - l))
    }

    /// Maps the point `u` of the unit hypercube into the domain, writing the result into `x`.
    pub fn map_into(&self, u: &[T], x: &mut [T]) {
        for (((x, &u), &l), &h) in x.iter_mut().zip(u).zip(&self.lower).zip(&self.upper) {
            *x = l + (h - l) * u;
        }
    }
}

/// A checkpoint saves the state of the generator after an iteration.
/// Checkpoints can be used to restart or resume iterations.
#[derive(Debug, Deserialize, Serialize)]
pub struct Checkpoint<R, E, A> {
    rng_before: R,
    rng_after: R,
    estimators: E,
    tally: A,
}

impl<R, E, A> Checkpoint<R, E, A> {
    /// Constructor
    pub(crate) const fn new(rng_before: R, rng_after: R, estimators: E, tally: A) -> Self {
        Self {
            rng_before,
            rng_after,
            estimators,
            tally,
        }
    }

    /// Returns the random number generator before generation of this checkpoint.
    pub const fn rng_before(&self) -> &R {
        &self.rng_before
    }

    /// Returns the random number generator after generation of this checkpoint
    pub const fn rng_after(&self) -> &R {
        &self.rng_after
    }

    /// Returns the estimators of this checkpoint.
    pub const fn estimators(&self) -> &E {
        &self.estimators
    }

    /// The merged tally of all calls in this iteration.
    pub const fn tally(&self) -> &A {
        &self.tally
    }

    /// Destructure the checkpoint and return its components.
    pub fn destructure(self) -> (R, R, E, A) {
        (self.rng_before, self.rng_after, self.estimators, self.tally)
    }
}

/// Compute the number of calls on a given core, given the total number of cores
/// `n_cores`, the index `core` (zero-based) of the current thread as well as the
/// total number of calls `total_calls` to perform combined on all cores.
pub(crate) fn compute_calls_for_core(core: usize, n_cores: usize, total_calls: usize) -> usize {
    debug_assert!(core < n_cores);
    let calls_per_core = calls_per_core(n_cores, total_calls);

    // the last core only needs what is left, which may be nothing when there are fewer calls than
    // cores
    if n_cores == core + 1 {
        total_calls.saturating_sub(core * calls_per_core)
    } else {
        calls_per_core.min(total_calls.saturating_sub(core * calls_per_core))
    }
}

/// Upper bound of calls every core performs.
pub(crate) fn calls_per_core(n_cores: usize, total_calls: usize) -> usize {
    (total_calls + n_cores - 1) / n_cores
}
