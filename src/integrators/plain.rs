//! Plain integrator
use crate::callbacks::Callback;
use crate::core::estimators::{BasicEstimators, Estimators};
use crate::core::{calls_per_core, compute_calls_for_core, Checkpoint, Domain, Integrand, Tally};
use crate::error::{Error, Result};
use crate::integrators::{IntegrationResult, Integrator};

use num_traits::{Float, FromPrimitive};
use rand::distributions::{Distribution, Standard};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

use crossbeam as cb;

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Estimators for the plain integrator.
pub struct PlainEstimators<T> {
    sum: T,
    sumsq: T,
    calls: usize,
    non_finite_calls: usize,
    non_zero_calls: usize,
}

impl<T: Float> Default for PlainEstimators<T> {
    fn default() -> Self {
        Self {
            sum: T::zero(),
            sumsq: T::zero(),
            calls: 0,
            non_finite_calls: 0,
            non_zero_calls: 0,
        }
    }
}

impl<T: Float> Add for PlainEstimators<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            sumsq: self.sumsq + other.sumsq,
            calls: self.calls + other.calls,
            non_finite_calls: self.non_finite_calls + other.non_finite_calls,
            non_zero_calls: self.non_zero_calls + other.non_zero_calls,
        }
    }
}

impl<T> BasicEstimators<T> for PlainEstimators<T>
where
    T: Float + FromPrimitive,
{
    fn mean(&self) -> T {
        if self.calls == 0 {
            return T::zero();
        }

        self.sum / T::from_usize(self.calls).unwrap_or_else(T::nan)
    }

    /// The variance of the mean; zero for less than two calls.
    fn var(&self) -> T {
        if self.calls < 2 {
            return T::zero();
        }

        let calls = T::from_usize(self.calls).unwrap_or_else(T::nan);
        // rounding can make the numerator slightly negative for constant integrands
        ((self.sumsq - self.sum * self.sum / calls) / calls / (calls - T::one())).max(T::zero())
    }
}

impl<T> Estimators<T> for PlainEstimators<T>
where
    T: Float + FromPrimitive,
{
    fn calls(&self) -> usize {
        self.calls
    }

    fn non_finite_calls(&self) -> usize {
        self.non_finite_calls
    }

    fn non_zero_calls(&self) -> usize {
        self.non_zero_calls
    }
}

/// Checkpoints of the plain integrator.
pub type PlainCheckpoint<T, R, A> = Checkpoint<R, PlainEstimators<T>, A>;

/// Perform part of the integration of a given integration on a specific `core`.
fn perform_iteration_contribution_from_core<T, R, I>(
    integrand: &I,
    domain: &Domain<T>,
    mut rng: R,
    calls: usize,
    core: usize,
    n_cores: usize,
) -> (PlainEstimators<T>, I::Tally)
where
    I: Integrand<T>,
    T: Float + AddAssign + FromPrimitive,
    R: Rng,
    Standard: Distribution<T>,
{
    let dim = domain.dim();

    // skip the random numbers used by the cores before this one
    for _ in 0..calls_per_core(n_cores, calls) * core * dim {
        let _ = rng.gen::<T>();
    }

    let actual_calls = compute_calls_for_core(core, n_cores, calls);
    let volume = domain.volume();

    // buffers for the sampled point, so that no vectors are allocated in every call
    let mut u = vec![T::zero(); dim];
    let mut x = vec![T::zero(); dim];
    let mut tally = I::Tally::default();

    let estimators = (0..actual_calls).fold(PlainEstimators::<T>::default(), |mut acc, _| {
        u.iter_mut().for_each(|v| *v = rng.gen());
        domain.map_into(&u, &mut x);

        let value = integrand.call(&x, &mut tally) * volume;

        acc.calls += 1;

        if value != T::zero() {
            acc.non_zero_calls += 1;

            if value.is_finite() {
                acc.sum += value;
                acc.sumsq += value * value;
            } else {
                acc.non_finite_calls += 1;
            }
        }

        acc
    });

    (estimators, tally)
}

/// Perform a single iteration of integrating the `integrand` on `n_cores` cores using `calls` samples.
fn integrate_iteration<T, R, I>(
    integrand: &I,
    domain: &Domain<T>,
    rng: &R,
    n_cores: usize,
    calls: usize,
) -> Result<PlainCheckpoint<T, R, I::Tally>>
where
    I: Integrand<T>,
    T: Float + AddAssign + FromPrimitive + Send + Sync,
    R: Clone + Rng + Send + Sync,
    Standard: Distribution<T>,
{
    let n_cores = n_cores.max(1);
    let mut rng_global = rng.clone();

    // distribute the workload evenly across the cores
    let results = cb::thread::scope(|s| {
        let handles: Vec<_> = (0..n_cores)
            .map(|core| {
                let rng_local = rng_global.clone();

                s.spawn(move |_| {
                    perform_iteration_contribution_from_core(
                        integrand, domain, rng_local, calls, core, n_cores,
                    )
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<std::result::Result<Vec<_>, _>>()
    })
    .map_err(|_| Error::WorkerPanicked)?
    .map_err(|_| Error::WorkerPanicked)?;

    let (estimators, tally) = results.into_iter().fold(
        (PlainEstimators::<T>::default(), I::Tally::default()),
        |(e_acc, mut t_acc), (e, t)| {
            t_acc.merge(t);
            (e_acc + e, t_acc)
        },
    );

    // return the updated rng
    for _ in 0..calls * domain.dim() {
        let _ = rng_global.gen::<T>();
    }

    Ok(Checkpoint::new(rng.clone(), rng_global, estimators, tally))
}

/// Integrate the `integrand` over `domain` using `n_cores` cores.
///
/// The random number generator in its initial state is provided in `rng`
/// together with a `callback` function that prints estimates after each
/// iteration.
/// The number of calls of the integrand per iteration is stored in the slice
/// `iterations`. The results do not depend on `n_cores`.
///
/// # Errors
///
/// Fails if a worker thread panicked.
pub fn integrate<T, R, I>(
    integrand: &I,
    domain: &Domain<T>,
    rng: &R,
    callback: &impl Callback<T, R, PlainEstimators<T>, I::Tally>,
    n_cores: usize,
    iterations: &[usize],
) -> Result<Vec<PlainCheckpoint<T, R, I::Tally>>>
where
    I: Integrand<T>,
    T: Float + AddAssign + FromPrimitive + Send + Sync,
    R: Clone + Rng + Send + Sync,
    Standard: Distribution<T>,
{
    // storage for the results of each iteration
    let mut checkpoints = Vec::with_capacity(iterations.len());

    let mut rng_global = rng.clone();

    // Integration iterations are treated sequentially
    for &calls in iterations {
        let checkpoint = integrate_iteration(integrand, domain, &rng_global, n_cores, calls)?;
        // synchronize the random number generation
        rng_global = checkpoint.rng_after().clone();

        checkpoints.push(checkpoint);
        callback.print(&checkpoints);
    }

    Ok(checkpoints)
}

/// Settings of a [`PlainIntegrator`].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PlainSettings {
    /// Number of iterations the call budget is split into.
    pub iterations: usize,
    /// Number of worker threads.
    pub n_cores: usize,
    /// Seed of the random number generator.
    pub seed: u64,
}

impl Default for PlainSettings {
    fn default() -> Self {
        Self {
            iterations: 5,
            n_cores: 1,
            seed: 0xcafe_f00d_d15e_a5e5,
        }
    }
}

/// A reusable plain integrator. Every integration continues the random number stream of the
/// previous one until [`Integrator::rebuild`] rewinds it to the initial state.
#[derive(Clone, Debug)]
pub struct PlainIntegrator<R, C> {
    seed: R,
    rng: R,
    callback: C,
    n_cores: usize,
    iterations: usize,
}

impl<R: Clone, C> PlainIntegrator<R, C> {
    /// Constructor. The budget of every integration is split into `iterations` iterations that
    /// run on `n_cores` threads.
    pub fn new(rng: R, callback: C, n_cores: usize, iterations: usize) -> Self {
        Self {
            seed: rng.clone(),
            rng,
            callback,
            n_cores: n_cores.max(1),
            iterations: iterations.max(1),
        }
    }

    /// The current state of the random number generator.
    pub const fn rng(&self) -> &R {
        &self.rng
    }
}

impl<C> PlainIntegrator<Pcg64, C> {
    /// Constructs the integrator from `settings`.
    pub fn from_settings(settings: &PlainSettings, callback: C) -> Self {
        Self::new(
            Pcg64::seed_from_u64(settings.seed),
            callback,
            settings.n_cores,
            settings.iterations,
        )
    }
}

impl<R, C, A> Integrator<A> for PlainIntegrator<R, C>
where
    R: Clone + Rng + Send + Sync,
    C: Callback<f64, R, PlainEstimators<f64>, A>,
    A: Tally,
{
    fn integrate<I>(
        &mut self,
        integrand: &I,
        domain: &Domain<f64>,
        calls: usize,
    ) -> Result<(IntegrationResult, A)>
    where
        I: Integrand<f64, Tally = A>,
    {
        let iterations: Vec<_> = (0..self.iterations)
            .map(|it| compute_calls_for_core(it, self.iterations, calls))
            .filter(|&calls| calls > 0)
            .collect();

        let checkpoints = integrate(
            integrand,
            domain,
            &self.rng,
            &self.callback,
            self.n_cores,
            &iterations,
        )?;

        if let Some(last) = checkpoints.last() {
            self.rng = last.rng_after().clone();
        }

        let result = IntegrationResult::from_checkpoints(&checkpoints);
        let tally = checkpoints
            .into_iter()
            .fold(A::default(), |mut acc, checkpoint| {
                acc.merge(checkpoint.destructure().3);
                acc
            });

        Ok((result, tally))
    }

    fn rebuild(&mut self) {
        self.rng = self.seed.clone();
    }
}
