//! Integrators and the combination of their per-iteration estimates.
pub mod plain;

use crate::core::estimators::{BasicEstimators, Estimators, MeanVar};
use crate::core::{Checkpoint, Domain, Integrand, Tally};
use crate::error::Result;
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};

/// Final estimate of an integration.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct IntegrationResult {
    /// Estimate of the integral.
    pub value: f64,
    /// Statistical uncertainty of `value`.
    pub error: f64,
    /// $\chi^2$ per degree of freedom of the iteration estimates.
    pub chi2: f64,
}

impl IntegrationResult {
    /// Combines the estimates of all `checkpoints`, see [`weighted_average`].
    pub fn from_checkpoints<R, E, A>(checkpoints: &[Checkpoint<R, E, A>]) -> Self
    where
        E: Estimators<f64>,
    {
        let (estimate, chi2) = weighted_average(
            checkpoints
                .iter()
                .map(|c| MeanVar::new(c.estimators().mean(), c.estimators().var())),
        );

        Self {
            value: estimate.mean(),
            error: estimate.std(),
            chi2,
        }
    }
}

/// Combines independent estimates $E_i \pm \sigma_i$ by weighting each with $1/\sigma_i^2$ and
/// returns the combination together with
///
/// $$ \chi^2/\mathrm{dof} = \frac{1}{n-1} \sum_{i=1}^n \frac{(E_i - \bar{E})^2}{\sigma_i^2} $$
///
/// If any estimate has a vanishing variance, the estimates are averaged with equal weights
/// instead. For less than two estimates the $\chi^2$ is zero.
pub fn weighted_average<T, I>(estimates: I) -> (MeanVar<T>, T)
where
    T: Float + FromPrimitive,
    I: IntoIterator<Item = MeanVar<T>>,
{
    let estimates: Vec<_> = estimates.into_iter().collect();
    let n = T::from_usize(estimates.len()).unwrap_or_else(T::zero);

    if estimates.is_empty() {
        return (MeanVar::new(T::zero(), T::zero()), T::zero());
    }

    let combined = if estimates.iter().all(|e| e.var() > T::zero()) {
        let (sum_w, sum_wm) = estimates.iter().fold((T::zero(), T::zero()), |(w, wm), e| {
            let weight = e.var().recip();
            (w + weight, wm + weight * e.mean())
        });
        MeanVar::new(sum_wm / sum_w, sum_w.recip())
    } else {
        let (sum_m, sum_v) = estimates
            .iter()
            .fold((T::zero(), T::zero()), |(m, v), e| (m + e.mean(), v + e.var()));
        MeanVar::new(sum_m / n, sum_v / (n * n))
    };

    let chi2 = if estimates.len() > 1 {
        estimates
            .iter()
            .filter(|e| e.var() > T::zero())
            .map(|e| (e.mean() - combined.mean()).powi(2) / e.var())
            .fold(T::zero(), |acc, x| acc + x)
            / (n - T::one())
    } else {
        T::zero()
    };

    (combined, chi2)
}

/// An integrator that can be driven repeatedly over the same or different integrands. The
/// integrand is integrated over `domain`; its tally type is `A`.
pub trait Integrator<A: Tally> {
    /// Integrates `integrand` over `domain` using `calls` evaluations and returns the estimate
    /// together with the merged tally of all calls.
    ///
    /// # Errors
    ///
    /// Fails if a worker thread panicked.
    fn integrate<I>(
        &mut self,
        integrand: &I,
        domain: &Domain<f64>,
        calls: usize,
    ) -> Result<(IntegrationResult, A)>
    where
        I: Integrand<f64, Tally = A>;

    /// Resets the integrator to the state it was constructed in, so that the next integration
    /// does not depend on previous ones.
    fn rebuild(&mut self);
}
