//! Configuration of the evaluator.

use crate::error::Result;
use crate::integrators::plain::PlainSettings;
use crate::permutations::Strategy;
use crate::topology::{FinalState, Hypothesis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The factors of the integrand that are evaluated. Disabled factors are replaced by one.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Components {
    /// Normalization $(2\pi)^{4 - 3n}/s^2$.
    pub constants: bool,
    /// Transfer functions of jets and of the missing transverse momentum.
    pub transfer: bool,
    /// Corrects the neutrino momenta for the mismeasured jet energies.
    pub recoil: bool,
    /// Transfer function of the hadronic recoil.
    pub sudakov: bool,
    /// Squared matrix element of the hard scattering.
    pub scattering: bool,
    /// Propagators and squared amplitudes of the top and Higgs decays.
    pub decay: bool,
    /// Jacobians of the decays.
    pub jacobian: bool,
    /// Parton densities.
    pub pdf: bool,
}

impl Components {
    /// Every factor enabled.
    pub const fn all() -> Self {
        Self {
            constants: true,
            transfer: true,
            recoil: true,
            sudakov: true,
            scattering: true,
            decay: true,
            jacobian: true,
            pdf: true,
        }
    }

    /// Every factor disabled: the integrand is one for every accepted point.
    pub const fn none() -> Self {
        Self {
            constants: false,
            transfer: false,
            recoil: false,
            sudakov: false,
            scattering: false,
            decay: false,
            jacobian: false,
            pdf: false,
        }
    }

    /// Returns `true` if no factor is enabled.
    pub fn is_flat(&self) -> bool {
        *self == Self::none()
    }
}

impl Default for Components {
    fn default() -> Self {
        Self::all()
    }
}

/// Number of integrand calls for a (final state, hypothesis, number of lost quarks) combination.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CallEntry {
    /// Final state.
    pub final_state: FinalState,
    /// Hypothesis.
    pub hypothesis: Hypothesis,
    /// Number of lost quarks.
    pub lost: usize,
    /// Number of calls.
    pub calls: usize,
}

/// Lookup table of call budgets.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct CallTable {
    /// Budgets of specific combinations.
    pub entries: Vec<CallEntry>,
    /// Budget of every combination without an entry.
    pub fallback: usize,
}

impl CallTable {
    /// The budget for `final_state`, `hypothesis` and `lost` lost quarks.
    pub fn lookup(&self, final_state: FinalState, hypothesis: Hypothesis, lost: usize) -> usize {
        self.entries
            .iter()
            .find(|e| e.final_state == final_state && e.hypothesis == hypothesis && e.lost == lost)
            .map_or(self.fallback, |e| e.calls)
    }

    /// Sets the budget for a combination, replacing a previous entry.
    pub fn insert(
        &mut self,
        final_state: FinalState,
        hypothesis: Hypothesis,
        lost: usize,
        calls: usize,
    ) {
        self.entries.retain(|e| {
            !(e.final_state == final_state && e.hypothesis == hypothesis && e.lost == lost)
        });
        self.entries.push(CallEntry {
            final_state,
            hypothesis,
            lost,
            calls,
        });
    }
}

impl Default for CallTable {
    fn default() -> Self {
        let mut table = Self {
            entries: Vec::new(),
            fallback: 20_000,
        };

        for &(final_state, base) in [
            (FinalState::LH, 2_000),
            (FinalState::LL, 2_000),
            (FinalState::HH, 2_500),
        ]
        .iter()
        {
            for &(hypothesis, factor) in [(Hypothesis::TTH, 1), (Hypothesis::TTBB, 2)].iter() {
                for lost in 0..3 {
                    let calls = base * factor * 10_usize.pow(lost as u32);
                    table.insert(final_state, hypothesis, lost, calls);
                }
            }
        }

        table.insert(FinalState::TTH, Hypothesis::TTH, 0, 10_000);
        table
    }
}

/// Configuration of the [`Evaluator`](crate::orchestrator::Evaluator). Every field has a default,
/// so configuration files only need to contain what differs.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Centre-of-mass energy $\sqrt{s}$ in GeV.
    pub sqrts: f64,
    /// Upper energy of partons without a jet and upper momentum of undecayed tops, in GeV.
    pub emax: f64,
    /// Active factors of the integrand.
    pub components: Components,
    /// Call budgets.
    pub calls: CallTable,
    /// A budget used instead of the table, set with
    /// [`Evaluator::set_calls`](crate::orchestrator::Evaluator::set_calls).
    pub calls_override: Option<usize>,
    /// Pruning strategies, applied in order.
    pub strategies: Vec<Strategy>,
    /// Integrate every permutation separately instead of their sum.
    pub per_permutation: bool,
    /// Order jets with larger transverse momentum first when enumerating permutations.
    pub highpt_first: bool,
    /// Confidence level of the energy windows of light-quark jets.
    pub jet_range_cl: f64,
    /// Confidence level of the energy windows of b-quark jets.
    pub bjet_range_cl: f64,
    /// Confidence level of the window of the neutrino azimuth; values of one or larger use the
    /// full circle.
    pub met_range_cl: f64,
    /// Points with at least this many transfer functions out of range are skipped; zero disables
    /// the check.
    pub tf_suppress: usize,
    /// Number of standard deviations beyond which a transfer function is out of range.
    pub tf_offscale: f64,
    /// Divide the probability by the volume of the integration domain.
    pub normalize: bool,
    /// Settings of the default integrator.
    pub integrator: PlainSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sqrts: 13_000.0,
            emax: 4_000.0,
            components: Components::default(),
            calls: CallTable::default(),
            calls_override: None,
            strategies: vec![Strategy::BTagged, Strategy::QUntagged, Strategy::QQbarSymmetry],
            per_permutation: false,
            highpt_first: false,
            jet_range_cl: 0.98,
            bjet_range_cl: 0.95,
            met_range_cl: 0.99,
            tf_suppress: 0,
            tf_offscale: 3.0,
            normalize: true,
            integrator: PlainSettings::default(),
        }
    }
}

impl Config {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Fails if `json` is not a valid configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not contain a valid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// The call budget for an assumption with `lost` lost quarks.
    pub fn calls_for(&self, final_state: FinalState, hypothesis: Hypothesis, lost: usize) -> usize {
        self.calls_override
            .unwrap_or_else(|| self.calls.lookup(final_state, hypothesis, lost))
    }
}
