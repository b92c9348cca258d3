//! The event and hypothesis lifecycle: objects are collected per event, and every call to
//! [`Evaluator::run`] integrates the probability of one final state, hypothesis and assumption
//! about lost quarks.

use crate::callbacks::LogCallback;
use crate::config::{Components, Config};
use crate::core::{Domain, Tally};
use crate::error::{Error, Result};
use crate::integrand::{EvaluationTally, MemIntegrand};
use crate::integrators::plain::PlainIntegrator;
use crate::integrators::Integrator;
use crate::kinematics::LorentzVector;
use crate::objects::{Object, ObjectKind, Observable};
use crate::permutations::{Assumption, Permutations, Strategy};
use crate::phase_space::{builder_for, BuildContext, Event, VariableMap};
use crate::providers::{MatrixElement, PartonDensity, ResolutionModel};
use crate::topology::{FinalState, Hypothesis, Role, TfKind};
use log::{debug, warn};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::f64::consts::PI;
use std::fmt;
use std::time::Instant;

/// The lifecycle state of an [`Evaluator`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EvaluatorState {
    /// No objects have been added for the current event.
    Uninitialized,
    /// Objects were added, the evaluator is ready to run a hypothesis.
    Configured,
    /// An integration is in progress.
    Integrating,
    /// A result was produced; call [`Evaluator::next_hypothesis`] or [`Evaluator::next_event`].
    ResultReady,
}

/// The result of one [`Evaluator::run`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MemOutput {
    /// Probability of the event under the hypothesis.
    pub probability: f64,
    /// Statistical uncertainty of `probability`.
    pub error: f64,
    /// $\chi^2$ per degree of freedom reported by the integrator.
    pub chi2: f64,
    /// Wall-clock time of the integration in milliseconds.
    pub time_ms: u64,
    /// Number of permutations integrated.
    pub permutations: usize,
    /// Final state.
    pub final_state: FinalState,
    /// Hypothesis.
    pub hypothesis: Hypothesis,
    /// Number of lost quarks assumed.
    pub assumption: usize,
    /// Call budget of the integrator.
    pub max_calls: usize,
    /// Number of integrand evaluations.
    pub calls: usize,
    /// Number of phase-space points without a physical solution.
    pub rejected: usize,
    /// `calls / (calls + rejected)`.
    pub efficiency: f64,
    /// One if a non-finite transfer function or matrix element was set to zero during the
    /// current event, zero otherwise.
    pub error_code: u32,
}

impl MemOutput {
    fn empty(final_state: FinalState, hypothesis: Hypothesis, assumption: usize) -> Self {
        Self {
            probability: 0.0,
            error: 0.0,
            chi2: 0.0,
            time_ms: 0,
            permutations: 0,
            final_state,
            hypothesis,
            assumption,
            max_calls: 0,
            calls: 0,
            rejected: 0,
            efficiency: 0.0,
            error_code: 0,
        }
    }

    /// Relative uncertainty of the probability, zero if the probability vanishes.
    pub fn relative_error(&self) -> f64 {
        if self.probability == 0.0 {
            0.0
        } else {
            self.error / self.probability
        }
    }
}

impl fmt::Display for MemOutput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{:?} {:?} with {} lost quark(s): p = {:e} \u{b1} {:e} ({:.1}%), chi2/dof = {:.3}",
            self.final_state,
            self.hypothesis,
            self.assumption,
            self.probability,
            self.error,
            100.0 * self.relative_error(),
            self.chi2
        )?;
        write!(
            f,
            "  {} permutation(s), {}/{} calls, {} rejected, efficiency {:.3}, {} ms, error code {}",
            self.permutations,
            self.calls,
            self.max_calls,
            self.rejected,
            self.efficiency,
            self.time_ms,
            self.error_code
        )
    }
}

/// Evaluates the probability of observed events under the ttH and tt+bb hypotheses.
///
/// `T`, `M` and `P` are the detector resolution model, the matrix element and the parton
/// densities; `G` is the integrator, by default the bundled [`PlainIntegrator`].
pub struct Evaluator<T, M, P, G = PlainIntegrator<Pcg64, LogCallback>> {
    config: Config,
    resolution: T,
    matrix: M,
    pdf: P,
    integrator: G,
    jets: Vec<Object>,
    leptons: Vec<Object>,
    mets: Vec<Object>,
    permutations: Option<Permutations>,
    state: EvaluatorState,
    error_code: u32,
}

impl<T, M, P> Evaluator<T, M, P>
where
    T: ResolutionModel,
    M: MatrixElement,
    P: PartonDensity,
{
    /// Constructs an evaluator with a [`PlainIntegrator`] configured by `config.integrator`.
    pub fn new(config: Config, resolution: T, matrix: M, pdf: P) -> Self {
        let integrator = PlainIntegrator::from_settings(&config.integrator, LogCallback {});
        Self::with_integrator(config, resolution, matrix, pdf, integrator)
    }
}

impl<T, M, P, G> Evaluator<T, M, P, G>
where
    T: ResolutionModel,
    M: MatrixElement,
    P: PartonDensity,
    G: Integrator<EvaluationTally>,
{
    /// Constructs an evaluator that integrates with `integrator`.
    pub fn with_integrator(
        config: Config,
        resolution: T,
        matrix: M,
        pdf: P,
        integrator: G,
    ) -> Self {
        Self {
            config,
            resolution,
            matrix,
            pdf,
            integrator,
            jets: Vec::new(),
            leptons: Vec::new(),
            mets: Vec::new(),
            permutations: None,
            state: EvaluatorState::Uninitialized,
            error_code: 0,
        }
    }

    /// The current lifecycle state.
    pub const fn state(&self) -> EvaluatorState {
        self.state
    }

    /// The current configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The objects of `kind` added for the current event.
    pub fn objects(&self, kind: ObjectKind) -> &[Object] {
        match kind {
            ObjectKind::Jet => &self.jets,
            ObjectKind::Lepton => &self.leptons,
            ObjectKind::Met => &self.mets,
        }
    }

    /// Adds an observed object to the current event. Jets are permuted in the order they are
    /// added.
    pub fn add_object(&mut self, p4: LorentzVector<f64>, kind: ObjectKind) {
        self.push_object(Object::new(p4, kind));
    }

    /// Adds an already assembled object to the current event.
    pub fn push_object(&mut self, object: Object) {
        match object.kind() {
            ObjectKind::Jet => self.jets.push(object),
            ObjectKind::Lepton => self.leptons.push(object),
            ObjectKind::Met => self.mets.push(object),
        }

        if self.state == EvaluatorState::Uninitialized {
            self.state = EvaluatorState::Configured;
        }
    }

    /// Sets an observable of the most recently added object of `kind`. Returns `false` if there
    /// is no such object or the observable was already set.
    pub fn add_observable(&mut self, name: Observable, value: f64, kind: ObjectKind) -> bool {
        let objects = match kind {
            ObjectKind::Jet => &mut self.jets,
            ObjectKind::Lepton => &mut self.leptons,
            ObjectKind::Met => &mut self.mets,
        };

        objects
            .last_mut()
            .map_or(false, |object| object.add_observable(name, value))
    }

    /// Uses `calls` integrand evaluations for every run of the current event instead of the
    /// budget table.
    pub fn set_calls(&mut self, calls: usize) {
        self.config.calls_override = Some(calls);
    }

    /// Sets the centre-of-mass energy in GeV.
    pub fn set_sqrts(&mut self, sqrts: f64) {
        self.config.sqrts = sqrts;
    }

    /// Selects the factors of the integrand.
    pub fn set_components(&mut self, components: Components) {
        self.config.components = components;
    }

    /// Sets the permutation pruning strategies.
    pub fn set_strategies(&mut self, strategies: Vec<Strategy>) {
        self.config.strategies = strategies;
    }

    /// Replaces the configuration. The integrator keeps the settings it was constructed with.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Integrates the probability of the current event for `final_state` under `hypothesis`,
    /// assuming the quarks in `lost` were not reconstructed. An assumption that needs more jets
    /// than were observed yields a zero result.
    ///
    /// # Errors
    ///
    /// Fails if the observed leptons or missing transverse momentum do not match `final_state`,
    /// if `hypothesis` cannot be tested in `final_state`, if `lost` is not a list of distinct
    /// jet-matched roles of `final_state`, or if the integrator fails.
    pub fn run(
        &mut self,
        final_state: FinalState,
        hypothesis: Hypothesis,
        lost: &[Role],
    ) -> Result<MemOutput> {
        let start = Instant::now();

        let result = self
            .init(final_state, hypothesis)
            .and_then(|_| self.make_assumption(final_state, hypothesis, lost));

        self.next_hypothesis();

        let mut output = result?;
        output.error_code = self.error_code;
        self.state = EvaluatorState::ResultReady;

        debug!(
            "run finished in {} ms:\n{}",
            start.elapsed().as_millis(),
            output
        );

        Ok(output)
    }

    /// Discards the state of the last hypothesis and keeps the objects of the event.
    pub fn next_hypothesis(&mut self) {
        self.permutations = None;
        self.state = if self.jets.is_empty() && self.leptons.is_empty() && self.mets.is_empty() {
            EvaluatorState::Uninitialized
        } else {
            EvaluatorState::Configured
        };
    }

    /// Discards all objects, the error code and a call budget set with
    /// [`Evaluator::set_calls`].
    pub fn next_event(&mut self) {
        self.jets.clear();
        self.leptons.clear();
        self.mets.clear();
        self.permutations = None;
        self.error_code = 0;
        self.config.calls_override = None;
        self.state = EvaluatorState::Uninitialized;
    }

    fn init(&mut self, final_state: FinalState, hypothesis: Hypothesis) -> Result<()> {
        if !final_state.supports(hypothesis) {
            return Err(Error::UnsupportedHypothesis(final_state, hypothesis));
        }

        if self.leptons.len() != final_state.lepton_count() {
            return Err(Error::LeptonCountMismatch {
                final_state,
                expected: final_state.lepton_count(),
                found: self.leptons.len(),
            });
        }

        if final_state.requires_met() && self.mets.is_empty() {
            return Err(Error::MissingObject(final_state, ObjectKind::Met));
        }

        let n_jets = if final_state.quark_slots() > 0 {
            self.fill_energy_windows();
            self.jets.len()
        } else {
            0
        };

        self.permutations = Some(Permutations::new(
            final_state,
            n_jets,
            self.config.highpt_first,
        ));

        debug!(
            "{:?} {:?}: {} jet(s), {} lepton(s), {} unknown(s)",
            final_state,
            hypothesis,
            n_jets,
            self.leptons.len(),
            final_state.unknowns(hypothesis, self.leptons.len(), self.mets.len().min(1))
        );

        Ok(())
    }

    /// Computes the energy windows that were not added as observables.
    fn fill_energy_windows(&mut self) {
        for jet in &mut self.jets {
            let reco = [jet.p4().t, jet.p4().eta()];

            for &(b, kind, cl, low, high) in [
                (
                    false,
                    TfKind::QReco,
                    self.config.jet_range_cl,
                    Observable::EnergyLowLight,
                    Observable::EnergyHighLight,
                ),
                (
                    true,
                    TfKind::BReco,
                    self.config.bjet_range_cl,
                    Observable::EnergyLowB,
                    Observable::EnergyHighB,
                ),
            ]
            .iter()
            {
                if jet.energy_window(b).is_none() {
                    let (e_low, e_high) = self.resolution.support(&reco, kind, cl);
                    jet.add_observable(low, e_low);
                    jet.add_observable(high, e_high);
                }
            }
        }
    }

    /// The window of the neutrino azimuth relative to the missing transverse momentum.
    fn neutrino_phi(&self, final_state: FinalState) -> (f64, f64) {
        match self.mets.first() {
            Some(met) if final_state == FinalState::LH && self.config.met_range_cl < 1.0 => {
                self.resolution.support(
                    &[met.p4().x, met.p4().y],
                    TfKind::Met,
                    self.config.met_range_cl,
                )
            }
            _ => (-PI, PI),
        }
    }

    fn make_assumption(
        &mut self,
        final_state: FinalState,
        hypothesis: Hypothesis,
        lost: &[Role],
    ) -> Result<MemOutput> {
        let max_calls = self.config.calls_for(final_state, hypothesis, lost.len());
        let map = VariableMap::new(final_state, hypothesis, lost)?;
        let mut output = MemOutput::empty(final_state, hypothesis, lost.len());
        output.max_calls = max_calls;

        let assumption = match &self.permutations {
            Some(permutations) => permutations.restrict_to_assumption(
                &self.jets,
                lost,
                &self.config.strategies,
                &map.energy_roles(),
            ),
            None => None,
        };

        let assumption = match assumption {
            Some(assumption) => assumption,
            None => {
                warn!(
                    "{} jet(s) are too few to assume {} lost quark(s) in {:?}, skipped",
                    self.jets.len(),
                    lost.len(),
                    final_state
                );
                return Ok(output);
            }
        };

        let (lower, upper) = map.bounds(self.config.emax, self.neutrino_phi(final_state));
        let domain = Domain::new(lower, upper)?;
        let volume = domain.volume();

        debug!("variables [{}]", map);
        debug!("bounds {:?} to {:?}, volume {}", domain.lower(), domain.upper(), volume);

        output.permutations = assumption.len();

        if assumption.is_empty() {
            debug!("no permutation survived the pruning");
            return Ok(output);
        }

        self.state = EvaluatorState::Integrating;

        let start = Instant::now();
        let (probability, error, chi2, tally) =
            self.integrate(&map, &domain, &assumption, hypothesis, max_calls)?;
        let elapsed = start.elapsed();

        let (probability, error) = if self.config.normalize {
            (probability / volume, error / volume)
        } else {
            (probability, error)
        };

        if tally.non_finite > 0 {
            warn!("{} non-finite value(s) were set to zero", tally.non_finite);
            self.error_code = 1;
        }

        output.probability = probability;
        output.error = error;
        output.chi2 = chi2;
        output.time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        output.calls = tally.calls;
        output.rejected = tally.rejected;
        output.efficiency = if tally.calls + tally.rejected == 0 {
            0.0
        } else {
            tally.calls as f64 / (tally.calls + tally.rejected) as f64
        };

        Ok(output)
    }

    /// Integrates either the sum over all permutations or every permutation separately and
    /// returns the probability, its uncertainty, the $\chi^2$ and the merged tally.
    fn integrate(
        &mut self,
        map: &VariableMap,
        domain: &Domain<f64>,
        assumption: &Assumption,
        hypothesis: Hypothesis,
        calls: usize,
    ) -> Result<(f64, f64, f64, EvaluationTally)> {
        let final_state = map.final_state();
        let builder = builder_for(final_state);
        let ctx = BuildContext {
            event: Event {
                jets: &self.jets,
                leptons: &self.leptons,
                met: self.mets.first(),
            },
            map,
            hypothesis,
            emax: self.config.emax,
        };
        let mut integrand = MemIntegrand::new(
            &self.config,
            &self.resolution,
            &self.matrix,
            &self.pdf,
            builder.as_ref(),
            ctx,
            assumption,
        );

        let mut tally = EvaluationTally::default();

        if self.config.per_permutation {
            let n_perm = assumption.len() as f64;
            let mut probability = 0.0;
            let mut err2 = 0.0;
            let mut chi2 = 0.0;

            for perm in 0..assumption.len() {
                integrand.select(Some(perm));
                self.integrator.rebuild();
                let (result, perm_tally) = self.integrator.integrate(&integrand, domain, calls)?;

                debug!(
                    "permutation {} {:?}: p = {:e} \u{b1} {:e}",
                    perm,
                    assumption.permutations()[perm],
                    result.value,
                    result.error
                );

                probability += result.value;
                err2 += result.error * result.error;
                chi2 += result.chi2 / n_perm;
                tally.merge(perm_tally);
            }

            Ok((probability, err2.sqrt(), chi2, tally))
        } else {
            self.integrator.rebuild();
            let (result, joint_tally) = self.integrator.integrate(&integrand, domain, calls)?;
            tally.merge(joint_tally);

            Ok((result.value, result.error, result.chi2, tally))
        }
    }
}
