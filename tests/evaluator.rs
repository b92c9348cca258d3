use memir::callbacks::SinkCallback;
use memir::integrators::plain::PlainIntegrator;
use memir::kinematics::LorentzVector;
use memir::objects::{Object, ObjectKind, Observable};
use memir::permutations::{Permutations, Strategy, BTAG_THRESHOLD};
use memir::phase_space::VariableMap;
use memir::providers::reference::{ConstantAmplitude, GaussianResolution, ToyGluonDensity};
use memir::{Components, Config, Error, Evaluator, EvaluatorState, FinalState, Hypothesis, Role};

use assert_approx_eq::assert_approx_eq;
use rand_pcg::Pcg64;

type TestIntegrator = PlainIntegrator<Pcg64, SinkCallback>;
type TestEvaluator =
    Evaluator<GaussianResolution, ConstantAmplitude, ToyGluonDensity, TestIntegrator>;

fn evaluator(config: Config) -> TestEvaluator {
    let integrator = PlainIntegrator::from_settings(&config.integrator, SinkCallback {});
    Evaluator::with_integrator(
        config,
        GaussianResolution::default(),
        ConstantAmplitude { value: 1e-6 },
        ToyGluonDensity::default(),
        integrator,
    )
}

fn jet(pt: f64, eta: f64, phi: f64, btag: f64) -> Object {
    let mut jet = Object::new(LorentzVector::from_pt_eta_phi_m(pt, eta, phi, 0.0), ObjectKind::Jet);
    let e = jet.p4().t;
    jet.add_observable(Observable::EnergyLowLight, 0.6 * e);
    jet.add_observable(Observable::EnergyHighLight, 1.5 * e);
    jet.add_observable(Observable::EnergyLowB, 0.5 * e);
    jet.add_observable(Observable::EnergyHighB, 1.8 * e);
    jet.add_observable(Observable::BTag, btag);
    jet
}

fn jets() -> Vec<Object> {
    vec![
        jet(70.0, 0.5, 0.3, 0.1),
        jet(55.0, -0.2, 1.6, 0.2),
        jet(90.0, 1.0, -0.5, 0.9),
        jet(80.0, -1.2, 2.8, 0.8),
        jet(60.0, 0.1, -2.0, 0.95),
        jet(45.0, 0.7, -1.1, 0.7),
    ]
}

fn add_lepton(evaluator: &mut TestEvaluator, phi: f64, charge: f64) {
    evaluator.add_object(LorentzVector::from_pt_eta_phi_m(50.0, 0.3, phi, 0.0), ObjectKind::Lepton);
    assert!(evaluator.add_observable(Observable::Charge, charge, ObjectKind::Lepton));
}

fn add_met(evaluator: &mut TestEvaluator) {
    evaluator.add_object(LorentzVector::from_args(40.0, -30.0, 26.0, 0.0), ObjectKind::Met);
}

fn semileptonic(config: Config, n_jets: usize) -> TestEvaluator {
    let mut evaluator = evaluator(config);

    for jet in jets().into_iter().take(n_jets) {
        evaluator.push_object(jet);
    }

    add_lepton(&mut evaluator, 2.5, 1.0);
    add_met(&mut evaluator);
    evaluator
}

fn flat_config() -> Config {
    let mut config = Config::default();
    config.components = Components::none();
    config.calls_override = Some(1_000);
    config
}

fn sum_of_constants(jets: &[Object], config: &Config, lost: &[Role]) -> f64 {
    sum_of_constants_for(FinalState::LH, Hypothesis::TTH, jets, config, lost)
}

fn sum_of_constants_for(
    final_state: FinalState,
    hypothesis: Hypothesis,
    jets: &[Object],
    config: &Config,
    lost: &[Role],
) -> f64 {
    let map = VariableMap::new(final_state, hypothesis, lost).unwrap();
    Permutations::new(final_state, jets.len(), config.highpt_first)
        .restrict_to_assumption(jets, lost, &config.strategies, &map.energy_roles())
        .unwrap()
        .constants()
        .iter()
        .sum()
}

#[test]
fn flat_integrand_gives_the_sum_of_permutation_constants() {
    let config = flat_config();
    let expected = sum_of_constants(&jets(), &config, &[]);
    let mut evaluator = semileptonic(config, 6);

    let output = evaluator.run(FinalState::LH, Hypothesis::TTH, &[]).unwrap();

    assert_approx_eq!(output.probability / expected, 1.0, 1e-9);
    assert!(output.error < 1e-9 * output.probability);
    assert_eq!(output.calls, 1_000);
    assert_eq!(output.max_calls, 1_000);
    assert_eq!(output.rejected, 0);
    assert_eq!(output.efficiency, 1.0);
    assert_eq!(output.error_code, 0);
    assert_eq!(output.permutations, 12);
    assert_eq!(evaluator.state(), EvaluatorState::ResultReady);
}

#[test]
fn per_permutation_and_joint_integration_agree_for_flat_integrand() {
    let mut config = flat_config();
    let mut joint = semileptonic(config.clone(), 6);
    let joint = joint.run(FinalState::LH, Hypothesis::TTBB, &[]).unwrap();

    config.per_permutation = true;
    let mut separate = semileptonic(config, 6);
    let separate = separate.run(FinalState::LH, Hypothesis::TTBB, &[]).unwrap();

    assert_eq!(joint.permutations, separate.permutations);
    assert_approx_eq!(joint.probability / separate.probability, 1.0, 1e-9);
    assert_eq!(separate.calls, separate.permutations * joint.calls);
}

#[test]
fn unnormalized_probability_includes_the_volume() {
    let mut config = flat_config();
    config.normalize = false;
    let expected = sum_of_constants(&jets(), &config, &[]);
    let mut evaluator = semileptonic(config, 6);

    let output = evaluator.run(FinalState::LH, Hypothesis::TTH, &[]).unwrap();

    // energy fractions in [0, 1], neutrino cosine in [-1, 1] and azimuth window
    let volume = output.probability / expected;
    assert!(volume > 2.0 && volume <= 4.0 * std::f64::consts::PI + 1e-9);
}

#[test]
fn full_physics_is_finite_and_non_negative() {
    for &hypothesis in [Hypothesis::TTH, Hypothesis::TTBB].iter() {
        let mut evaluator = semileptonic(Config::default(), 6);
        evaluator.set_calls(2_000);

        let output = evaluator.run(FinalState::LH, hypothesis, &[]).unwrap();

        assert!(output.probability.is_finite());
        assert!(output.probability >= 0.0);
        assert!(output.error.is_finite());
        assert_eq!(output.calls, 2_000);
        assert!(output.efficiency > 0.0 && output.efficiency <= 1.0);
        assert_eq!(output.hypothesis, hypothesis);
    }
}

#[test]
fn lost_quark_is_integrated_over() {
    let mut evaluator = semileptonic(Config::default(), 5);
    evaluator.set_calls(1_000);

    let output = evaluator.run(FinalState::LH, Hypothesis::TTH, &[Role::B2]).unwrap();

    assert_eq!(output.assumption, 1);
    assert!(output.permutations > 0);
    assert!(output.probability.is_finite() && output.probability >= 0.0);
}

#[test]
fn undecayed_final_state_runs_without_objects() {
    let mut evaluator = evaluator(Config::default());
    evaluator.set_calls(1_000);

    let output = evaluator.run(FinalState::TTH, Hypothesis::TTH, &[]).unwrap();

    assert_eq!(output.permutations, 1);
    assert_eq!(output.calls, 1_000);
    assert!(output.probability.is_finite() && output.probability >= 0.0);
}

fn dileptonic(config: Config) -> (TestEvaluator, Vec<Object>) {
    let jets = vec![
        jet(90.0, 1.0, -0.5, 0.9),
        jet(80.0, -1.2, 2.8, 0.8),
        jet(60.0, 0.1, -2.0, 0.95),
        jet(45.0, 0.7, -1.1, 0.7),
    ];
    let mut evaluator = evaluator(config);

    for jet in jets.iter().cloned() {
        evaluator.push_object(jet);
    }

    add_lepton(&mut evaluator, 2.5, 1.0);
    add_lepton(&mut evaluator, -0.4, -1.0);
    add_met(&mut evaluator);
    (evaluator, jets)
}

fn fully_hadronic(config: Config) -> (TestEvaluator, Vec<Object>) {
    let jets = vec![
        jet(70.0, 0.5, 0.3, 0.1),
        jet(55.0, -0.2, 1.6, 0.2),
        jet(90.0, 1.0, -0.5, 0.9),
        jet(65.0, -0.8, -2.6, 0.15),
        jet(50.0, 1.3, 2.2, 0.3),
        jet(80.0, -1.2, 2.8, 0.8),
        jet(60.0, 0.1, -2.0, 0.95),
        jet(45.0, 0.7, -1.1, 0.7),
    ];
    let mut evaluator = evaluator(config);

    for jet in jets.iter().cloned() {
        evaluator.push_object(jet);
    }

    add_met(&mut evaluator);
    (evaluator, jets)
}

#[test]
fn dileptonic_final_state() {
    let mut config = flat_config();
    config.normalize = false;
    let (mut evaluator, jets) = dileptonic(config.clone());

    let output = evaluator.run(FinalState::LL, Hypothesis::TTH, &[]).unwrap();

    // one permutation per ordered choice of the two top b quarks out of four tagged jets
    assert_eq!(output.permutations, 12);
    assert_eq!(output.final_state, FinalState::LL);

    // two neutrino directions and the energy of the first Higgs b quark
    let expected = sum_of_constants_for(FinalState::LL, Hypothesis::TTH, &jets, &config, &[]);
    let volume = 16.0 * std::f64::consts::PI * std::f64::consts::PI;
    assert_approx_eq!(output.probability / expected, volume, 1e-9 * volume);

    for &hypothesis in [Hypothesis::TTH, Hypothesis::TTBB].iter() {
        evaluator.next_hypothesis();
        evaluator.set_config(Config::default());
        evaluator.set_calls(1_000);

        let output = evaluator.run(FinalState::LL, hypothesis, &[]).unwrap();

        assert_eq!(output.permutations, 12);
        assert_eq!(output.calls, 1_000);
        assert!(output.probability.is_finite() && output.probability >= 0.0);
        assert!(output.error.is_finite());
        assert!(output.efficiency >= 0.0 && output.efficiency <= 1.0);
    }
}

#[test]
fn fully_hadronic_final_state() {
    let mut config = flat_config();
    config.normalize = false;
    let (mut evaluator, jets) = fully_hadronic(config.clone());

    let output = evaluator.run(FinalState::HH, Hypothesis::TTH, &[]).unwrap();

    // ordered top b quarks (12) times the pairings of four light jets into two W bosons (6)
    assert_eq!(output.permutations, 72);
    assert_eq!(output.final_state, FinalState::HH);

    // the energies of two light quarks and of the first Higgs b quark are fractions in [0, 1]
    let expected = sum_of_constants_for(FinalState::HH, Hypothesis::TTH, &jets, &config, &[]);
    assert_approx_eq!(output.probability / expected, 1.0, 1e-9);

    for &hypothesis in [Hypothesis::TTH, Hypothesis::TTBB].iter() {
        evaluator.next_hypothesis();
        evaluator.set_config(Config::default());
        evaluator.set_calls(1_000);

        let output = evaluator.run(FinalState::HH, hypothesis, &[]).unwrap();

        assert_eq!(output.permutations, 72);
        assert_eq!(output.calls, 1_000);
        assert!(output.probability.is_finite() && output.probability >= 0.0);
        assert!(output.error.is_finite());
        assert!(output.efficiency >= 0.0 && output.efficiency <= 1.0);
    }
}

#[test]
fn scenario_a_all_jets_observed() {
    let jets = jets();
    let config = Config::default();
    let map = VariableMap::new(FinalState::LH, Hypothesis::TTH, &[]).unwrap();
    let assumption = Permutations::new(FinalState::LH, 6, false)
        .restrict_to_assumption(&jets, &[], &config.strategies, &map.energy_roles())
        .unwrap();

    assert!(!assumption.is_empty());
    assert_eq!(assumption.extra_jets(), 0);
    assert!(assumption
        .permutations()
        .iter()
        .all(|perm| perm.len() == 6 && perm.iter().all(Option::is_some)));
    assert!(assumption.constants().iter().all(|&c| c > 0.0));
}

#[test]
fn scenario_b_too_few_jets_give_a_zero_result() {
    let mut evaluator = semileptonic(flat_config(), 4);

    let output = evaluator.run(FinalState::LH, Hypothesis::TTH, &[Role::B]).unwrap();

    assert_eq!(output.probability, 0.0);
    assert_eq!(output.error, 0.0);
    assert_eq!(output.permutations, 0);
    assert_eq!(output.calls, 0);
    assert_eq!(output.assumption, 1);
    assert_eq!(evaluator.state(), EvaluatorState::ResultReady);
}

#[test]
fn scenario_c_btag_pruning() {
    let jets = jets();
    let permutations = Permutations::new(FinalState::LH, 6, false);
    let b_slots: Vec<_> = [Role::B1, Role::B2, Role::B, Role::BBar]
        .iter()
        .map(|&role| FinalState::LH.jet_slot(role).unwrap())
        .collect();

    let assumption = permutations
        .restrict_to_assumption(&jets, &[], &[Strategy::BTagged], &[])
        .unwrap();

    assert!(!assumption.is_empty());

    for perm in assumption.permutations() {
        for &slot in &b_slots {
            let btag = jets[perm[slot].unwrap()].observable(Observable::BTag).unwrap();
            assert!(btag >= BTAG_THRESHOLD);
        }
    }

    // jet 0 is untagged and cannot be the b quark of the hadronic top
    let mut perm: Vec<_> = (0..6).map(Some).collect();
    perm.swap(0, 2);
    assert!(!permutations.accept(&perm, &jets, &[Strategy::BTagged], &[]));
}

#[test]
fn scenario_d_interchange_symmetry() {
    let jets = jets();
    let permutations = Permutations::new(FinalState::LH, 6, false);
    let q1 = FinalState::LH.jet_slot(Role::Q1).unwrap();
    let qbar1 = FinalState::LH.jet_slot(Role::QBar1).unwrap();
    let b = FinalState::LH.jet_slot(Role::B).unwrap();
    let bbar = FinalState::LH.jet_slot(Role::BBar).unwrap();

    let accepted: Vec<_> = (0..6).map(Some).collect();
    let mut swapped = accepted.clone();
    swapped.swap(q1, qbar1);

    let strategies = [Strategy::QQbarSymmetry];
    assert!(!permutations.accept(&swapped, &jets, &strategies, &[accepted.clone()]));

    // swapping the b pair of the Higgs as well is discarded by both variants
    swapped.swap(b, bbar);
    assert!(!permutations.accept(&swapped, &jets, &strategies, &[accepted.clone()]));
    assert!(!permutations.accept(&swapped, &jets, &[Strategy::BBbarSymmetry], &[accepted.clone()]));

    // a different b quark for the hadronic top is kept
    let b1 = FinalState::LH.jet_slot(Role::B1).unwrap();
    let b2 = FinalState::LH.jet_slot(Role::B2).unwrap();
    let mut other_top = accepted.clone();
    other_top.swap(b1, b2);
    assert!(permutations.accept(&other_top, &jets, &strategies, &[accepted]));

    let assumption = permutations
        .restrict_to_assumption(&jets, &[], &strategies, &[])
        .unwrap();
    let all = permutations
        .restrict_to_assumption(&jets, &[], &[], &[])
        .unwrap();
    // both orders of the W pair and of the Higgs pair collapse into one
    assert_eq!(4 * assumption.len(), all.len());
}

#[test]
fn lepton_count_must_match_the_final_state() {
    let mut evaluator = semileptonic(flat_config(), 6);

    match evaluator.run(FinalState::LL, Hypothesis::TTH, &[]) {
        Err(Error::LeptonCountMismatch {
            final_state,
            expected,
            found,
        }) => {
            assert_eq!(final_state, FinalState::LL);
            assert_eq!(expected, 2);
            assert_eq!(found, 1);
        }
        other => panic!("unexpected result {:?}", other),
    }

    // the objects are kept after a failed run
    assert_eq!(evaluator.state(), EvaluatorState::Configured);
    assert!(evaluator.run(FinalState::LH, Hypothesis::TTH, &[]).is_ok());
}

#[test]
fn missing_met_is_an_error() {
    let mut evaluator = evaluator(flat_config());
    for jet in jets() {
        evaluator.push_object(jet);
    }
    add_lepton(&mut evaluator, 2.5, -1.0);

    assert!(matches!(
        evaluator.run(FinalState::LH, Hypothesis::TTH, &[]),
        Err(Error::MissingObject(FinalState::LH, ObjectKind::Met))
    ));
}

#[test]
fn invalid_hypotheses_and_lost_roles_are_errors() {
    let mut evaluator = semileptonic(flat_config(), 6);

    assert!(matches!(
        evaluator.run(FinalState::LH, Hypothesis::TTH, &[Role::Q2]),
        Err(Error::InvalidLostRole(FinalState::LH, Role::Q2))
    ));
    assert!(matches!(
        evaluator.run(FinalState::LH, Hypothesis::TTH, &[Role::B, Role::B]),
        Err(Error::DuplicateLostRole(Role::B))
    ));

    evaluator.next_event();
    assert!(matches!(
        evaluator.run(FinalState::TTH, Hypothesis::TTBB, &[]),
        Err(Error::UnsupportedHypothesis(FinalState::TTH, Hypothesis::TTBB))
    ));
}

#[test]
fn next_event_starts_over() {
    let mut evaluator = semileptonic(flat_config(), 6);
    evaluator.set_calls(500);
    let first = evaluator.run(FinalState::LH, Hypothesis::TTH, &[]).unwrap();
    assert_eq!(first.max_calls, 500);

    evaluator.next_event();
    assert_eq!(evaluator.state(), EvaluatorState::Uninitialized);
    assert!(evaluator.objects(ObjectKind::Jet).is_empty());

    // the call override was reset to the budget table
    evaluator.set_components(Components::none());
    for jet in jets() {
        evaluator.push_object(jet);
    }
    add_lepton(&mut evaluator, 2.5, 1.0);
    add_met(&mut evaluator);

    let second = evaluator.run(FinalState::LH, Hypothesis::TTH, &[]).unwrap();
    assert_eq!(second.max_calls, 2_000);
    assert_approx_eq!(second.probability / first.probability, 1.0, 1e-9);
}

#[test]
fn hypotheses_share_the_objects_of_an_event() {
    let mut evaluator = semileptonic(flat_config(), 6);

    let tth = evaluator.run(FinalState::LH, Hypothesis::TTH, &[]).unwrap();
    evaluator.next_hypothesis();
    let ttbb = evaluator.run(FinalState::LH, Hypothesis::TTBB, &[]).unwrap();

    // tt+bb integrates the second b energy as well, which adds its window to the constants
    assert_eq!(tth.permutations, ttbb.permutations);
    assert!(ttbb.probability > tth.probability);
    assert_eq!(evaluator.objects(ObjectKind::Jet).len(), 6);
}
