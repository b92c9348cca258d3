use memir::kinematics::LorentzVector;
use memir::objects::{ObjectKind, Observable};
use memir::providers::reference::{ConstantAmplitude, GaussianResolution, ToyGluonDensity};
use memir::{Config, Evaluator, FinalState, Hypothesis, Role};

use std::env;

/// (pt, eta, phi, b-tag score) of the jets of a semi-leptonic ttH candidate.
const JETS: [(f64, f64, f64, f64); 6] = [
    (70.0, 0.5, 0.3, 0.1),
    (55.0, -0.2, 1.6, 0.2),
    (90.0, 1.0, -0.5, 0.9),
    (80.0, -1.2, 2.8, 0.8),
    (60.0, 0.1, -2.0, 0.95),
    (45.0, 0.7, -1.1, 0.7),
];

fn main() -> memir::Result<()> {
    // an optional JSON configuration file
    let config = match env::args().nth(1) {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    let mut evaluator = Evaluator::new(
        config,
        GaussianResolution::default(),
        ConstantAmplitude::default(),
        ToyGluonDensity::default(),
    );

    for &(pt, eta, phi, btag) in JETS.iter() {
        evaluator.add_object(LorentzVector::from_pt_eta_phi_m(pt, eta, phi, 0.0), ObjectKind::Jet);
        evaluator.add_observable(Observable::BTag, btag, ObjectKind::Jet);
    }

    evaluator.add_object(LorentzVector::from_pt_eta_phi_m(50.0, 0.3, 2.5, 0.0), ObjectKind::Lepton);
    evaluator.add_observable(Observable::Charge, 1.0, ObjectKind::Lepton);
    evaluator.add_object(LorentzVector::from_args(40.0, -30.0, 26.0, 0.0), ObjectKind::Met);

    let tth = evaluator.run(FinalState::LH, Hypothesis::TTH, &[])?;
    println!("{}\n", tth);

    evaluator.next_hypothesis();
    let ttbb = evaluator.run(FinalState::LH, Hypothesis::TTBB, &[])?;
    println!("{}\n", ttbb);

    // the same event with the b quark of the leptonic top assumed lost
    evaluator.next_hypothesis();
    let lost = evaluator.run(FinalState::LH, Hypothesis::TTH, &[Role::B2])?;
    println!("{}\n", lost);

    if tth.probability + ttbb.probability > 0.0 {
        println!(
            "discriminant p(ttH) / (p(ttH) + p(ttbb)) = {:.4}",
            tth.probability / (tth.probability + ttbb.probability)
        );
    }

    evaluator.next_event();

    Ok(())
}
