//! Event topologies, hypotheses, particle roles and the phase-space variables that parameterize
//! them.

use crate::physics::{B_MASS, LEPTON_MASS, LIGHT_QUARK_MASS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The final state an event is reconstructed in.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum FinalState {
    /// One top quark decays hadronically, the other one leptonically.
    LH,
    /// Both top quarks decay leptonically.
    LL,
    /// Both top quarks decay hadronically.
    HH,
    /// Top quarks and Higgs boson are not decayed.
    TTH,
}

/// The physics scenario under test.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Hypothesis {
    /// $t\bar{t}H$ with $H \to b\bar{b}$: the $b\bar{b}$ pair is constrained to the Higgs mass.
    TTH,
    /// $t\bar{t}b\bar{b}$: the energy of the second b quark is a free variable.
    TTBB,
}

/// A particle role of the phase-space point. The order of the variants is the order in which
/// the roles are stored in a [`PhaseSpacePoint`](crate::phase_space::PhaseSpacePoint).
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Role {
    /// Up-type daughter of the first W (or its charged lepton).
    Q1,
    /// Down-type daughter of the first W (or its neutrino).
    QBar1,
    /// b quark of the first top.
    B1,
    /// Up-type daughter of the second W (or its charged lepton).
    Q2,
    /// Down-type daughter of the second W (or its neutrino).
    QBar2,
    /// b quark of the second top.
    B2,
    /// First b quark of the Higgs (or of the additional pair).
    B,
    /// Second b quark of the Higgs (or of the additional pair).
    BBar,
    /// Undecayed top quark.
    T,
    /// Undecayed top anti-quark.
    TBar,
    /// Undecayed Higgs boson.
    H,
}

impl Role {
    /// All roles in storage order.
    pub const ALL: [Self; 11] = [
        Self::Q1,
        Self::QBar1,
        Self::B1,
        Self::Q2,
        Self::QBar2,
        Self::B2,
        Self::B,
        Self::BBar,
        Self::T,
        Self::TBar,
        Self::H,
    ];

    /// Position of the role in [`Role::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for the roles of b quarks.
    pub fn is_b(self) -> bool {
        matches!(self, Self::B1 | Self::B2 | Self::B | Self::BBar)
    }

    /// Mass of a parton in this role when it is a quark.
    pub fn quark_mass(self) -> f64 {
        if self.is_b() {
            B_MASS
        } else {
            LIGHT_QUARK_MASS
        }
    }
}

/// The kind of a phase-space variable.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum VarKind {
    /// Energy, mapped from a fraction in $[0, 1]$ of the energy window.
    Energy,
    /// Cosine of the polar angle.
    CosTheta,
    /// Azimuth.
    Phi,
    /// Modulus of the momentum.
    Momentum,
    /// Longitudinal momentum.
    Pz,
}

/// A named phase-space variable: the kind of the variable and the role it belongs to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PsVar {
    /// The particle role.
    pub role: Role,
    /// The kind of variable.
    pub kind: VarKind,
}

impl PsVar {
    /// Constructor.
    pub const fn new(role: Role, kind: VarKind) -> Self {
        Self { role, kind }
    }
}

impl fmt::Display for PsVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}_{:?}", self.kind, self.role)
    }
}

/// Category passed to the resolution model together with a (reconstructed, generated) pair.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum TfKind {
    /// Light quark matched to a jet.
    QReco,
    /// b quark matched to a jet.
    BReco,
    /// Light quark without a matching jet.
    QLost,
    /// b quark without a matching jet.
    BLost,
    /// Charged lepton.
    MuReco,
    /// Neutrinos, compared against the missing transverse momentum.
    Met,
    /// Hadronic recoil.
    Recoil,
    /// Not compared against the detector.
    Unknown,
}

impl TfKind {
    /// Category of a quark in `role`, depending on whether it is matched to a jet.
    pub fn for_quark(role: Role, matched: bool) -> Self {
        match (role.is_b(), matched) {
            (true, true) => Self::BReco,
            (true, false) => Self::BLost,
            (false, true) => Self::QReco,
            (false, false) => Self::QLost,
        }
    }

    /// Returns `true` for charged leptons.
    pub fn is_lepton(self) -> bool {
        self == Self::MuReco
    }

    /// Returns `true` for neutrinos.
    pub fn is_neutrino(self) -> bool {
        self == Self::Met
    }
}

const LH_JETS: [Role; 6] = [Role::Q1, Role::QBar1, Role::B1, Role::B2, Role::B, Role::BBar];
const LL_JETS: [Role; 4] = [Role::B1, Role::B2, Role::B, Role::BBar];
const HH_JETS: [Role; 8] = [
    Role::Q1,
    Role::QBar1,
    Role::B1,
    Role::Q2,
    Role::QBar2,
    Role::B2,
    Role::B,
    Role::BBar,
];

impl FinalState {
    /// All final states.
    pub const ALL: [Self; 4] = [Self::LH, Self::LL, Self::HH, Self::TTH];

    /// Roles matched to jets, in the order of the permutation slots.
    pub fn jet_roles(self) -> &'static [Role] {
        match self {
            Self::LH => &LH_JETS,
            Self::LL => &LL_JETS,
            Self::HH => &HH_JETS,
            Self::TTH => &[],
        }
    }

    /// Roles matched to charged leptons, in the order of the lepton collection.
    pub fn lepton_roles(self) -> &'static [Role] {
        match self {
            Self::LH => &[Role::Q2],
            Self::LL => &[Role::Q1, Role::Q2],
            Self::HH | Self::TTH => &[],
        }
    }

    /// Number of quark-level slots, i.e. the number of jets expected.
    pub fn quark_slots(self) -> usize {
        self.jet_roles().len()
    }

    /// Number of charged leptons expected.
    pub fn lepton_count(self) -> usize {
        self.lepton_roles().len()
    }

    /// The permutation slot a role is matched to.
    pub fn jet_slot(self, role: Role) -> Option<usize> {
        self.jet_roles().iter().position(|&r| r == role)
    }

    /// The index in the lepton collection a role is matched to.
    pub fn lepton_slot(self, role: Role) -> Option<usize> {
        self.lepton_roles().iter().position(|&r| r == role)
    }

    /// Returns `true` if the top quarks are decayed.
    pub fn has_decays(self) -> bool {
        self != Self::TTH
    }

    /// Returns `true` if the final state requires a missing-transverse-energy object.
    pub fn requires_met(self) -> bool {
        self.has_decays()
    }

    /// Returns `true` if `hypothesis` can be tested in this final state.
    pub fn supports(self, hypothesis: Hypothesis) -> bool {
        self.has_decays() || hypothesis == Hypothesis::TTH
    }

    /// Number of particles of the phase-space point.
    pub fn phase_space_dimension(self, hypothesis: Hypothesis) -> usize {
        if self.has_decays() {
            8
        } else {
            match hypothesis {
                Hypothesis::TTH => 3,
                Hypothesis::TTBB => 4,
            }
        }
    }

    /// Number of unknowns before lost jets are taken into account: three per particle, minus
    /// the measured leptons and jet directions, minus the top/W mass constraints, minus the Higgs
    /// mass constraint, minus the measured transverse momentum of the neutrinos.
    pub fn unknowns(self, hypothesis: Hypothesis, n_leptons: usize, n_mets: usize) -> usize {
        let decays = self.has_decays() as usize;
        let higgs = (hypothesis == Hypothesis::TTH && self.has_decays()) as usize;
        let no_met = (n_mets == 0) as usize;
        (3 * self.phase_space_dimension(hypothesis))
            .saturating_sub(3 * n_leptons)
            .saturating_sub(2 * self.quark_slots())
            .saturating_sub(4 * decays)
            .saturating_sub(higgs)
            .saturating_sub(2 * no_met)
    }

    /// Pairs of roles that are interchangeable. The light-quark pairs come first, the b-quark pair
    /// is included only if `with_b_pair` is set.
    pub fn symmetric_pairs(self, with_b_pair: bool) -> Vec<(Role, Role)> {
        let mut pairs = match self {
            Self::LH => vec![(Role::Q1, Role::QBar1)],
            Self::HH => vec![(Role::Q1, Role::QBar1), (Role::Q2, Role::QBar2)],
            Self::LL | Self::TTH => vec![],
        };
        if with_b_pair && self.has_decays() {
            pairs.push((Role::B, Role::BBar));
        }
        pairs
    }

    /// Light-quark roles matched to jets.
    pub fn light_roles(self) -> Vec<Role> {
        self.jet_roles().iter().copied().filter(|r| !r.is_b()).collect()
    }

    /// b-quark roles matched to jets.
    pub fn b_roles(self) -> Vec<Role> {
        self.jet_roles().iter().copied().filter(|r| r.is_b()).collect()
    }

    /// Mass of the particle in `role` as it enters the phase-space point.
    pub fn mass(self, role: Role) -> f64 {
        if self.lepton_slot(role).is_some() {
            LEPTON_MASS
        } else {
            role.quark_mass()
        }
    }
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
