//! Assignments of observed jets to the quark-level roles of a final state.
//!
//! A [`Permutation`] has one entry per jet slot of the final state (see
//! [`FinalState::jet_roles`]). An entry is either the index of a jet in the jet collection or
//! `None` if the quark in this slot is assumed to be lost.

use crate::objects::{Object, Observable};
use crate::topology::{FinalState, Role};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// An assignment of jet indices to quark slots.
pub type Permutation = Vec<Option<usize>>;

/// b-tag score separating tagged from untagged jets.
pub const BTAG_THRESHOLD: f64 = 0.5;

/// Strategies to prune the list of permutations.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Strategy {
    /// b quarks may not be matched to jets with a b-tag score below [`BTAG_THRESHOLD`].
    BTagged,
    /// Light quarks may not be matched to jets with a b-tag score above [`BTAG_THRESHOLD`].
    QUntagged,
    /// Permutations that match the b quarks of the tops of an accepted one, and its W daughters up
    /// to a swap within each W, are discarded.
    QQbarSymmetry,
    /// Like [`Strategy::QQbarSymmetry`], but the two b quarks of the Higgs must also match up to a
    /// swap.
    BBbarSymmetry,
}

/// The comparator defining the order in which permutations are enumerated. With `highpt_first`
/// lost slots sort after all jets, otherwise before them.
fn comparator(highpt_first: bool) -> impl Fn(&Option<usize>, &Option<usize>) -> Ordering {
    move |lhs, rhs| match (lhs, rhs) {
        (Some(l), Some(r)) => l.cmp(r),
        (None, None) => Ordering::Equal,
        (None, Some(_)) if highpt_first => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) if highpt_first => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// Rearranges `v` into the next permutation in the lexicographic order induced by `compare`.
/// Returns `false` and leaves `v` sorted if `v` was the last permutation. Elements comparing equal
/// are not distinguished, so each distinct arrangement is visited exactly once.
pub fn next_permutation<T, F>(v: &mut [T], compare: F) -> bool
where
    F: Fn(&T, &T) -> Ordering,
{
    if v.len() < 2 {
        return false;
    }

    let mut i = v.len() - 1;

    while i > 0 && compare(&v[i - 1], &v[i]) != Ordering::Less {
        i -= 1;
    }

    if i == 0 {
        v.reverse();
        return false;
    }

    let mut j = v.len() - 1;

    while compare(&v[i - 1], &v[j]) != Ordering::Less {
        j -= 1;
    }

    v.swap(i - 1, j);
    v[i..].reverse();
    true
}

/// Enumerates all distinct arrangements of `n_jets` jet indices, padded with lost entries up to
/// `slots` entries.
pub fn enumerate(n_jets: usize, slots: usize, highpt_first: bool) -> Vec<Permutation> {
    let compare = comparator(highpt_first);
    let mut indices: Permutation = (0..n_jets).map(Some).collect();
    indices.resize(indices.len().max(slots), None);
    indices.sort_by(&compare);

    let mut result = Vec::new();

    loop {
        result.push(indices.clone());

        if !next_permutation(&mut indices, &compare) {
            break;
        }
    }

    result
}

/// The permutations that survived [`Permutations::restrict_to_assumption`], each with its
/// permutation constant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assumption {
    lost: Vec<Role>,
    permutations: Vec<Permutation>,
    constants: Vec<f64>,
    extra_jets: usize,
}

impl Assumption {
    /// The roles assumed lost.
    pub fn lost(&self) -> &[Role] {
        &self.lost
    }

    /// The accepted permutations.
    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    /// The constants of the accepted permutations, in the same order.
    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    /// Number of observed jets not matched to any quark.
    pub const fn extra_jets(&self) -> usize {
        self.extra_jets
    }

    /// Number of accepted permutations.
    pub fn len(&self) -> usize {
        self.permutations.len()
    }

    /// Returns `true` if no permutation survived.
    pub fn is_empty(&self) -> bool {
        self.permutations.is_empty()
    }
}

/// All permutations of the jets of one event for a final state.
#[derive(Clone, Debug)]
pub struct Permutations {
    final_state: FinalState,
    n_jets: usize,
    raw: Vec<Permutation>,
}

impl Permutations {
    /// Enumerates the permutations of `n_jets` jets for `final_state`.
    pub fn new(final_state: FinalState, n_jets: usize, highpt_first: bool) -> Self {
        let raw = enumerate(n_jets, final_state.quark_slots(), highpt_first);

        debug!(
            "{} permutation(s) of {} jet(s) over {} slot(s)",
            raw.len(),
            n_jets,
            final_state.quark_slots()
        );

        Self {
            final_state,
            n_jets,
            raw,
        }
    }

    /// The final state these permutations were enumerated for.
    pub const fn final_state(&self) -> FinalState {
        self.final_state
    }

    /// All permutations before any assumption or pruning.
    pub fn raw(&self) -> &[Permutation] {
        &self.raw
    }

    /// Returns `true` if enough jets were observed to assume `lost` quarks were not
    /// reconstructed.
    pub fn test_assumption(&self, lost: usize) -> bool {
        self.n_jets + lost >= self.final_state.quark_slots()
    }

    /// Restricts the permutations to the ones compatible with the quarks in `lost` not being
    /// reconstructed, and prunes them with `strategies`. The constant of every surviving
    /// permutation is the product of the energy-window widths of the jets matched to
    /// `energy_roles`. Returns `None` if too few jets were observed for this assumption.
    pub fn restrict_to_assumption(
        &self,
        jets: &[Object],
        lost: &[Role],
        strategies: &[Strategy],
        energy_roles: &[Role],
    ) -> Option<Assumption> {
        if !self.test_assumption(lost.len()) {
            debug!(
                "{} jet(s) and {} lost quark(s) cannot fill {} slot(s)",
                self.n_jets,
                lost.len(),
                self.final_state.quark_slots()
            );
            return None;
        }

        let slots = self.final_state.quark_slots();
        let lost_slots: Vec<_> = lost
            .iter()
            .filter_map(|&role| self.final_state.jet_slot(role))
            .collect();
        let mut seen = BTreeSet::new();
        let mut assumption = Assumption {
            lost: lost.to_vec(),
            extra_jets: self.n_jets + lost.len() - slots,
            ..Assumption::default()
        };

        for raw in &self.raw {
            let mut perm = raw[..slots].to_vec();

            for &slot in &lost_slots {
                perm[slot] = None;
            }

            if perm.iter().filter(|index| index.is_none()).count() != lost.len() {
                continue;
            }

            if !seen.insert(perm.clone()) {
                continue;
            }

            if !self.accept(&perm, jets, strategies, &assumption.permutations) {
                continue;
            }

            assumption
                .constants
                .push(self.constant(&perm, jets, energy_roles));
            assumption.permutations.push(perm);
        }

        debug!(
            "{} permutation(s) accepted for lost quark(s) {:?}",
            assumption.len(),
            lost
        );

        Some(assumption)
    }

    /// Applies `strategies` in order to `perm`. `accepted` are the permutations already accepted
    /// for the current assumption.
    pub fn accept(
        &self,
        perm: &[Option<usize>],
        jets: &[Object],
        strategies: &[Strategy],
        accepted: &[Permutation],
    ) -> bool {
        strategies.iter().all(|strategy| match strategy {
            Strategy::BTagged => self.final_state.b_roles().into_iter().all(|role| {
                self.btag(perm, jets, role)
                    .map_or(true, |score| score >= BTAG_THRESHOLD)
            }),
            Strategy::QUntagged => self.final_state.light_roles().into_iter().all(|role| {
                self.btag(perm, jets, role)
                    .map_or(true, |score| score <= BTAG_THRESHOLD)
            }),
            Strategy::QQbarSymmetry | Strategy::BBbarSymmetry => {
                let pairs: Vec<_> = self
                    .final_state
                    .symmetric_pairs(*strategy == Strategy::BBbarSymmetry)
                    .into_iter()
                    .filter_map(|(a, b)| {
                        Some((self.final_state.jet_slot(a)?, self.final_state.jet_slot(b)?))
                    })
                    .collect();
                let fixed: Vec<_> = [Role::B1, Role::B2]
                    .iter()
                    .filter_map(|&role| self.final_state.jet_slot(role))
                    .collect();

                !accepted
                    .iter()
                    .any(|visited| is_interchanged(visited, perm, &pairs, &fixed))
            }
        })
    }

    /// Product of the energy-window widths of the jets matched to `energy_roles`. Lost roles
    /// contribute a factor of one, although their energy fraction is mapped onto
    /// $[M, E_\mathrm{max}]$: unlike for matched jets, the width of that range is never multiplied
    /// in.
    pub fn constant(&self, perm: &[Option<usize>], jets: &[Object], energy_roles: &[Role]) -> f64 {
        energy_roles
            .iter()
            .filter_map(|&role| {
                let index = (*perm.get(self.final_state.jet_slot(role)?)?)?;
                jets.get(index)?.energy_window(role.is_b())
            })
            .map(|(low, high)| high - low)
            .product()
    }

    fn btag(&self, perm: &[Option<usize>], jets: &[Object], role: Role) -> Option<f64> {
        let index = (*perm.get(self.final_state.jet_slot(role)?)?)?;
        jets.get(index)?.observable(Observable::BTag)
    }
}

/// Returns `true` if `perm` matches `visited` in the `fixed` slots and equals it up to swaps
/// within the slot `pairs`. Slots in neither list are not compared.
fn is_interchanged(
    visited: &[Option<usize>],
    perm: &[Option<usize>],
    pairs: &[(usize, usize)],
    fixed: &[usize],
) -> bool {
    fixed.iter().all(|&slot| visited[slot] == perm[slot])
        && pairs.iter().all(|&(a, b)| {
            let same = visited[a] == perm[a] && visited[b] == perm[b];
            let swap = visited[a] == perm[b] && visited[b] == perm[a];
            same || swap
        })
}
