//! Detected objects of an event.

use crate::kinematics::LorentzVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of a detected object.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ObjectKind {
    /// A hadronic jet.
    Jet,
    /// A charged lepton.
    Lepton,
    /// The missing transverse momentum.
    Met,
}

/// Named scalar observables attached to an [`Object`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Observable {
    /// Lower end of the generated-energy window if the jet comes from a light quark.
    EnergyLowLight,
    /// Upper end of the generated-energy window if the jet comes from a light quark.
    EnergyHighLight,
    /// Lower end of the generated-energy window if the jet comes from a b quark.
    EnergyLowB,
    /// Upper end of the generated-energy window if the jet comes from a b quark.
    EnergyHighB,
    /// b-tag score in $[0, 1]$.
    BTag,
    /// Electric charge in units of the elementary charge.
    Charge,
}

/// A detected particle: a four-momentum together with scalar observables.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Object {
    p4: LorentzVector<f64>,
    kind: ObjectKind,
    observables: BTreeMap<Observable, f64>,
}

impl Object {
    /// Constructor.
    pub fn new(p4: LorentzVector<f64>, kind: ObjectKind) -> Self {
        Self {
            p4,
            kind,
            observables: BTreeMap::new(),
        }
    }

    /// The four-momentum.
    pub const fn p4(&self) -> &LorentzVector<f64> {
        &self.p4
    }

    /// The kind of object.
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Sets `name` to `value` unless it was set before. Returns `true` if the value was stored.
    pub fn add_observable(&mut self, name: Observable, value: f64) -> bool {
        let mut stored = false;
        self.observables.entry(name).or_insert_with(|| {
            stored = true;
            value
        });
        stored
    }

    /// Returns the observable `name`, if it was set.
    pub fn observable(&self, name: Observable) -> Option<f64> {
        self.observables.get(&name).copied()
    }

    /// Returns `true` if `name` has been set.
    pub fn has_observable(&self, name: Observable) -> bool {
        self.observables.contains_key(&name)
    }

    /// The energy window of the generated parton for a light quark (`b = false`) or a b quark.
    pub fn energy_window(&self, b: bool) -> Option<(f64, f64)> {
        let (low, high) = if b {
            (Observable::EnergyLowB, Observable::EnergyHighB)
        } else {
            (Observable::EnergyLowLight, Observable::EnergyHighLight)
        };
        Some((self.observable(low)?, self.observable(high)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observables_are_set_once() {
        let mut jet = Object::new(LorentzVector::from_args(50.0, 30.0, 0.0, 40.0), ObjectKind::Jet);

        assert!(!jet.has_observable(Observable::BTag));
        assert!(jet.add_observable(Observable::BTag, 0.9));
        assert!(!jet.add_observable(Observable::BTag, 0.1));
        assert_eq!(jet.observable(Observable::BTag), Some(0.9));
        assert_eq!(jet.observable(Observable::Charge), None);
    }

    #[test]
    fn test_energy_window() {
        let mut jet = Object::new(LorentzVector::from_args(50.0, 30.0, 0.0, 40.0), ObjectKind::Jet);
        jet.add_observable(Observable::EnergyLowB, 20.0);
        assert_eq!(jet.energy_window(true), None);

        jet.add_observable(Observable::EnergyHighB, 90.0);
        assert_eq!(jet.energy_window(true), Some((20.0, 90.0)));
        assert_eq!(jet.energy_window(false), None);
    }
}
