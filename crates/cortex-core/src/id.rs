//! Stable identifiers for graph entities.
//!
//! Neurons are addressed by [`NeuronId`], a newtype over `u64`. Links have no
//! id of their own: a link is identified by its `(from, to, meaning)` triple,
//! captured by [`LinkKey`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable neuron identifier.
///
/// Ids are assigned monotonically by the [`Brain`](crate::Brain) and never
/// reused. A few values are reserved:
/// - [`NeuronId::EMPTY`] (0) means "no neuron".
/// - [`NeuronId::TEMP`] marks a detached neuron that has not been committed
///   to a brain yet.
/// - Ids below [`NeuronId::FIRST_FREE`] belong to predefined neurons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeuronId(pub u64);

impl NeuronId {
    /// The reserved "no neuron" id.
    pub const EMPTY: NeuronId = NeuronId(0);

    /// Sentinel carried by neurons that are not registered in a brain.
    pub const TEMP: NeuronId = NeuronId(u64::MAX);

    /// First id handed out for user-created neurons.
    pub const FIRST_FREE: NeuronId = NeuronId(1024);

    /// Returns `true` for the reserved empty id.
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Returns `true` for the detached-neuron sentinel.
    pub fn is_temp(self) -> bool {
        self == Self::TEMP
    }

    /// Returns `true` if the id lies in the predefined range.
    pub fn is_predefined(self) -> bool {
        self.0 > 0 && self.0 < Self::FIRST_FREE.0
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_temp() {
            write!(f, "temp")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identity of a link: the `(from, to, meaning)` triple.
///
/// At most one link exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub from: NeuronId,
    pub to: NeuronId,
    pub meaning: NeuronId,
}

impl LinkKey {
    pub fn new(from: NeuronId, to: NeuronId, meaning: NeuronId) -> Self {
        LinkKey { from, to, meaning }
    }

    /// Returns the endpoint opposite to `id`, if `id` is an endpoint.
    pub fn other_end(&self, id: NeuronId) -> Option<NeuronId> {
        if self.from == id {
            Some(self.to)
        } else if self.to == id {
            Some(self.from)
        } else {
            None
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.meaning, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids() {
        assert!(NeuronId::EMPTY.is_empty());
        assert!(NeuronId::TEMP.is_temp());
        assert!(!NeuronId::EMPTY.is_predefined());
        assert!(NeuronId(1).is_predefined());
        assert!(!NeuronId::FIRST_FREE.is_predefined());
    }

    #[test]
    fn neuron_id_display() {
        assert_eq!(format!("{}", NeuronId(7)), "7");
        assert_eq!(format!("{}", NeuronId::TEMP), "temp");
    }

    #[test]
    fn link_key_display_and_other_end() {
        let key = LinkKey::new(NeuronId(1), NeuronId(2), NeuronId(3));
        assert_eq!(format!("{key}"), "1 -[3]-> 2");
        assert_eq!(key.other_end(NeuronId(1)), Some(NeuronId(2)));
        assert_eq!(key.other_end(NeuronId(2)), Some(NeuronId(1)));
        assert_eq!(key.other_end(NeuronId(3)), None);
    }

    #[test]
    fn link_keys_order_by_from_then_to_then_meaning() {
        let a = LinkKey::new(NeuronId(1), NeuronId(5), NeuronId(9));
        let b = LinkKey::new(NeuronId(1), NeuronId(6), NeuronId(0));
        let c = LinkKey::new(NeuronId(2), NeuronId(0), NeuronId(0));
        assert!(a < b && b < c);
    }

    #[test]
    fn serde_roundtrip() {
        let id = NeuronId(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: NeuronId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);

        let key = LinkKey::new(NeuronId(1), NeuronId(2), NeuronId(3));
        let json = serde_json::to_string(&key).unwrap();
        let back: LinkKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
