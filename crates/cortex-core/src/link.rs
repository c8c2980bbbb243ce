//! Directed, labelled edges.
//!
//! A [`Link`] is registered in its endpoints' `LinksOut`/`LinksIn` lists by
//! key, and its annotation list lives behind a leaf lock of its own. Info
//! locks are always taken after the node locks that keep the link alive,
//! never the other way round.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::id::{LinkKey, NeuronId};

/// A link and its ordered info list.
#[derive(Debug)]
pub struct Link {
    key: LinkKey,
    info: RwLock<Vec<NeuronId>>,
}

impl Link {
    pub(crate) fn new(key: LinkKey, info: Vec<NeuronId>) -> Self {
        Link {
            key,
            info: RwLock::new(info),
        }
    }

    pub fn key(&self) -> LinkKey {
        self.key
    }

    pub fn from(&self) -> NeuronId {
        self.key.from
    }

    pub fn to(&self) -> NeuronId {
        self.key.to
    }

    pub fn meaning(&self) -> NeuronId {
        self.key.meaning
    }

    pub(crate) fn info(&self) -> RwLockReadGuard<'_, Vec<NeuronId>> {
        self.info.read()
    }

    pub(crate) fn info_mut(&self) -> RwLockWriteGuard<'_, Vec<NeuronId>> {
        self.info.write()
    }

    pub(crate) fn to_parts(&self) -> LinkParts {
        LinkParts {
            key: self.key,
            info: self.info.read().clone(),
        }
    }
}

/// Flat, serializable form of a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParts {
    #[serde(flatten)]
    pub key: LinkKey,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info: Vec<NeuronId>,
}
