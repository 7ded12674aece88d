//! Last observed set of job identities.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::JobIdentity;

/// Difference between two observations of the store's key set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySetDrift {
    pub added: BTreeSet<JobIdentity>,
    pub removed: BTreeSet<JobIdentity>,
}

impl KeySetDrift {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Remembers the identity set seen on the previous read.
///
/// Snapshots are shared, never mutated in place, so readers see either the
/// old or the new set.
#[derive(Debug, Default)]
pub struct KeySetTracker {
    current: RwLock<Arc<BTreeSet<JobIdentity>>>,
}

impl KeySetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `fresh` with the remembered set, then remember `fresh`.
    ///
    /// `None` when the sets are equal.
    pub fn observe(&self, fresh: &BTreeSet<JobIdentity>) -> Option<KeySetDrift> {
        let mut current = self.current.write();
        if current.as_ref() == fresh {
            return None;
        }
        let drift = KeySetDrift {
            added: fresh.difference(&current).cloned().collect(),
            removed: current.difference(fresh).cloned().collect(),
        };
        *current = Arc::new(fresh.clone());
        Some(drift)
    }

    /// Replace the remembered set without reporting drift.
    pub fn replace(&self, fresh: BTreeSet<JobIdentity>) {
        *self.current.write() = Arc::new(fresh);
    }

    /// Forget one identity.
    pub fn remove(&self, identity: &JobIdentity) -> bool {
        let mut current = self.current.write();
        if !current.contains(identity) {
            return false;
        }
        let mut next = current.as_ref().clone();
        next.remove(identity);
        *current = Arc::new(next);
        true
    }

    pub fn snapshot(&self) -> Arc<BTreeSet<JobIdentity>> {
        self.current.read().clone()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}
