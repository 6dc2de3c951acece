//! In-memory allocation ledger shared by all replicas of one reconcile pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Identifier, State};

/// Mapping from replica identifier to the values assigned to it.
///
/// Entries are append-only per identifier. `set` performs no uniqueness
/// check; `claim` checks and records under a single write lock so that
/// replicas may be resolved from several threads at once.
#[derive(Debug, Default)]
pub struct GlobalState {
    inner: RwLock<HashMap<Identifier, Vec<State>>>,
}

impl GlobalState {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger pre-populated from a snapshot.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let state = Self::new();
        state.seed(snapshot);
        state
    }

    // The ledger is only ever appended to, so a panic while holding the lock
    // cannot leave it half-written.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Identifier, Vec<State>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Identifier, Vec<State>>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `value` for `key` on `identifier`.
    pub fn set(&self, identifier: &Identifier, key: &str, value: &str) {
        self.write()
            .entry(identifier.clone())
            .or_default()
            .push(State::new(key, value));
    }

    /// Record `value` unless `unique` is set and another entry for `key`
    /// already holds it, anywhere in the fleet.
    ///
    /// Returns true if the value was recorded.
    pub fn claim(&self, identifier: &Identifier, key: &str, value: &str, unique: bool) -> bool {
        let mut inner = self.write();

        if unique {
            let taken = inner
                .values()
                .flatten()
                .any(|s| s.key == key && s.value == value);
            if taken {
                debug!(%identifier, key, value, "candidate already claimed");
                return false;
            }
        }

        inner
            .entry(identifier.clone())
            .or_default()
            .push(State::new(key, value));
        true
    }

    /// First value recorded for `key` on `identifier`.
    pub fn get(&self, identifier: &Identifier, key: &str) -> Option<String> {
        self.read()
            .get(identifier)?
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.clone())
    }

    /// Every value recorded for `key`, across all identifiers.
    pub fn values_for_key(&self, key: &str) -> HashSet<String> {
        self.read()
            .values()
            .flatten()
            .filter(|s| s.key == key)
            .map(|s| s.value.clone())
            .collect()
    }

    /// Visit every identifier with its full state list, in unspecified order.
    pub fn each<F>(&self, mut visit: F)
    where
        F: FnMut(&Identifier, &[State]),
    {
        for (identifier, states) in self.read().iter() {
            visit(identifier, states);
        }
    }

    /// Number of distinct identifiers tracked.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if no identifier is tracked.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy the ledger into a serializable snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        let entries = self
            .read()
            .iter()
            .map(|(id, states)| (id.clone(), states.clone()))
            .collect();
        StateSnapshot { entries }
    }

    /// Merge a snapshot into the ledger.
    ///
    /// Entries already recorded for an identifier are not duplicated.
    pub fn seed(&self, snapshot: StateSnapshot) {
        let mut inner = self.write();
        for (identifier, states) in snapshot.entries {
            let existing = inner.entry(identifier).or_default();
            for state in states {
                if !existing.contains(&state) {
                    existing.push(state);
                }
            }
        }
    }
}

/// Serializable copy of a [`GlobalState`].
///
/// Identifiers are ordered so the serialized form is deterministic and can
/// be stored in a resource's status between reconcile passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    entries: BTreeMap<Identifier, Vec<State>>,
}

impl StateSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// States recorded for an identifier.
    pub fn get(&self, identifier: &Identifier) -> Option<&[State]> {
        self.entries.get(identifier).map(|s| s.as_slice())
    }

    /// Iterate over identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &[State])> {
        self.entries.iter().map(|(id, s)| (id, s.as_slice()))
    }

    /// Number of identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
