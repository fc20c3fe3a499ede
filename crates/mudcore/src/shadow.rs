//! Stack-per-key mapping behind every live verb table.
//!
//! A key's visible value is the top of its stack; setting shadows the old
//! value, deleting restores it. Removal by value works anywhere in the
//! stack, not just the top: grants are added in a deterministic order
//! (class, then equipped items, then room entities) but can be torn down in
//! any order — an item can be unequipped while one equipped later is still
//! active.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowError {
    MissingKey,
    MissingValue,
}

impl std::fmt::Display for ShadowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShadowError::MissingKey => write!(f, "no such key"),
            ShadowError::MissingValue => write!(f, "value not present under key"),
        }
    }
}

impl std::error::Error for ShadowError {}

/// No key ever maps to an empty stack; emptied keys are dropped.
#[derive(Debug, Clone)]
pub struct ShadowTable<K, V> {
    slots: HashMap<K, Vec<V>>,
}

impl<K: Eq + Hash, V: PartialEq> PartialEq for ShadowTable<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<K: Eq + Hash, V: PartialEq> ShadowTable<K, V> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slots.keys()
    }

    pub fn contains<Q>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.slots.contains_key(k)
    }

    /// Push `v` for `k`, shadowing whatever was visible before.
    pub fn set(&mut self, k: K, v: V) {
        self.slots.entry(k).or_default().push(v);
    }

    /// Current (topmost) value for `k`.
    pub fn get<Q>(&self, k: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.slots.get(k).and_then(|s| s.last())
    }

    /// Number of stacked values for `k`, including shadowed ones.
    pub fn depth<Q>(&self, k: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.slots.get(k).map(|s| s.len()).unwrap_or(0)
    }

    /// Pop the topmost value for `k`, restoring whatever it shadowed.
    pub fn delete<Q>(&mut self, k: &Q) -> Result<V, ShadowError>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let stack = self.slots.get_mut(k).ok_or(ShadowError::MissingKey)?;
        let v = stack.pop().ok_or(ShadowError::MissingKey)?;
        if stack.is_empty() {
            self.slots.remove(k);
        }
        Ok(v)
    }

    /// Delete the first element equal to `v` anywhere in `k`'s stack,
    /// regardless of position.
    pub fn remove_value<Q>(&mut self, k: &Q, v: &V) -> Result<(), ShadowError>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let stack = self.slots.get_mut(k).ok_or(ShadowError::MissingKey)?;
        let i = stack
            .iter()
            .position(|x| x == v)
            .ok_or(ShadowError::MissingValue)?;
        stack.remove(i);
        if stack.is_empty() {
            self.slots.remove(k);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl<K: Eq + Hash, V: PartialEq> Default for ShadowTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
