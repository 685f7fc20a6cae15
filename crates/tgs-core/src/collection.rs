//! Insertion-ordered keyed container.
//!
//! `Collection` keeps the order in which keys were *first* inserted:
//! re-setting a key updates its value in place. Read operations never reorder
//! the receiver; sorting, reversing and slicing return new collections.

use std::{
    borrow::Borrow,
    cmp::Ordering,
    collections::HashMap,
    fmt,
    hash::Hash,
    ops::Index,
};

use rand::Rng;
use serde::{ser::SerializeSeq, Serialize, Serializer};

/// One bucket produced by [`Collection::partition`].
#[derive(Clone, Debug, PartialEq)]
pub struct Partition<K, V> {
    /// Last key routed into this bucket.
    pub key: Option<K>,
    /// Every value routed into this bucket, in insertion order.
    pub values: Vec<V>,
}

impl<K, V> Default for Partition<K, V> {
    fn default() -> Self {
        Self {
            key: None,
            values: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Collection<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for Collection<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Collection<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Resolve a possibly negative position against `len`.
fn resolve_index(len: usize, index: isize) -> Option<usize> {
    let pos = if index < 0 {
        len.checked_sub(index.unsigned_abs())?
    } else {
        index as usize
    };
    (pos < len).then_some(pos)
}

impl<K: Eq + Hash + Clone, V> Collection<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = *self.index.get(key)?;
        Some(&mut self.entries[pos].1)
    }

    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    pub fn has_all(&self, keys: &[K]) -> bool {
        keys.iter().all(|k| self.has(k))
    }

    pub fn has_any(&self, keys: &[K]) -> bool {
        keys.iter().any(|k| self.has(k))
    }

    /// Upsert. An existing key keeps its position.
    pub fn set(&mut self, key: K, value: V) -> &mut Self {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
        self
    }

    /// Set `value` only if `key` is absent.
    pub fn ensure(&mut self, key: K, value: V) -> &mut Self {
        if !self.has(&key) {
            self.set(key, value);
        }
        self
    }

    /// Returns whether a key was removed.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove(key).is_some()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = self.index.remove(key)?;
        let (_, value) = self.entries.remove(pos);
        for (i, (k, _)) in self.entries.iter().enumerate().skip(pos) {
            if let Some(slot) = self.index.get_mut::<K>(k) {
                *slot = i;
            }
        }
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> + ExactSizeIterator + '_ {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn for_each(&self, mut f: impl FnMut(&V, &K, &Self)) {
        for (k, v) in &self.entries {
            f(v, k, self);
        }
    }

    /// Side-effecting pass over the whole collection, for chaining.
    pub fn tap(&self, f: impl FnOnce(&Self)) -> &Self {
        f(self);
        self
    }

    pub fn map<U>(&self, mut f: impl FnMut(&V, &K, &Self) -> U) -> Collection<K, U> {
        let mut out = Collection::with_capacity(self.len());
        for (k, v) in &self.entries {
            out.set(k.clone(), f(v, k, self));
        }
        out
    }

    pub fn some(&self, mut f: impl FnMut(&V, &K, &Self) -> bool) -> bool {
        self.entries.iter().any(|(k, v)| f(v, k, self))
    }

    pub fn every(&self, mut f: impl FnMut(&V, &K, &Self) -> bool) -> bool {
        self.entries.iter().all(|(k, v)| f(v, k, self))
    }

    pub fn find(&self, mut f: impl FnMut(&V, &K, &Self) -> bool) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, v)| f(v, k, self))
            .map(|(_, v)| v)
    }

    pub fn find_key(&self, mut f: impl FnMut(&V, &K, &Self) -> bool) -> Option<&K> {
        self.entries
            .iter()
            .find(|(k, v)| f(v, k, self))
            .map(|(k, _)| k)
    }

    pub fn find_last(&self, mut f: impl FnMut(&V, &K, &Self) -> bool) -> Option<&V> {
        self.entries
            .iter()
            .rev()
            .find(|(k, v)| f(v, k, self))
            .map(|(_, v)| v)
    }

    pub fn reduce<A>(&self, init: A, mut f: impl FnMut(A, &V, &K, &Self) -> A) -> A {
        self.entries
            .iter()
            .fold(init, |acc, (k, v)| f(acc, v, k, self))
    }

    pub fn reduce_right<A>(&self, init: A, mut f: impl FnMut(A, &V, &K, &Self) -> A) -> A {
        self.entries
            .iter()
            .rev()
            .fold(init, |acc, (k, v)| f(acc, v, k, self))
    }

    /// Every element returned for an entry is stored under that entry's key,
    /// so only the last element per key survives.
    pub fn flat_map<U>(&self, mut f: impl FnMut(&V, &K, &Self) -> Vec<U>) -> Collection<K, U> {
        let mut out = Collection::new();
        for (k, v) in &self.entries {
            for item in f(v, k, self) {
                out.set(k.clone(), item);
            }
        }
        out
    }

    /// First key (insertion order) whose value equals `value`.
    pub fn key_of(&self, value: &V) -> Option<&K>
    where
        V: PartialEq,
    {
        self.entries
            .iter()
            .find(|(_, v)| v == value)
            .map(|(k, _)| k)
    }

    /// Same size and every key maps to an equal value.
    pub fn equals(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        if self.len() != other.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }

    /// Positional lookup; negative indices count from the end.
    pub fn at(&self, index: isize) -> Option<&V> {
        let pos = resolve_index(self.len(), index)?;
        Some(&self.entries[pos].1)
    }

    pub fn key_at(&self, index: isize) -> Option<&K> {
        let pos = resolve_index(self.len(), index)?;
        Some(&self.entries[pos].0)
    }

    pub fn first(&self) -> Option<&V> {
        self.entries.first().map(|(_, v)| v)
    }

    pub fn first_key(&self) -> Option<&K> {
        self.entries.first().map(|(k, _)| k)
    }

    pub fn last(&self) -> Option<&V> {
        self.entries.last().map(|(_, v)| v)
    }

    pub fn last_key(&self) -> Option<&K> {
        self.entries.last().map(|(k, _)| k)
    }

    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&V> {
        if self.is_empty() {
            return None;
        }
        let pos = rng.random_range(0..self.len());
        Some(&self.entries[pos].1)
    }

    pub fn random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&K> {
        if self.is_empty() {
            return None;
        }
        let pos = rng.random_range(0..self.len());
        Some(&self.entries[pos].0)
    }

    /// Up to `amount` distinct values drawn without replacement.
    pub fn random_many<R: Rng + ?Sized>(&self, rng: &mut R, amount: usize) -> Vec<&V> {
        rand::seq::index::sample(rng, self.len(), amount.min(self.len()))
            .into_iter()
            .map(|pos| &self.entries[pos].1)
            .collect()
    }

    pub fn key_vec(&self) -> Vec<K> {
        self.keys().cloned().collect()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Collection<K, V> {
    fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a K, &'a V)>) -> Self
    where
        K: 'a,
        V: 'a,
    {
        entries
            .into_iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn filter(&self, mut f: impl FnMut(&V, &K, &Self) -> bool) -> Self {
        Self::from_entries(self.entries.iter().filter(|(k, v)| f(v, k, self)).map(|(k, v)| (k, v)))
    }

    /// Split into `(matching, rest)`.
    pub fn partition(
        &self,
        mut f: impl FnMut(&V, &K, &Self) -> bool,
    ) -> (Partition<K, V>, Partition<K, V>) {
        let mut pass = Partition::default();
        let mut fail = Partition::default();
        for (k, v) in &self.entries {
            let bucket = if f(v, k, self) { &mut pass } else { &mut fail };
            bucket.key = Some(k.clone());
            bucket.values.push(v.clone());
        }
        (pass, fail)
    }

    /// Sorted by the string form of the key, ascending.
    pub fn default_sort(&self) -> Self
    where
        K: fmt::Display,
    {
        let mut entries: Vec<(String, &K, &V)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.to_string(), k, v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self::from_entries(entries.into_iter().map(|(_, k, v)| (k, v)))
    }

    pub fn sorted(&self, mut cmp: impl FnMut(&K, &K) -> Ordering) -> Self {
        let mut entries: Vec<(&K, &V)> = self.iter().collect();
        entries.sort_by(|a, b| cmp(a.0, b.0));
        Self::from_entries(entries)
    }

    /// Copy `other` into the receiver; `other` wins on key collisions and its
    /// new keys are appended.
    pub fn merge(&mut self, other: &Self) -> &mut Self {
        for (k, v) in &other.entries {
            self.set(k.clone(), v.clone());
        }
        self
    }

    /// Non-mutating [`Collection::merge`].
    pub fn combine_entries(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    pub fn difference<W>(&self, other: &Collection<K, W>) -> Self {
        Self::from_entries(self.iter().filter(|(k, _)| !other.has(*k)))
    }

    pub fn intersect<W>(&self, other: &Collection<K, W>) -> Self {
        Self::from_entries(self.iter().filter(|(k, _)| other.has(*k)))
    }

    /// Keys that don't exist are skipped.
    pub fn subset(&self, keys: &[K]) -> Self {
        let mut out = Self::new();
        for k in keys {
            if let Some(v) = self.get(k) {
                out.set(k.clone(), v.clone());
            }
        }
        out
    }

    /// Keep the first entry seen for each distinct value.
    pub fn sweep(&self) -> Self
    where
        V: PartialEq,
    {
        let mut out = Self::new();
        for (k, v) in &self.entries {
            if !out.entries.iter().any(|(_, seen)| seen == v) {
                out.set(k.clone(), v.clone());
            }
        }
        out
    }

    /// Fixed-size chunks of the values, each re-keyed `0..len`.
    /// A `size` of zero yields no chunks.
    pub fn chunk(&self, size: usize) -> Vec<Collection<usize, V>> {
        if size == 0 {
            return Vec::new();
        }
        self.entries
            .chunks(size)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .map(|(i, (_, v))| (i, v.clone()))
                    .collect()
            })
            .collect()
    }

    /// Copy with the value at `index` replaced; an out-of-range index yields an
    /// unchanged copy.
    pub fn with(&self, index: isize, value: V) -> Self {
        let mut out = self.clone();
        if let Some(pos) = resolve_index(out.len(), index) {
            out.entries[pos].1 = value;
        }
        out
    }

    pub fn to_reversed(&self) -> Self {
        Self::from_entries(self.iter().rev())
    }

    /// Entries in the insertion-order range `[start, end)`, clamped.
    pub fn to_spliced(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        Self::from_entries(self.entries[start..end].iter().map(|(k, v)| (k, v)))
    }

    pub fn to_vec(&self) -> Vec<V> {
        self.values().cloned().collect()
    }

    pub fn to_map(&self) -> HashMap<K, V> {
        self.entries.iter().cloned().collect()
    }

    pub fn entries_vec(&self) -> Vec<(K, V)> {
        self.entries.clone()
    }

    /// The values as a JSON array.
    pub fn to_json(&self) -> crate::Result<serde_json::Value>
    where
        V: Serialize,
    {
        Ok(serde_json::to_value(self)?)
    }
}

impl<K: Eq + Hash + Clone, V: Eq + Hash + Clone> Collection<K, V> {
    /// Swap key and value roles. When several keys share a value, the entry
    /// inserted last wins.
    pub fn reverse(&self) -> Collection<V, K> {
        self.entries
            .iter()
            .map(|(k, v)| (v.clone(), k.clone()))
            .collect()
    }
}

impl<K: Eq + Hash + Clone, V> Collection<K, V> {
    /// Remove every key present in `other`.
    pub fn subtract<W>(&mut self, other: &Collection<K, W>) -> &mut Self {
        let doomed: Vec<K> = self.keys().filter(|k| other.has(*k)).cloned().collect();
        for k in &doomed {
            self.delete(k);
        }
        self
    }
}

impl<K: Eq + Hash + Clone, U: Clone> Collection<K, Vec<U>> {
    /// Flatten list values; see [`Collection::flat_map`] for key collisions.
    pub fn flat(&self) -> Collection<K, U> {
        self.flat_map(|v, _, _| v.clone())
    }
}

impl<K: Eq + Hash + Clone, V: PartialEq> PartialEq for Collection<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<K: Eq + Hash + Clone, V> FromIterator<(K, V)> for Collection<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        out.extend(iter);
        out
    }
}

impl<K: Eq + Hash + Clone, V> Extend<(K, V)> for Collection<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl<K: Eq + Hash + Clone, V, const N: usize> From<[(K, V); N]> for Collection<K, V> {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K, V> IntoIterator for Collection<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, K: Eq + Hash + Clone, V> IntoIterator for &'a Collection<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = std::iter::Map<std::slice::Iter<'a, (K, V)>, fn(&'a (K, V)) -> (&'a K, &'a V)>;

    fn into_iter(self) -> Self::IntoIter {
        fn split<K, V>((k, v): &(K, V)) -> (&K, &V) {
            (k, v)
        }
        self.entries.iter().map(split as fn(&'a (K, V)) -> (&'a K, &'a V))
    }
}

impl<K, V, Q> Index<&Q> for Collection<K, V>
where
    K: Eq + Hash + Clone + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("key not present in collection"),
        }
    }
}

/// Serialized as the sequence of values, in insertion order.
impl<K, V: Serialize> Serialize for Collection<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (_, v) in &self.entries {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}
