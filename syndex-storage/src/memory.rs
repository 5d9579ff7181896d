//! In-memory reference implementations of the storage traits.
//!
//! The ordered axis is a `BTreeMap` keyed by sequence number; term
//! indices are `BTreeSet`s of sequence numbers. One `RwLock` per
//! collection keeps sequence assignment linearizable without blocking
//! unrelated collections. Lock guards are unwrapped: a poisoned lock
//! means a writer panicked mid-mutation and the process state is gone.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use syndex_core::{
    CategoryTerm, CollectionKey, EntryId, EntryRecord, IndexError, RevisionCheck, Timestamp,
    WriteError,
};

use crate::{CollectionIndex, EntryStore, IndexRegistry};

// ============================================================================
// ENTRY STORE
// ============================================================================

/// In-memory [`EntryStore`].
#[derive(Default)]
pub struct InMemoryEntryStore {
    entries: RwLock<HashMap<(CollectionKey, EntryId), EntryRecord>>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_revision(
        stored: &EntryRecord,
        expected: RevisionCheck,
    ) -> Result<(), WriteError> {
        if expected.accepts(stored.revision) {
            Ok(())
        } else {
            let supplied = match expected {
                RevisionCheck::Exact(r) => r,
                RevisionCheck::Override => unreachable!("override accepts every revision"),
            };
            Err(WriteError::Conflict {
                entry_id: stored.entry_id,
                supplied,
                current: stored.revision,
            })
        }
    }
}

impl EntryStore for InMemoryEntryStore {
    fn get(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
    ) -> Result<Option<EntryRecord>, IndexError> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(&(collection.clone(), entry_id)).cloned())
    }

    fn put_new(&self, record: &EntryRecord) -> Result<(), WriteError> {
        let mut entries = self.entries.write().unwrap();
        let key = (record.collection.clone(), record.entry_id);
        if entries.contains_key(&key) {
            return Err(WriteError::AlreadyExists {
                collection: record.collection.clone(),
                entry_id: record.entry_id,
            });
        }
        entries.insert(key, record.clone());
        Ok(())
    }

    fn compare_and_put(
        &self,
        record: &EntryRecord,
        expected: RevisionCheck,
    ) -> Result<EntryRecord, WriteError> {
        let mut entries = self.entries.write().unwrap();
        let key = (record.collection.clone(), record.entry_id);
        let stored = entries.get_mut(&key).ok_or_else(|| WriteError::EntryNotFound {
            collection: record.collection.clone(),
            entry_id: record.entry_id,
        })?;
        Self::check_revision(stored, expected)?;

        let mut next = record.clone();
        next.sequence = stored.sequence;
        next.created_at = stored.created_at;
        next.revision = stored.revision + 1;
        *stored = next.clone();
        Ok(next)
    }

    fn delete(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
        expected: RevisionCheck,
    ) -> Result<EntryRecord, WriteError> {
        let mut entries = self.entries.write().unwrap();
        let key = (collection.clone(), entry_id);
        let stored = entries.get_mut(&key).ok_or_else(|| WriteError::EntryNotFound {
            collection: collection.clone(),
            entry_id,
        })?;
        Self::check_revision(stored, expected)?;

        stored.deleted = true;
        stored.revision += 1;
        stored.updated_at = chrono::Utc::now();
        Ok(stored.clone())
    }

    fn obliterate(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
    ) -> Result<EntryRecord, WriteError> {
        let mut entries = self.entries.write().unwrap();
        entries
            .remove(&(collection.clone(), entry_id))
            .ok_or_else(|| WriteError::EntryNotFound {
                collection: collection.clone(),
                entry_id,
            })
    }
}

// ============================================================================
// COLLECTION INDEX
// ============================================================================

struct IndexState {
    /// Last assigned sequence. Monotonic; removals never lower it.
    last_sequence: u64,
    entries: BTreeMap<u64, EntryRecord>,
    terms: HashMap<CategoryTerm, BTreeSet<u64>>,
}

/// In-memory [`CollectionIndex`].
pub struct InMemoryCollectionIndex {
    key: CollectionKey,
    state: RwLock<IndexState>,
}

impl InMemoryCollectionIndex {
    pub fn new(key: CollectionKey) -> Self {
        Self {
            key,
            state: RwLock::new(IndexState {
                last_sequence: 0,
                entries: BTreeMap::new(),
                terms: HashMap::new(),
            }),
        }
    }

    pub fn collection(&self) -> &CollectionKey {
        &self.key
    }
}

fn add_memberships(state: &mut IndexState, sequence: u64, categories: &BTreeSet<CategoryTerm>) {
    for term in categories {
        state.terms.entry(term.clone()).or_default().insert(sequence);
    }
}

fn drop_membership(state: &mut IndexState, sequence: u64, term: &CategoryTerm) {
    if let Some(set) = state.terms.get_mut(term) {
        set.remove(&sequence);
        if set.is_empty() {
            state.terms.remove(term);
        }
    }
}

impl CollectionIndex for InMemoryCollectionIndex {
    fn append(&self, mut record: EntryRecord) -> Result<u64, IndexError> {
        let mut state = self.state.write().unwrap();
        let sequence = state.last_sequence + 1;
        state.last_sequence = sequence;
        record.sequence = sequence;
        let categories = record.categories.clone();
        state.entries.insert(sequence, record);
        add_memberships(&mut state, sequence, &categories);
        Ok(sequence)
    }

    fn tail_from(&self, floor: u64) -> Result<Vec<EntryRecord>, IndexError> {
        let state = self.state.read().unwrap();
        Ok(state.entries.range(floor..).map(|(_, r)| r.clone()).collect())
    }

    fn record_at(&self, sequence: u64) -> Result<Option<EntryRecord>, IndexError> {
        let state = self.state.read().unwrap();
        Ok(state.entries.get(&sequence).cloned())
    }

    fn update_record(&self, record: EntryRecord) -> Result<(), IndexError> {
        let mut state = self.state.write().unwrap();
        let old = state.entries.get(&record.sequence).cloned().ok_or_else(|| {
            IndexError::StorageFault {
                collection: self.key.clone(),
                reason: format!("no entry at sequence {}", record.sequence),
            }
        })?;

        for gone in old.categories.difference(&record.categories) {
            drop_membership(&mut state, record.sequence, gone);
        }
        let added: Vec<CategoryTerm> = record
            .categories
            .difference(&old.categories)
            .cloned()
            .collect();
        for term in added {
            state
                .terms
                .entry(term)
                .or_default()
                .insert(record.sequence);
        }
        state.entries.insert(record.sequence, record);
        Ok(())
    }

    fn remove(&self, sequence: u64) -> Result<(), IndexError> {
        let mut state = self.state.write().unwrap();
        if let Some(old) = state.entries.remove(&sequence) {
            for term in &old.categories {
                drop_membership(&mut state, sequence, term);
            }
        }
        Ok(())
    }

    fn term_tail_from(&self, scheme: &str, term: &str, floor: u64) -> Result<Vec<u64>, IndexError> {
        let state = self.state.read().unwrap();
        let key = CategoryTerm::new(scheme, term);
        Ok(state
            .terms
            .get(&key)
            .map(|set| set.range(floor..).copied().collect())
            .unwrap_or_default())
    }

    fn term_tail_from_any(&self, term: &str, floor: u64) -> Result<Vec<u64>, IndexError> {
        let state = self.state.read().unwrap();
        let mut merged = BTreeSet::new();
        for (key, set) in &state.terms {
            if key.term == term {
                merged.extend(set.range(floor..).copied());
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn high_water_mark(&self) -> Result<u64, IndexError> {
        let state = self.state.read().unwrap();
        Ok(state.last_sequence)
    }

    fn first_updated_at_or_after(&self, min: Timestamp) -> Result<Option<u64>, IndexError> {
        let state = self.state.read().unwrap();
        Ok(state
            .entries
            .values()
            .filter(|r| r.updated_at >= min)
            .map(|r| r.sequence)
            .min())
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// In-memory [`IndexRegistry`]: one [`InMemoryCollectionIndex`] per
/// collection, created lazily.
#[derive(Default)]
pub struct InMemoryIndexRegistry {
    indices: RwLock<HashMap<CollectionKey, Arc<InMemoryCollectionIndex>>>,
}

impl InMemoryIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexRegistry for InMemoryIndexRegistry {
    fn index_for(&self, key: &CollectionKey) -> Result<Arc<dyn CollectionIndex>, IndexError> {
        {
            let indices = self.indices.read().unwrap();
            if let Some(index) = indices.get(key) {
                return Ok(index.clone());
            }
        }
        let mut indices = self.indices.write().unwrap();
        let index = indices
            .entry(key.clone())
            .or_insert_with(|| Arc::new(InMemoryCollectionIndex::new(key.clone())));
        Ok(index.clone())
    }

    fn existing(&self, key: &CollectionKey) -> Option<Arc<dyn CollectionIndex>> {
        let indices = self.indices.read().unwrap();
        indices.get(key).map(|i| i.clone() as Arc<dyn CollectionIndex>)
    }

    fn collections(&self) -> Vec<CollectionKey> {
        let indices = self.indices.read().unwrap();
        indices.keys().cloned().collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use syndex_core::new_entry_id;

    /// One scripted mutation against a collection index.
    #[derive(Debug, Clone)]
    enum Op {
        Append(Vec<u8>),
        Retag(usize, Vec<u8>),
        Remove(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec(0u8..4, 0..3).prop_map(Op::Append),
            (any::<usize>(), prop::collection::vec(0u8..4, 0..3))
                .prop_map(|(i, t)| Op::Retag(i, t)),
            any::<usize>().prop_map(Op::Remove),
        ]
    }

    fn terms_of(ids: &[u8]) -> std::collections::BTreeSet<CategoryTerm> {
        ids.iter()
            .map(|i| CategoryTerm::new("urn:t", format!("t{i}")))
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Reading the ordered index from 0 yields acknowledged entries in
        /// strictly ascending sequence order with no duplicates.
        #[test]
        fn prop_tail_is_strictly_ascending(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let key = CollectionKey::new("w", "c");
            let index = InMemoryCollectionIndex::new(key.clone());
            let mut live: Vec<u64> = Vec::new();

            for op in ops {
                match op {
                    Op::Append(terms) => {
                        let rec = EntryRecord::new(key.clone(), new_entry_id(), b"b")
                            .with_categories(terms_of(&terms));
                        live.push(index.append(rec).unwrap());
                    }
                    Op::Retag(i, terms) => {
                        if live.is_empty() { continue; }
                        let seq = live[i % live.len()];
                        let mut rec = index.record_at(seq).unwrap().unwrap();
                        rec.categories = terms_of(&terms);
                        index.update_record(rec).unwrap();
                    }
                    Op::Remove(i) => {
                        if live.is_empty() { continue; }
                        let seq = live.remove(i % live.len());
                        index.remove(seq).unwrap();
                    }
                }
            }

            let tail: Vec<u64> = index.tail_from(0).unwrap().iter().map(|r| r.sequence).collect();
            let mut expected = live.clone();
            expected.sort_unstable();
            prop_assert_eq!(tail, expected);
        }

        /// A sequence appears in a term's index iff the live entry at that
        /// sequence currently carries the term.
        #[test]
        fn prop_term_membership_invariant(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let key = CollectionKey::new("w", "c");
            let index = InMemoryCollectionIndex::new(key.clone());

            for op in ops {
                match op {
                    Op::Append(terms) => {
                        let rec = EntryRecord::new(key.clone(), new_entry_id(), b"b")
                            .with_categories(terms_of(&terms));
                        index.append(rec).unwrap();
                    }
                    Op::Retag(i, terms) => {
                        let tail = index.tail_from(0).unwrap();
                        if tail.is_empty() { continue; }
                        let mut rec = tail[i % tail.len()].clone();
                        rec.categories = terms_of(&terms);
                        index.update_record(rec).unwrap();
                    }
                    Op::Remove(i) => {
                        let tail = index.tail_from(0).unwrap();
                        if tail.is_empty() { continue; }
                        index.remove(tail[i % tail.len()].sequence).unwrap();
                    }
                }
            }

            let live = index.tail_from(0).unwrap();
            for t in 0u8..4 {
                let term = format!("t{t}");
                let indexed = index.term_tail_from("urn:t", &term, 0).unwrap();
                let carrying: Vec<u64> = live
                    .iter()
                    .filter(|r| r.categories.contains(&CategoryTerm::new("urn:t", term.clone())))
                    .map(|r| r.sequence)
                    .collect();
                prop_assert_eq!(indexed, carrying);
            }
        }
    }
}
