//! The module gathers structures identifying sequences by name and keeping
//! the working set of a session.
//!

use std::sync::Arc;

use fxhash::FxHashMap;

/// A named nucleotide sequence as read from a fasta record.
/// Immutable once loaded. A store replacement produces new Sequence values,
/// in-flight jobs keep reading the snapshot they were started with.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// fasta id, unique key in a store
    name: String,
    /// raw symbols, kept as read
    bases: Vec<u8>,
}

impl Sequence {
    pub fn new(name: String, bases: Vec<u8>) -> Self {
        Sequence { name, bases }
    }

    /// get sequence name
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_bases(&self) -> &[u8] {
        &self.bases
    }

    /// number of bases
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
} // end of impl Sequence

/// the working set of named sequences.
/// Keeps insertion order, candidate chunks are built in this order.
/// Names are unique, reinserting a name replaces the bases but keeps the rank.
pub struct SequenceStore {
    /// sequences in insertion order
    ordered: Vec<Arc<Sequence>>,
    /// name to rank in ordered
    index: FxHashMap<String, usize>,
}

impl SequenceStore {
    pub fn new() -> Self {
        SequenceStore::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SequenceStore {
            ordered: Vec::with_capacity(capacity),
            index: FxHashMap::default(),
        }
    } // end of with_capacity

    /// inserts a sequence. A duplicate name replaces the previous bases in
    /// place (the last record wins) and keeps the original rank.
    pub fn insert(&mut self, seq: Sequence) {
        match self.index.get(seq.get_name()).copied() {
            Some(rank) => {
                log::warn!(
                    "duplicate sequence name '{}', replacing previous record",
                    seq.get_name()
                );
                self.ordered[rank] = Arc::new(seq);
            }
            None => {
                self.index
                    .insert(seq.get_name().to_string(), self.ordered.len());
                self.ordered.push(Arc::new(seq));
            }
        }
    } // end of insert

    /// retrieve a sequence by name
    pub fn get(&self, name: &str) -> Option<&Arc<Sequence>> {
        self.index.get(name).map(|&rank| &self.ordered[rank])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// iterate sequences in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.ordered.iter()
    }

    /// sequence names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(|s| s.get_name())
    }

    /// number of sequences stored
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
} // end of impl SequenceStore

impl Default for SequenceStore {
    fn default() -> Self {
        SequenceStore::new()
    }
}

//=========================================================================

#[cfg(test)]
mod tests {

    use super::*;

    fn seq(name: &str, bases: &str) -> Sequence {
        Sequence::new(name.to_string(), bases.as_bytes().to_vec())
    }

    #[test]
    fn store_keeps_insertion_order() {
        let mut store = SequenceStore::new();
        store.insert(seq("Hap_3", "ACGT"));
        store.insert(seq("Hap_1", "ACGA"));
        store.insert(seq("Hap_2", "TTTT"));
        let names: Vec<&str> = store.names().collect();
        assert_eq!(names, vec!["Hap_3", "Hap_1", "Hap_2"]);
        assert_eq!(store.len(), 3);
        assert!(store.contains("Hap_1"));
        assert!(!store.contains("Hap_4"));
    }

    #[test]
    fn duplicate_name_replaces_in_place() {
        let mut store = SequenceStore::new();
        store.insert(seq("A", "AAAA"));
        store.insert(seq("B", "CCCC"));
        store.insert(seq("A", "GGGG"));
        assert_eq!(store.len(), 2);
        let names: Vec<&str> = store.names().collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(store.get("A").unwrap().get_bases(), b"GGGG");
    }
} // end of mod tests
