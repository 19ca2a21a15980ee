//! Core data types shared by every pipeline stage

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw identifier of a user, item or entity as it appears in the input files
pub type RawId = i64;

/// Insertion-ordered mapping from raw identifiers to dense zero-based indices.
///
/// Indices are handed out from a monotonically increasing counter, so removing
/// an entry never frees its index for reuse: a later insertion cannot collide
/// with an index that was already published.
#[derive(Debug, Clone)]
pub struct Vocab<K> {
    index: HashMap<K, usize>,
    order: Vec<K>,
    next: usize,
}

impl<K> Default for Vocab<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            order: Vec::new(),
            next: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> Vocab<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// One past the largest index ever assigned
    pub fn index_bound(&self) -> usize {
        self.next
    }

    pub fn get(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Return the index of `key`, assigning the next free index on first sight.
    pub fn get_or_insert(&mut self, key: K) -> usize {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.next;
        self.next += 1;
        self.index.insert(key.clone(), idx);
        self.order.push(key);
        idx
    }

    pub fn remove(&mut self, key: &K) -> Option<usize> {
        let idx = self.index.remove(key)?;
        self.order.retain(|k| k != key);
        Some(idx)
    }

    /// Keep only the entries for which `keep(raw, index)` holds.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, usize) -> bool,
    {
        let index = &mut self.index;
        self.order.retain(|k| {
            let idx = index[k];
            if keep(k, idx) {
                true
            } else {
                index.remove(k);
                false
            }
        });
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> + '_ {
        self.order.iter().map(move |k| (k, self.index[k]))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.order.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().map(move |k| self.index[k])
    }

    /// Dense index back to raw key
    pub fn inverse(&self) -> HashMap<usize, K> {
        self.iter().map(|(k, idx)| (idx, k.clone())).collect()
    }

    fn insert_with_index(&mut self, key: K, idx: usize) {
        if self.index.insert(key.clone(), idx).is_none() {
            self.order.push(key);
        }
        self.next = self.next.max(idx + 1);
    }
}

impl<K: Eq + Hash + Clone> PartialEq for Vocab<K> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.index == other.index
    }
}

impl<K: Eq + Hash + Clone> Eq for Vocab<K> {}

impl<K: Eq + Hash + Clone> FromIterator<K> for Vocab<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut vocab = Self::new();
        for key in iter {
            vocab.get_or_insert(key);
        }
        vocab
    }
}

impl<K: Eq + Hash + Clone + Serialize> Serialize for Vocab<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, idx) in self.iter() {
            map.serialize_entry(key, &idx)?;
        }
        map.end()
    }
}

struct VocabVisitor<K>(PhantomData<K>);

impl<'de, K> Visitor<'de> for VocabVisitor<K>
where
    K: Eq + Hash + Clone + Deserialize<'de>,
{
    type Value = Vocab<K>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map from raw id to dense index")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut vocab = Vocab::new();
        while let Some((key, idx)) = access.next_entry::<K, usize>()? {
            vocab.insert_with_index(key, idx);
        }
        Ok(vocab)
    }
}

impl<'de, K> Deserialize<'de> for Vocab<K>
where
    K: Eq + Hash + Clone + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(VocabVisitor(PhantomData))
    }
}

/// A single user interaction after item remapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Dense item index
    pub item: usize,
    pub rating: f64,
    /// Timestamp exactly as it appeared in the ratings file
    pub timestamp: String,
}

impl RatingRecord {
    pub fn is_positive(&self, threshold: f64) -> bool {
        self.rating >= threshold
    }
}

/// Dense user index to that user's interactions, in file order
pub type RatingDict = BTreeMap<usize, Vec<RatingRecord>>;

/// An adjacency entry in dense index space. The graph is undirected, so every
/// input triple is stored once from each endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KgTriple {
    pub head: usize,
    pub tail: usize,
    pub relation: usize,
}

impl KgTriple {
    pub fn new(head: usize, tail: usize, relation: usize) -> Self {
        Self { head, tail, relation }
    }

    pub fn reversed(&self) -> Self {
        Self {
            head: self.tail,
            tail: self.head,
            relation: self.relation,
        }
    }
}

/// 1-hop and 2-hop neighborhoods of one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopSet {
    #[serde(rename = "1")]
    pub one_hop: Vec<KgTriple>,
    #[serde(rename = "2")]
    pub two_hop: Vec<KgTriple>,
}

/// Entity index to its neighborhoods
pub type NHopKg = BTreeMap<usize, HopSet>;

/// Disjoint user partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    /// Artifact stem used when the split is written to disk
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Split::Train => "train_data_dict",
            Split::Valid => "val_data_dict",
            Split::Test => "test_data_dict",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Valid => write!(f, "valid"),
            Split::Test => write!(f, "test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocab_first_seen_order() {
        let mut vocab = Vocab::new();
        assert_eq!(vocab.get_or_insert(101), 0);
        assert_eq!(vocab.get_or_insert(205), 1);
        assert_eq!(vocab.get_or_insert(101), 0);
        assert_eq!(vocab.len(), 2);

        let keys: Vec<_> = vocab.keys().copied().collect();
        assert_eq!(keys, vec![101, 205]);
    }

    #[test]
    fn test_vocab_removal_keeps_indices() {
        let mut vocab: Vocab<RawId> = [10, 20, 30].into_iter().collect();
        assert_eq!(vocab.remove(&20), Some(1));
        assert_eq!(vocab.get(&30), Some(2));
        assert_eq!(vocab.len(), 2);

        // A removed index is never handed out again
        assert_eq!(vocab.get_or_insert(40), 3);
        assert_eq!(vocab.index_bound(), 4);
    }

    #[test]
    fn test_vocab_retain_and_inverse() {
        let mut vocab: Vocab<RawId> = [7, 8, 9, 10].into_iter().collect();
        vocab.retain(|_, idx| idx % 2 == 0);

        let inverse = vocab.inverse();
        assert_eq!(inverse.len(), 2);
        assert_eq!(inverse[&0], 7);
        assert_eq!(inverse[&2], 9);
        assert!(!vocab.contains(&8));
    }

    #[test]
    fn test_vocab_json_preserves_order() {
        let vocab: Vocab<String> = ["rel_b".to_string(), "rel_a".to_string()]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&vocab).unwrap();
        assert_eq!(json, r#"{"rel_b":0,"rel_a":1}"#);

        let back: Vocab<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vocab);
    }

    #[test]
    fn test_triple_reversed() {
        let triple = KgTriple::new(1, 2, 5);
        assert_eq!(triple.reversed(), KgTriple::new(2, 1, 5));
    }
}
