//! Knowledge-Graph Expander
//!
//! Parses the triple file once into an in-memory snapshot, extending the entity
//! and relation vocabularies as new ids appear. Every derived structure (the
//! undirected adjacency list, the per-entity n-hop sets, the dense adjacency
//! matrix) is computed from that single snapshot, so all of them agree on the
//! same vocabulary.
//!
//! ```text
//!   kg.txt ──parse once──▶ KgSnapshot ──┬──▶ AdjacencyList ──▶ NHopKg {1: .., 2: ..}
//!                                       └──▶ adjacency matrix (N x N, symmetric)
//! ```

use crate::config::NeighborKey;
use crate::error::Result;
use crate::reader::{Columns, DelimitedReader};
use crate::types::{HopSet, KgTriple, NHopKg, RawId, Vocab};
use ndarray::Array2;
use std::collections::BTreeSet;
use std::path::Path;

/// Every triple of the knowledge graph in dense index space, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KgSnapshot {
    triples: Vec<KgTriple>,
}

impl KgSnapshot {
    /// Read `(head, relation, tail)` lines, assigning indices to unseen
    /// entities and relations. Indices already in `entity_vocab` are kept.
    pub fn read(
        path: &Path,
        entity_vocab: &mut Vocab<RawId>,
        relation_vocab: &mut Vocab<String>,
    ) -> Result<Self> {
        log::info!("Reading kg file: {}", path.display());
        let linked_entities = entity_vocab.len();

        let mut triples = Vec::new();
        DelimitedReader::tab_separated(path, Columns::Exactly(3)).for_each(|fields| {
            let head: RawId = fields.parse(0)?;
            let relation = fields.text(1).trim().to_string();
            let tail: RawId = fields.parse(2)?;
            triples.push(Self::intern(head, relation, tail, entity_vocab, relation_vocab));
            Ok(())
        })?;

        if triples.is_empty() {
            log::warn!("Knowledge graph {} has no triples", path.display());
        }
        log::info!(
            "Read {} triples: {} entities ({} beyond linked items), {} relations",
            triples.len(),
            entity_vocab.len(),
            entity_vocab.len() - linked_entities,
            relation_vocab.len()
        );

        Ok(Self { triples })
    }

    /// Build a snapshot from raw triples already in memory
    pub fn from_raw<'a, I>(
        raw: I,
        entity_vocab: &mut Vocab<RawId>,
        relation_vocab: &mut Vocab<String>,
    ) -> Self
    where
        I: IntoIterator<Item = (RawId, &'a str, RawId)>,
    {
        let triples = raw
            .into_iter()
            .map(|(head, relation, tail)| {
                Self::intern(head, relation.to_string(), tail, entity_vocab, relation_vocab)
            })
            .collect();
        Self { triples }
    }

    fn intern(
        head: RawId,
        relation: String,
        tail: RawId,
        entity_vocab: &mut Vocab<RawId>,
        relation_vocab: &mut Vocab<String>,
    ) -> KgTriple {
        let head = entity_vocab.get_or_insert(head);
        let tail = entity_vocab.get_or_insert(tail);
        let relation = relation_vocab.get_or_insert(relation);
        KgTriple::new(head, tail, relation)
    }

    pub fn triples(&self) -> &[KgTriple] {
        &self.triples
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Undirected adjacency list over `entity_count` entities
    pub fn adjacency(&self, entity_count: usize) -> AdjacencyList {
        let mut lists = vec![Vec::new(); entity_count];
        for triple in &self.triples {
            lists[triple.head].push(*triple);
            lists[triple.tail].push(triple.reversed());
        }
        AdjacencyList { lists }
    }
}

/// Per-entity list of incident triples, each oriented with the entity as head
#[derive(Debug, Clone, Default)]
pub struct AdjacencyList {
    lists: Vec<Vec<KgTriple>>,
}

impl AdjacencyList {
    /// Triples attached to `entity`; empty for unknown or isolated entities
    pub fn neighbors(&self, entity: usize) -> &[KgTriple] {
        self.lists.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 1-hop and 2-hop triple sets for every entity in `entity_vocab`.
///
/// The 2-hop set is the union of the 1-hop lists reached through each 1-hop
/// triple, deduplicated and sorted.
pub fn build_n_hop(
    entity_vocab: &Vocab<RawId>,
    adjacency: &AdjacencyList,
    key: NeighborKey,
) -> NHopKg {
    if key == NeighborKey::Relation {
        log::warn!("Expanding 2-hop sets through relation indices; relation and entity index spaces are unrelated");
    }

    let mut n_hop = NHopKg::new();
    for entity in entity_vocab.values() {
        let one_hop = adjacency.neighbors(entity).to_vec();

        let mut two_hop = BTreeSet::new();
        for triple in &one_hop {
            let next = match key {
                NeighborKey::Tail => triple.tail,
                NeighborKey::Relation => triple.relation,
            };
            two_hop.extend(adjacency.neighbors(next).iter().copied());
        }

        n_hop.insert(
            entity,
            HopSet {
                one_hop,
                two_hop: two_hop.into_iter().collect(),
            },
        );
    }

    let isolated = n_hop.values().filter(|h| h.one_hop.is_empty()).count();
    log::debug!("Built n-hop sets for {} entities ({} isolated)", n_hop.len(), isolated);
    n_hop
}

/// Dense symmetric 0/1 adjacency matrix of size `entity_count` squared
pub fn adjacency_matrix(snapshot: &KgSnapshot, entity_count: usize) -> Array2<u8> {
    let mut matrix = Array2::<u8>::zeros((entity_count, entity_count));
    for triple in snapshot.triples() {
        matrix[[triple.head, triple.tail]] = 1;
        matrix[[triple.tail, triple.head]] = 1;
    }
    matrix
}
