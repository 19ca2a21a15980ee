//! Preprocessing pipeline
//!
//! Runs the stages strictly in sequence. The four vocabularies live in one
//! owned [`Vocabularies`] value that each stage borrows mutably in turn:
//!
//! 1. linker: seeds `item` and `entity`
//! 2. splitter: builds `user`, prunes `item`
//! 3. expander: extends `entity`, builds `relation`

use crate::config::PrepConfig;
use crate::error::Result;
use crate::kg::{adjacency_matrix, build_n_hop, KgSnapshot};
use crate::linker::read_item2entity_file;
use crate::persistence::{ArtifactWriter, Manifest, ADJACENCY_STEM};
use crate::splitter::{read_rating_file, split_ratings, SplitRatings, SplitStats};
use crate::types::{NHopKg, RawId, Split, Vocab};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Every vocabulary produced by a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabularies {
    pub user: Vocab<RawId>,
    pub item: Vocab<RawId>,
    pub entity: Vocab<RawId>,
    pub relation: Vocab<String>,
}

/// Counts reported at the end of a run and stored in the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub users: usize,
    pub items: usize,
    pub entities: usize,
    pub relations: usize,
    pub triples: usize,
    pub split: SplitStats,
}

/// In-memory result of all stages, before anything is written
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub vocabs: Vocabularies,
    pub splits: SplitRatings,
    pub split_stats: SplitStats,
    pub kg: KgSnapshot,
    pub n_hop: NHopKg,
}

impl PreparedData {
    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            users: self.vocabs.user.len(),
            items: self.vocabs.item.len(),
            entities: self.vocabs.entity.len(),
            relations: self.vocabs.relation.len(),
            triples: self.kg.len(),
            split: self.split_stats.clone(),
        }
    }
}

/// Drives linker, splitter, expander and persistence for one dataset
pub struct Preprocessor {
    config: PrepConfig,
}

impl Preprocessor {
    pub fn new(config: PrepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    /// Run every stage in memory with a generator seeded from the config
    pub fn prepare(&self) -> Result<PreparedData> {
        let mut rng = fastrand::Rng::with_seed(self.config.seed);
        self.prepare_with_rng(&mut rng)
    }

    /// Run every stage in memory, shuffling users with `rng`
    pub fn prepare_with_rng(&self, rng: &mut fastrand::Rng) -> Result<PreparedData> {
        let config = &self.config;
        let mut vocabs = Vocabularies::default();

        read_item2entity_file(&config.item2entity_path, &mut vocabs.item, &mut vocabs.entity)?;

        let grouped = read_rating_file(&config.rating_path, config.separator, &vocabs.item)?;
        let (splits, split_stats) =
            split_ratings(grouped, config, rng, &mut vocabs.user, &mut vocabs.item)?;

        let kg = KgSnapshot::read(&config.kg_path, &mut vocabs.entity, &mut vocabs.relation)?;
        let adjacency = kg.adjacency(vocabs.entity.index_bound());
        let n_hop = build_n_hop(&vocabs.entity, &adjacency, config.neighbor_key);

        log::info!(
            "num of entities: {}, num of relations: {}",
            vocabs.entity.len(),
            vocabs.relation.len()
        );

        Ok(PreparedData {
            vocabs,
            splits,
            split_stats,
            kg,
            n_hop,
        })
    }

    /// Write a prepared run to the output directory
    pub fn persist(&self, data: &PreparedData) -> Result<Manifest> {
        let mut writer = ArtifactWriter::new(&self.config.output_dir, self.config.format)?;

        writer.write("user_vocab", &data.vocabs.user)?;
        writer.write("item_vocab", &data.vocabs.item)?;
        for split in Split::ALL {
            writer.write(split.artifact_name(), data.splits.get(split))?;
        }
        writer.write("entity_vocab", &data.vocabs.entity)?;
        writer.write("relation_vocab", &data.vocabs.relation)?;
        writer.write("n_hop_kg", &data.n_hop)?;

        if self.config.write_adjacency {
            let matrix = adjacency_matrix(&data.kg, data.vocabs.entity.index_bound());
            writer.write_matrix(ADJACENCY_STEM, &matrix)?;
        } else {
            log::info!("Skipping adjacency matrix");
        }

        writer.finish(&self.config, &data.summary())
    }

    /// Prepare and persist
    pub fn run(&self) -> Result<PipelineSummary> {
        let started = Instant::now();
        let data = self.prepare()?;
        let manifest = self.persist(&data)?;

        log::info!(
            "Preprocessing finished in {:.2?}: {} users, {} items, {} entities, {} relations",
            started.elapsed(),
            manifest.summary.users,
            manifest.summary.items,
            manifest.summary.entities,
            manifest.summary.relations
        );
        Ok(manifest.summary)
    }
}
