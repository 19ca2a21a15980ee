//! Run configuration
//!
//! Loaded from an optional TOML file and then overridden from the command line.

use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which index of a 1-hop triple is followed to reach the 2-hop neighborhood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NeighborKey {
    /// Follow the neighbor entity (tail of the 1-hop triple)
    #[default]
    Tail,
    /// Reuse the relation index as an entity index. Mixes two unrelated index
    /// spaces; kept only to reproduce outputs of older runs.
    Relation,
}

/// On-disk encoding of dictionary artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Bincode,
    Json,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Bincode => "bin",
            ArtifactFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactFormat::Bincode => write!(f, "bincode"),
            ArtifactFormat::Json => write!(f, "json"),
        }
    }
}

/// Configuration for a preprocessing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Tab-separated (raw item id, raw entity id) pairs
    pub item2entity_path: PathBuf,
    /// Delimited ratings file with one header line
    pub rating_path: PathBuf,
    /// Tab-separated (head, relation, tail) triples
    pub kg_path: PathBuf,
    /// Where every artifact is written
    pub output_dir: PathBuf,
    /// Field delimiter of the ratings file; a single ASCII character
    pub separator: char,
    /// Ratings at or above this value count as positive interactions
    pub threshold: f64,
    /// Users with fewer retained interactions are dropped (inclusive bound)
    pub minimum_interactions: usize,
    /// Seed for the user shuffle
    pub seed: u64,
    /// Share of retained users placed in the training split
    pub train_ratio: f64,
    /// Share of retained users placed in the validation split
    pub valid_ratio: f64,
    pub neighbor_key: NeighborKey,
    pub format: ArtifactFormat,
    /// Write the dense adjacency matrix (entity count squared bytes)
    pub write_adjacency: bool,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            item2entity_path: PathBuf::from("raw_data/movie/item_index2entity_id.txt"),
            rating_path: PathBuf::from("raw_data/movie/ratings.csv"),
            kg_path: PathBuf::from("raw_data/movie/kg.txt"),
            output_dir: PathBuf::from("preprocess_results/movie"),
            separator: ',',
            threshold: 4.0,
            minimum_interactions: 1,
            seed: 14,
            train_ratio: 0.8,
            valid_ratio: 0.1,
            neighbor_key: NeighborKey::Tail,
            format: ArtifactFormat::Bincode,
            write_adjacency: true,
        }
    }
}

impl PrepConfig {
    /// Read a TOML config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| PrepError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |r: f64| r > 0.0 && r <= 1.0;
        if !in_unit(self.train_ratio) {
            return Err(PrepError::InvalidConfig(format!(
                "train_ratio must be in (0, 1], got {}",
                self.train_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.valid_ratio) {
            return Err(PrepError::InvalidConfig(format!(
                "valid_ratio must be in [0, 1], got {}",
                self.valid_ratio
            )));
        }
        if self.train_ratio + self.valid_ratio > 1.0 + f64::EPSILON {
            return Err(PrepError::InvalidConfig(format!(
                "train_ratio + valid_ratio must not exceed 1, got {}",
                self.train_ratio + self.valid_ratio
            )));
        }
        if !self.separator.is_ascii() {
            return Err(PrepError::InvalidConfig(format!(
                "separator must be a single ASCII character, got {:?}",
                self.separator
            )));
        }
        if self.separator == '\n' || self.separator == '\r' {
            return Err(PrepError::InvalidConfig(
                "separator cannot be a line break".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of an artifact inside the output directory
    pub fn artifact_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", stem, extension))
    }
}
