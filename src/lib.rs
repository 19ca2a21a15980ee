//! # kgrec-prep - Knowledge-Graph Recommendation Preprocessing
//!
//! Turns raw rating logs and knowledge-graph triples into the dense, index-compact
//! inputs a KG-aware recommender consumes. The whole run is a one-shot batch job:
//! read three flat files, build vocabularies, split users, expand the graph,
//! write everything to one output directory and exit.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Item-Entity  │────▶│    Rating    │────▶│  Knowledge   │────▶│  Artifact    │
//! │   Linker     │     │   Splitter   │     │ Graph Expand │     │   Writer     │
//! └──────────────┘     └──────────────┘     └──────────────┘     └──────────────┘
//!   item + entity        user vocab,          entity + relation     vocabularies,
//!   vocabularies         train/val/test       vocab, n-hop sets,    dictionaries,
//!                        item pruning         adjacency matrix      .npy, manifest
//! ```
//!
//! Vocabularies are owned values handed from stage to stage; no stage reaches
//! into shared state.
//!
//! ## Example
//!
//! ```no_run
//! use kgrec_prep::{PrepConfig, Preprocessor};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = PrepConfig::default();
//!     let summary = Preprocessor::new(config)?.run()?;
//!
//!     println!("{} users, {} items, {} entities",
//!         summary.users, summary.items, summary.entities);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod kg;
pub mod linker;
pub mod persistence;
pub mod pipeline;
pub mod reader;
pub mod splitter;
pub mod types;

pub use config::{ArtifactFormat, NeighborKey, PrepConfig};
pub use error::{PrepError, Result};
pub use kg::{adjacency_matrix, build_n_hop, AdjacencyList, KgSnapshot};
pub use linker::read_item2entity_file;
pub use persistence::{ArtifactWriter, Manifest, ManifestEntry};
pub use pipeline::{PipelineSummary, PreparedData, Preprocessor, Vocabularies};
pub use splitter::{read_rating_file, split_ratings, SplitRatings, SplitStats, UserRatings};
pub use types::*;
