//! kgrec-prep - build recommender inputs from ratings and a knowledge graph
//!
//! Main entry point for the one-shot preprocessing job.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kgrec_prep::{ArtifactFormat, Manifest, NeighborKey, PrepConfig, Preprocessor};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kgrec-prep")]
#[command(about = "Knowledge-graph recommendation preprocessing", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build vocabularies, rating splits and n-hop sets
    Run(Overrides),

    /// Check an output directory against its manifest
    Verify {
        /// Output directory of a previous run
        dir: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config(Overrides),
}

/// Command-line values that take precedence over the config file
#[derive(Args, Default)]
struct Overrides {
    /// Tab-separated item id to entity id file
    #[arg(long, value_name = "FILE")]
    item2entity: Option<PathBuf>,

    /// Ratings file (header line + user, item, rating, timestamp)
    #[arg(long, value_name = "FILE")]
    ratings: Option<PathBuf>,

    /// Tab-separated knowledge graph (head, relation, tail)
    #[arg(long, value_name = "FILE")]
    kg: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Field delimiter of the ratings file
    #[arg(long)]
    separator: Option<char>,

    /// Rating at or above which an interaction counts as positive
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum linked interactions per user
    #[arg(long)]
    minimum_interactions: Option<usize>,

    /// Seed for the user shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Index followed from 1-hop triples when building 2-hop sets
    #[arg(long, value_enum)]
    neighbor_key: Option<NeighborKey>,

    /// Encoding of dictionary artifacts
    #[arg(long, value_enum)]
    format: Option<ArtifactFormat>,

    /// Do not write the dense adjacency matrix
    #[arg(long)]
    no_adjacency: bool,
}

impl Overrides {
    fn apply(self, config: &mut PrepConfig) {
        if let Some(path) = self.item2entity {
            config.item2entity_path = path;
        }
        if let Some(path) = self.ratings {
            config.rating_path = path;
        }
        if let Some(path) = self.kg {
            config.kg_path = path;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(separator) = self.separator {
            config.separator = separator;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(minimum) = self.minimum_interactions {
            config.minimum_interactions = minimum;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(key) = self.neighbor_key {
            config.neighbor_key = key;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.no_adjacency {
            config.write_adjacency = false;
        }
    }
}

fn load_config(path: Option<PathBuf>, overrides: Overrides) -> Result<PrepConfig> {
    let mut config = match path {
        Some(path) => {
            log::info!("Loading config from: {}", path.display());
            PrepConfig::from_file(&path)?
        }
        None => PrepConfig::default(),
    };
    overrides.apply(&mut config);
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(overrides) => {
            let config = load_config(cli.config, overrides)?;
            let preprocessor = Preprocessor::new(config).context("Invalid configuration")?;
            let summary = preprocessor.run().context("Preprocessing failed")?;

            println!("users: {}", summary.users);
            println!("items: {}", summary.items);
            println!("entities: {}", summary.entities);
            println!("relations: {}", summary.relations);
            println!(
                "train/valid/test users: {}/{}/{}",
                summary.split.train_users, summary.split.valid_users, summary.split.test_users
            );
        }

        Commands::Verify { dir } => {
            let manifest = Manifest::load(&dir)
                .with_context(|| format!("No complete output set in {}", dir.display()))?;
            let mismatched = manifest.verify(&dir)?;
            if !mismatched.is_empty() {
                anyhow::bail!("{} artifacts do not match the manifest: {}", mismatched.len(), mismatched.join(", "));
            }
            println!("{} artifacts verified in {}", manifest.artifacts.len(), dir.display());
        }

        Commands::Config(overrides) => {
            let config = load_config(cli.config, overrides)?;
            config.validate()?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "kgrec-prep",
            "run",
            "--ratings",
            "data/ratings.dat",
            "--separator",
            ":",
            "--minimum-interactions",
            "20",
            "--neighbor-key",
            "relation",
            "--no-adjacency",
        ])
        .unwrap();

        let Commands::Run(overrides) = cli.command else {
            panic!("expected run");
        };
        let config = load_config(None, overrides).unwrap();
        assert_eq!(config.rating_path, PathBuf::from("data/ratings.dat"));
        assert_eq!(config.separator, ':');
        assert_eq!(config.minimum_interactions, 20);
        assert_eq!(config.neighbor_key, NeighborKey::Relation);
        assert!(!config.write_adjacency);
        assert_eq!(config.seed, 14);
    }

    #[test]
    fn test_verify_requires_dir() {
        assert!(Cli::try_parse_from(["kgrec-prep", "verify"]).is_err());
    }
}
