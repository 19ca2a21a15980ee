//! Rating Splitter
//!
//! Groups ratings per user, drops users with too few linked interactions,
//! partitions the rest into train/validation/test by a seeded shuffle and
//! prunes linked items nobody rated.
//!
//! ```text
//! ratings file ──▶ group by user ──▶ min-interaction filter ──▶ shuffle ──▶ 80 / 10 / 10
//!   (linked items only)                                          (seeded)       │
//!                                                                               ▼
//!                                                     user vocab + item pruning
//! ```

use crate::config::PrepConfig;
use crate::error::{PrepError, Result};
use crate::reader::{Columns, DelimitedReader};
use crate::types::{RatingDict, RatingRecord, RawId, Split, Vocab};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Linked ratings grouped by raw user id, users kept in first-seen order
#[derive(Debug, Clone, Default)]
pub struct UserRatings {
    order: Vec<RawId>,
    ratings: HashMap<RawId, Vec<RatingRecord>>,
    /// Rows dropped because their item has no knowledge-graph entity
    pub unlinked_rows: usize,
}

impl UserRatings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, user: RawId, record: RatingRecord) {
        if !self.ratings.contains_key(&user) {
            self.order.push(user);
        }
        self.ratings.entry(user).or_default().push(record);
    }

    /// Number of distinct users
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, user: RawId) -> Option<&[RatingRecord]> {
        self.ratings.get(&user).map(Vec::as_slice)
    }

    pub fn users(&self) -> &[RawId] {
        &self.order
    }

    /// Drop users with fewer than `minimum` interactions; returns how many went.
    pub fn retain_min_interactions(&mut self, minimum: usize) -> usize {
        let ratings = &mut self.ratings;
        let before = self.order.len();
        self.order.retain(|user| {
            if ratings[user].len() >= minimum {
                true
            } else {
                ratings.remove(user);
                false
            }
        });
        before - self.order.len()
    }
}

/// The three disjoint rating dictionaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitRatings {
    pub train: RatingDict,
    pub valid: RatingDict,
    pub test: RatingDict,
}

impl SplitRatings {
    pub fn get(&self, split: Split) -> &RatingDict {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    fn get_mut(&mut self, split: Split) -> &mut RatingDict {
        match split {
            Split::Train => &mut self.train,
            Split::Valid => &mut self.valid,
            Split::Test => &mut self.test,
        }
    }

    /// Which split a dense user index landed in
    pub fn split_of(&self, user: usize) -> Option<Split> {
        Split::ALL
            .into_iter()
            .find(|split| self.get(*split).contains_key(&user))
    }

    pub fn total_users(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }
}

/// Counters collected while splitting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    pub users_seen: usize,
    pub users_dropped: usize,
    pub train_users: usize,
    pub valid_users: usize,
    pub test_users: usize,
    pub interactions: usize,
    /// Interactions rated at or above the configured threshold
    pub positive_interactions: usize,
    pub unlinked_rows: usize,
    pub pruned_items: usize,
}

/// Read the ratings file, keeping only rows whose item is in `item_vocab`.
/// The first line is a header and is skipped.
pub fn read_rating_file(
    path: &Path,
    separator: char,
    item_vocab: &Vocab<RawId>,
) -> Result<UserRatings> {
    log::info!("Reading rating file: {}", path.display());

    let mut grouped = UserRatings::new();
    DelimitedReader::new(path, separator, Columns::AtLeast(4))
        .skip_header()
        .for_each(|fields| {
            let user: RawId = fields.parse(0)?;
            let item: RawId = fields.parse(1)?;
            let rating: f64 = fields.parse(2)?;
            let timestamp = fields.text(3).trim().to_string();

            match item_vocab.get(&item) {
                Some(item) => grouped.push(user, RatingRecord { item, rating, timestamp }),
                None => grouped.unlinked_rows += 1,
            }
            Ok(())
        })?;

    log::debug!(
        "Grouped ratings of {} users, skipped {} rows with unlinked items",
        grouped.len(),
        grouped.unlinked_rows
    );
    Ok(grouped)
}

/// Split grouped ratings into train/validation/test.
///
/// Users surviving the minimum-interaction filter get dense indices in the
/// order they first appeared in the ratings file; only split membership comes
/// from the shuffle. Linked items that no retained user rated are removed from
/// `item_vocab`.
pub fn split_ratings(
    mut ratings: UserRatings,
    config: &PrepConfig,
    rng: &mut fastrand::Rng,
    user_vocab: &mut Vocab<RawId>,
    item_vocab: &mut Vocab<RawId>,
) -> Result<(SplitRatings, SplitStats)> {
    if !user_vocab.is_empty() {
        return Err(PrepError::VocabularyNotEmpty { vocab: "user" });
    }
    if item_vocab.is_empty() {
        return Err(PrepError::EmptyItemVocabulary);
    }

    let mut stats = SplitStats {
        users_seen: ratings.len(),
        unlinked_rows: ratings.unlinked_rows,
        ..SplitStats::default()
    };
    stats.users_dropped = ratings.retain_min_interactions(config.minimum_interactions);
    if stats.users_dropped > 0 {
        log::debug!(
            "Dropped {} users with fewer than {} interactions",
            stats.users_dropped,
            config.minimum_interactions
        );
    }
    if ratings.is_empty() {
        log::warn!("No user has at least {} linked interactions", config.minimum_interactions);
    }

    let mut shuffled = ratings.users().to_vec();
    rng.shuffle(&mut shuffled);

    let total = shuffled.len();
    let train_end = (total as f64 * config.train_ratio) as usize;
    let valid_end = ((total as f64 * (config.train_ratio + config.valid_ratio)) as usize).min(total);

    let mut membership: HashMap<RawId, Split> = HashMap::with_capacity(total);
    for (pos, user) in shuffled.iter().enumerate() {
        let split = if pos < train_end {
            Split::Train
        } else if pos < valid_end {
            Split::Valid
        } else {
            Split::Test
        };
        membership.insert(*user, split);
    }

    log::info!("Converting rating file...");
    let mut splits = SplitRatings::default();
    let mut rated_items: HashSet<usize> = HashSet::new();

    let UserRatings { order, mut ratings, .. } = ratings;
    for user in order {
        let records = ratings.remove(&user).unwrap_or_default();
        let split = membership[&user];
        let user_id = user_vocab.get_or_insert(user);

        for record in &records {
            rated_items.insert(record.item);
            if record.is_positive(config.threshold) {
                stats.positive_interactions += 1;
            }
        }
        stats.interactions += records.len();
        splits.get_mut(split).insert(user_id, records);
    }

    let linked_items = item_vocab.len();
    item_vocab.retain(|_, idx| rated_items.contains(&idx));
    stats.pruned_items = linked_items - item_vocab.len();

    stats.train_users = splits.train.len();
    stats.valid_users = splits.valid.len();
    stats.test_users = splits.test.len();

    log::info!(
        "num of users: {}, num of items: {} ({} unrated items pruned)",
        user_vocab.len(),
        item_vocab.len(),
        stats.pruned_items
    );
    log::info!(
        "Split users train/valid/test: {}/{}/{}, {} interactions ({} positive at threshold {})",
        stats.train_users,
        stats.valid_users,
        stats.test_users,
        stats.interactions,
        stats.positive_interactions,
        config.threshold
    );

    Ok((splits, stats))
}
