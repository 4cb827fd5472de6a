//! Restore the target train/test ratio of every category
//!
//! For each category (ascending id) the paired stores hold `a` and `b`
//! examples. The side `rebalance` is called on should hold
//! `round((a + b) * ratio)`, keeping `a` on an exact tie; the surplus
//! moves from the tail of the over-represented side onto the tail of the
//! other one. Moves depend only on the current counts, so a balanced pair
//! is left untouched.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::dataset_store::DatasetStore;
use crate::error::{DatasetError, Result};
use crate::split::splitter::validate_ratio;

/// Which way examples travelled for a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    /// From the paired store into the store `rebalance` was called on
    ToThis,
    /// From the store `rebalance` was called on into the paired store
    ToOther,
}

/// Examples moved for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMove {
    pub category: u32,
    pub count: usize,
    pub direction: MoveDirection,
}

/// Outcome of a rebalance pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub moves: Vec<CategoryMove>,
}

impl RebalanceReport {
    /// Total number of examples moved in either direction
    pub fn moved(&self) -> usize {
        self.moves.iter().map(|m| m.count).sum()
    }

    pub fn is_noop(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Tolerance for treating `total * ratio` as exactly halfway
const TIE_EPSILON: f64 = 1e-9;

/// Number of examples the `ratio` side should hold out of `total`, given
/// that it currently holds `current`
///
/// When `total * ratio` lies exactly halfway between two counts and
/// `current` is one of them, `current` is kept.
pub fn target_count(total: usize, ratio: f64, current: usize) -> usize {
    let ideal = total as f64 * ratio;
    let lower = ideal.floor();
    if (ideal - lower - 0.5).abs() < TIE_EPSILON {
        let lower = lower as usize;
        if current == lower || current == lower + 1 {
            return current.min(total);
        }
    }
    (ideal.round() as usize).min(total)
}

impl DatasetStore {
    /// Move whole examples between `self` and `other` until every category
    /// holds as close to `ratio` of its examples in `self` as possible
    ///
    /// Both stores must share the same schema. No example is created or
    /// dropped.
    pub fn rebalance(&mut self, other: &mut DatasetStore, ratio: f64) -> Result<RebalanceReport> {
        validate_ratio(ratio)?;
        let schema = self.bound_schema()?;
        let other_schema = other.bound_schema()?;
        if schema != other_schema {
            return Err(DatasetError::SchemaIncompatible {
                path: other.path().to_path_buf(),
                stored: other_schema,
                requested: schema,
            });
        }

        let categories: BTreeSet<u32> = self.categories().chain(other.categories()).collect();
        let mut report = RebalanceReport::default();

        for category in categories {
            let here = self.count(category);
            let there = other.count(category);
            let target = target_count(here + there, ratio, here);

            let movement = if here > target {
                let count = here - target;
                move_tail(self, other, category, count);
                Some(CategoryMove {
                    category,
                    count,
                    direction: MoveDirection::ToOther,
                })
            } else if here < target {
                let count = target - here;
                move_tail(other, self, category, count);
                Some(CategoryMove {
                    category,
                    count,
                    direction: MoveDirection::ToThis,
                })
            } else {
                None
            };

            if let Some(movement) = movement {
                debug!(
                    "category {}: moved {} examples {:?} ({} -> {} of {})",
                    category,
                    movement.count,
                    movement.direction,
                    here,
                    target,
                    here + there
                );
                report.moves.push(movement);
            }
        }

        self.prune_empty();
        other.prune_empty();

        if !report.is_noop() {
            info!(
                "rebalanced {} categories, {} examples moved",
                report.moves.len(),
                report.moved()
            );
        }
        Ok(report)
    }
}

fn move_tail(from: &mut DatasetStore, to: &mut DatasetStore, category: u32, count: usize) {
    let source = from.examples_mut(category);
    let tail = source.split_off(source.len() - count);
    to.examples_mut(category).extend(tail);
}
