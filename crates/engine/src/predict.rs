//! Mean-centred weighted rating prediction.
//!
//! ```text
//! P(a, i) = mean(a) + Σ w(a,u) * (r(u,i) - mean(u)) / Σ w(a,u)
//! ```
//!
//! summed over the selected neighbors `u` of `a` for item `i`, then clamped
//! to `[1, 5]`. With no neighbors, or when the weights sum to exactly zero,
//! the configured fallback rating is returned instead.

use crate::config::EngineConfig;
use crate::error::{PredictError, Result};
use crate::neighbors::{Neighbor, NeighborSelector};
use crate::similarity::SimilarityMatrix;
use crate::stats::UserStatistics;
use data_loader::{ItemId, MAX_SCORE, MIN_SCORE, RatingTable, UserId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Why a prediction fell back to the fixed rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegenerateReason {
    /// Nobody similar to the user rated the item
    NoNeighbors,
    /// Positive and negative weights cancelled out
    ZeroWeightSum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PredictionOutcome {
    /// The formula produced `raw`, which was clamped into the rating range
    Estimated { raw: f64 },
    Fallback(DegenerateReason),
}

/// A prediction together with the evidence behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: f64,
    pub user_mean: f64,
    pub outcome: PredictionOutcome,
    pub neighbors: Vec<Neighbor>,
}

impl Prediction {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, PredictionOutcome::Fallback(_))
    }
}

/// Answers rating predictions over an immutable table.
///
/// Statistics and similarities are computed once at construction and shared
/// read-only, so a `Predictor` can be queried from any number of threads.
pub struct Predictor {
    table: Arc<RatingTable>,
    stats: Arc<UserStatistics>,
    similarity: Arc<SimilarityMatrix>,
    selector: NeighborSelector,
    config: EngineConfig,
}

impl Predictor {
    /// Compute statistics and the similarity matrix for `table`
    #[instrument(skip(table, config), fields(method = %config.method))]
    pub fn build(table: Arc<RatingTable>, config: EngineConfig) -> Self {
        let similarity = Arc::new(SimilarityMatrix::build(&table, config.method));
        let predictor = Self::new(table, similarity, config);
        info!("Predictor ready");
        predictor
    }

    /// Use an existing similarity matrix computed from the same table
    pub fn new(table: Arc<RatingTable>, similarity: Arc<SimilarityMatrix>, config: EngineConfig) -> Self {
        debug_assert_eq!(
            similarity.n_users(),
            table.n_users(),
            "similarity matrix and rating table disagree on the number of users"
        );
        let stats = Arc::new(UserStatistics::compute(&table));
        Self {
            table,
            stats,
            similarity,
            selector: NeighborSelector::new(config.neighbor_limit),
            config,
        }
    }

    pub fn table(&self) -> &RatingTable {
        &self.table
    }

    pub fn statistics(&self) -> &UserStatistics {
        &self.stats
    }

    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Predicted rating in `[1, 5]`
    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> Result<f64> {
        self.explain(user_id, item_id).map(|prediction| prediction.value)
    }

    /// Neighbors that would be used to predict `item_id` for `user_id`
    pub fn neighbors(&self, user_id: UserId, item_id: ItemId) -> Result<Vec<Neighbor>> {
        self.check_item(item_id)?;
        let row = self.similarity.row(user_id)?;
        Ok(self.selector.select(user_id, item_id, row, &self.table))
    }

    /// Predict and report how the value was reached
    pub fn explain(&self, user_id: UserId, item_id: ItemId) -> Result<Prediction> {
        let user_mean = self.stats.mean_rating(user_id)?;
        self.check_item(item_id)?;

        let ranked = self.selector.rank(user_id, self.similarity.row(user_id)?);
        self.predict_from_ranking(user_id, user_mean, &ranked, item_id)
    }

    /// Predict every item for one user, in item order
    pub fn predict_row(&self, user_id: UserId) -> Result<Vec<(ItemId, f64)>> {
        let user_mean = self.stats.mean_rating(user_id)?;
        let ranked = self.selector.rank(user_id, self.similarity.row(user_id)?);

        let items: Vec<ItemId> = self.table.item_ids().collect();
        let row = items
            .into_par_iter()
            .map(|item_id| {
                self.predict_from_ranking(user_id, user_mean, &ranked, item_id)
                    .map(|prediction| (item_id, prediction.value))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(user_id, items = row.len(), "Predicted full row");
        Ok(row)
    }

    /// Highest-predicted items the user has not rated yet, best first.
    /// Equal predictions are ordered by ascending item id.
    pub fn recommend(&self, user_id: UserId, limit: usize) -> Result<Vec<(ItemId, f64)>> {
        let mut unrated: Vec<(ItemId, f64)> = self
            .predict_row(user_id)?
            .into_iter()
            .filter(|&(item_id, _)| self.table.get(user_id, item_id).is_none())
            .collect();

        unrated.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
        });
        unrated.truncate(limit);
        Ok(unrated)
    }

    fn check_item(&self, item_id: ItemId) -> Result<()> {
        if self.table.contains_item(item_id) {
            Ok(())
        } else {
            Err(PredictError::UnknownItem(item_id))
        }
    }

    fn predict_from_ranking(
        &self,
        user_id: UserId,
        user_mean: f64,
        ranked: &[Neighbor],
        item_id: ItemId,
    ) -> Result<Prediction> {
        let neighbors = self.selector.take_raters(ranked, item_id, &self.table);

        let fallback = |reason, neighbors| Prediction {
            user_id,
            item_id,
            value: self.config.fallback_rating,
            user_mean,
            outcome: PredictionOutcome::Fallback(reason),
            neighbors,
        };

        if neighbors.is_empty() {
            return Ok(fallback(DegenerateReason::NoNeighbors, neighbors));
        }

        let mut weighted_deviation_sum = 0.0;
        let mut weight_sum = 0.0;
        for neighbor in &neighbors {
            let Some(score) = self.table.get(neighbor.user_id, item_id) else {
                continue;
            };
            let neighbor_mean = self.stats.mean_rating(neighbor.user_id)?;
            weighted_deviation_sum += neighbor.weight * (score.as_f64() - neighbor_mean);
            weight_sum += neighbor.weight;
        }

        if weight_sum == 0.0 {
            return Ok(fallback(DegenerateReason::ZeroWeightSum, neighbors));
        }

        let raw = user_mean + weighted_deviation_sum / weight_sum;
        Ok(Prediction {
            user_id,
            item_id,
            value: clamp_rating(raw),
            user_mean,
            outcome: PredictionOutcome::Estimated { raw },
            neighbors,
        })
    }
}

/// Clamp into `[MIN_SCORE, MAX_SCORE]` without rounding
pub fn clamp_rating(raw: f64) -> f64 {
    raw.clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE))
}
