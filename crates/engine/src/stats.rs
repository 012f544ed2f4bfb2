//! Per-user rating statistics.

use crate::error::{PredictError, Result};
use data_loader::{RatingTable, UserId};
use rayon::prelude::*;

/// Mean rating of every user, computed once from an immutable table.
///
/// Only the ratings a user actually gave count towards the mean.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStatistics {
    /// Index 0 is user 1. `None` for users with no ratings
    means: Vec<Option<f64>>,
    counts: Vec<usize>,
}

impl UserStatistics {
    pub fn compute(table: &RatingTable) -> Self {
        let per_user: Vec<(usize, Option<f64>)> = table
            .user_ids()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|user_id| {
                let (sum, count) = table
                    .user_ratings(user_id)
                    .fold((0u32, 0usize), |(sum, count), (_, score)| {
                        (sum + u32::from(score.value()), count + 1)
                    });
                let mean = (count > 0).then(|| f64::from(sum) / count as f64);
                (count, mean)
            })
            .collect();

        let (counts, means) = per_user.into_iter().unzip();
        Self { means, counts }
    }

    fn index(&self, user_id: UserId) -> Result<usize> {
        if user_id == 0 || user_id as usize > self.means.len() {
            return Err(PredictError::UnknownUser(user_id));
        }
        Ok(user_id as usize - 1)
    }

    /// Arithmetic mean of the user's own ratings
    pub fn mean_rating(&self, user_id: UserId) -> Result<f64> {
        let idx = self.index(user_id)?;
        self.means[idx].ok_or(PredictError::NoRatings(user_id))
    }

    /// Number of items the user rated
    pub fn rating_count(&self, user_id: UserId) -> Result<usize> {
        let idx = self.index(user_id)?;
        Ok(self.counts[idx])
    }

    pub fn n_users(&self) -> usize {
        self.means.len()
    }
}
