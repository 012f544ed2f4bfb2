//! Pairwise user similarity.
//!
//! Every pair of users is compared only over the items *both* of them
//! rated, so each pair sees a different item set. A pair with fewer than two
//! co-rated items, or with a constant rating vector on either side, has no
//! coefficient and is stored as [`Similarity::Undefined`], never as `0.0`.
//!
//! ## Algorithm
//! 1. Collect each user's sparse `(item, rating)` profile, sorted by item
//! 2. For every unordered pair `(a, b)` with `a < b`, merge the two profiles
//!    to find the co-rated values and correlate them
//! 3. Mirror the upper triangle into the lower one; the diagonal stays
//!    undefined
//!
//! Rows of the upper triangle are independent and are computed in parallel.

use crate::config::SimilarityMethod;
use crate::error::{PredictError, Result};
use data_loader::{ItemId, RatingTable, UserId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument};

/// Similarity of two users
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Similarity {
    Coefficient(f64),
    Undefined,
}

impl Similarity {
    pub fn coefficient(self) -> Option<f64> {
        match self {
            Similarity::Coefficient(value) => Some(value),
            Similarity::Undefined => None,
        }
    }

    /// A finite coefficient. NaN and infinities never count as defined.
    pub fn is_defined(self) -> bool {
        matches!(self, Similarity::Coefficient(value) if value.is_finite())
    }

    /// The coefficient clipped to `[-1, 1]`, or `None` if it is not finite.
    ///
    /// Rounding can push a correlation a hair past the bounds.
    pub fn clipped(self) -> Option<f64> {
        self.coefficient()
            .filter(|value| value.is_finite())
            // `+ 0.0` folds -0.0 into 0.0 so equal weights rank by user id
            .map(|value| value.clamp(-1.0, 1.0) + 0.0)
    }
}

/// Symmetric `users x users` similarity matrix
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n_users: usize,
    values: Vec<Similarity>,
}

type Profile = Vec<(ItemId, f64)>;

impl SimilarityMatrix {
    /// Compute the similarity of every pair of users in the table
    #[instrument(skip(table), fields(users = table.n_users()))]
    pub fn build(table: &RatingTable, method: SimilarityMethod) -> Self {
        let start = Instant::now();
        let n_users = table.n_users();

        let profiles: Vec<Profile> = table
            .user_ids()
            .map(|user_id| {
                table
                    .user_ratings(user_id)
                    .map(|(item_id, score)| (item_id, score.as_f64()))
                    .collect()
            })
            .collect();

        // Row `a` holds the pairs (a, b) for every b > a
        let upper: Vec<Vec<Similarity>> = (0..n_users)
            .into_par_iter()
            .map(|a| {
                ((a + 1)..n_users)
                    .map(|b| correlate(&profiles[a], &profiles[b], method))
                    .collect()
            })
            .collect();

        let mut matrix = Self::undefined(n_users);
        for (a, row) in upper.into_iter().enumerate() {
            for (offset, similarity) in row.into_iter().enumerate() {
                matrix.set_pair(a, a + 1 + offset, similarity);
            }
        }

        info!(
            method = %method,
            defined_pairs = matrix.defined_pairs(),
            "Built similarity matrix in {:.2?}",
            start.elapsed()
        );
        matrix
    }

    /// Matrix of `n_users` with every entry undefined
    pub fn undefined(n_users: usize) -> Self {
        Self {
            n_users,
            values: vec![Similarity::Undefined; n_users * n_users],
        }
    }

    /// Build a matrix from explicit coefficients.
    ///
    /// Each `(a, b, value)` is stored for both orders. Pairs not listed are
    /// undefined, and so is the diagonal: a `(a, a, _)` entry is ignored.
    /// Non-finite values are stored as undefined.
    pub fn from_pairs(n_users: usize, pairs: &[(UserId, UserId, f64)]) -> Result<Self> {
        let mut matrix = Self::undefined(n_users);
        for &(a, b, value) in pairs {
            let a_idx = matrix.index(a)?;
            let b_idx = matrix.index(b)?;
            if a_idx == b_idx {
                continue;
            }
            let similarity = if value.is_finite() {
                Similarity::Coefficient(value)
            } else {
                Similarity::Undefined
            };
            matrix.set_pair(a_idx, b_idx, similarity);
        }
        Ok(matrix)
    }

    fn set_pair(&mut self, a: usize, b: usize, similarity: Similarity) {
        self.values[a * self.n_users + b] = similarity;
        self.values[b * self.n_users + a] = similarity;
    }

    fn index(&self, user_id: UserId) -> Result<usize> {
        if user_id == 0 || user_id as usize > self.n_users {
            return Err(PredictError::UnknownUser(user_id));
        }
        Ok(user_id as usize - 1)
    }

    pub fn n_users(&self) -> usize {
        self.n_users
    }

    pub fn get(&self, a: UserId, b: UserId) -> Result<Similarity> {
        let a_idx = self.index(a)?;
        let b_idx = self.index(b)?;
        Ok(self.values[a_idx * self.n_users + b_idx])
    }

    /// One user's row; index 0 is user 1
    pub fn row(&self, user_id: UserId) -> Result<&[Similarity]> {
        let idx = self.index(user_id)?;
        let start = idx * self.n_users;
        Ok(&self.values[start..start + self.n_users])
    }

    /// Number of unordered pairs with a coefficient
    pub fn defined_pairs(&self) -> usize {
        self.values.iter().filter(|s| s.is_defined()).count() / 2
    }
}

/// Correlate two users over the items both rated
pub fn correlate(a: &[(ItemId, f64)], b: &[(ItemId, f64)], method: SimilarityMethod) -> Similarity {
    let (xs, ys) = co_rated(a, b);
    match method {
        SimilarityMethod::Pearson => pearson(&xs, &ys),
        SimilarityMethod::Spearman => pearson(&average_ranks(&xs), &average_ranks(&ys)),
    }
}

/// Merge two item-sorted profiles into the paired values of shared items
fn co_rated(a: &[(ItemId, f64)], b: &[(ItemId, f64)]) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                xs.push(a[i].1);
                ys.push(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

/// Pearson correlation of two equally long samples
pub fn pearson(xs: &[f64], ys: &[f64]) -> Similarity {
    let n = xs.len();
    if n < 2 || ys.len() != n {
        return Similarity::Undefined;
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return Similarity::Undefined;
    }
    Similarity::Coefficient(sxy / (sxx * syy).sqrt())
}

/// 1-based ranks; tied values share the mean of the ranks they span
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1 ..= end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::RatingRecord;

    fn table_from(n_users: usize, n_items: usize, ratings: &[(UserId, ItemId, u8)]) -> RatingTable {
        let records: Vec<RatingRecord> = ratings
            .iter()
            .map(|&(user_id, item_id, rating)| RatingRecord {
                user_id,
                item_id,
                rating,
                timestamp: 0,
            })
            .collect();
        RatingTable::from_records(n_users, n_items, &records).unwrap()
    }

    fn coefficient(similarity: Similarity) -> f64 {
        similarity.coefficient().expect("expected a defined similarity")
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        assert!((coefficient(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0])) - 1.0).abs() < 1e-12);
        assert!((coefficient(pearson(&[1.0, 2.0, 3.0], &[5.0, 3.0, 1.0])) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_undefined_cases() {
        assert_eq!(pearson(&[], &[]), Similarity::Undefined);
        assert_eq!(pearson(&[4.0], &[2.0]), Similarity::Undefined);
        // zero variance on one side
        assert_eq!(pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 5.0]), Similarity::Undefined);
    }

    #[test]
    fn test_only_co_rated_items_count() {
        // Users agree perfectly on items 1-3. User 1 also rated item 4 and
        // user 2 rated item 5; neither should affect the coefficient.
        let table = table_from(
            2,
            5,
            &[(1, 1, 1), (1, 2, 3), (1, 3, 5), (1, 4, 1), (2, 1, 2), (2, 2, 3), (2, 3, 4), (2, 5, 5)],
        );
        let matrix = SimilarityMatrix::build(&table, SimilarityMethod::Pearson);
        assert!((coefficient(matrix.get(1, 2).unwrap()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_shared_item_is_undefined() {
        let table = table_from(2, 3, &[(1, 1, 5), (1, 2, 1), (2, 2, 4), (2, 3, 2)]);
        let matrix = SimilarityMatrix::build(&table, SimilarityMethod::Pearson);
        assert_eq!(matrix.get(1, 2).unwrap(), Similarity::Undefined);
    }

    #[test]
    fn test_symmetry_and_undefined_diagonal() {
        let table = table_from(
            3,
            4,
            &[
                (1, 1, 5), (1, 2, 3), (1, 3, 4), (1, 4, 1),
                (2, 1, 4), (2, 2, 2), (2, 3, 5), (2, 4, 2),
                (3, 1, 1), (3, 2, 5), (3, 3, 2), (3, 4, 4),
            ],
        );
        let matrix = SimilarityMatrix::build(&table, SimilarityMethod::Pearson);

        for a in 1..=3 {
            assert_eq!(matrix.get(a, a).unwrap(), Similarity::Undefined);
            for b in 1..=3 {
                assert_eq!(matrix.get(a, b).unwrap(), matrix.get(b, a).unwrap());
            }
        }
        assert_eq!(matrix.defined_pairs(), 3);
    }

    #[test]
    fn test_rebuild_is_identical() {
        let table = table_from(
            4,
            4,
            &[
                (1, 1, 5), (1, 2, 3), (1, 3, 4),
                (2, 1, 4), (2, 2, 2), (2, 3, 5), (2, 4, 2),
                (3, 1, 1), (3, 3, 2), (3, 4, 4),
                (4, 2, 5), (4, 3, 3), (4, 4, 1),
            ],
        );
        let first = SimilarityMatrix::build(&table, SimilarityMethod::Pearson);
        let second = SimilarityMatrix::build(&table, SimilarityMethod::Pearson);
        assert_eq!(first, second);
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[3.0, 1.0, 3.0, 5.0]), vec![2.5, 1.0, 2.5, 4.0]);
        assert_eq!(average_ranks(&[2.0, 2.0]), vec![1.5, 1.5]);
    }

    #[test]
    fn test_spearman_is_rank_based() {
        // monotone but not linear: Spearman sees a perfect match
        let a = [(1, 1.0), (2, 2.0), (3, 3.0)];
        let b = [(1, 1.0), (2, 2.0), (3, 5.0)];
        let spearman = coefficient(correlate(&a, &b, SimilarityMethod::Spearman));
        let pearson = coefficient(correlate(&a, &b, SimilarityMethod::Pearson));
        assert!((spearman - 1.0).abs() < 1e-12);
        assert!(pearson < 1.0);
    }

    #[test]
    fn test_from_pairs() {
        let matrix = SimilarityMatrix::from_pairs(3, &[(1, 2, 0.8), (3, 3, 1.0)]).unwrap();
        assert_eq!(matrix.get(2, 1).unwrap(), Similarity::Coefficient(0.8));
        assert_eq!(matrix.get(3, 3).unwrap(), Similarity::Undefined);
        assert_eq!(matrix.get(1, 3).unwrap(), Similarity::Undefined);
        assert_eq!(
            SimilarityMatrix::from_pairs(3, &[(1, 4, 0.5)]),
            Err(PredictError::UnknownUser(4))
        );
    }

    #[test]
    fn test_clipping() {
        assert_eq!(Similarity::Coefficient(1.0000000002).clipped(), Some(1.0));
        assert_eq!(Similarity::Coefficient(-1.5).clipped(), Some(-1.0));
        assert_eq!(Similarity::Coefficient(0.3).clipped(), Some(0.3));
        assert_eq!(Similarity::Undefined.clipped(), None);
        assert_eq!(Similarity::Coefficient(f64::NAN).clipped(), None);
        assert_eq!(Similarity::Coefficient(f64::INFINITY).clipped(), None);
        assert!(!Similarity::Coefficient(f64::NAN).is_defined());
        assert!(Similarity::Coefficient(-0.0).clipped().is_some_and(|w| w.is_sign_positive()));
    }

    #[test]
    fn test_from_pairs_drops_non_finite() {
        let matrix =
            SimilarityMatrix::from_pairs(3, &[(1, 2, f64::NAN), (1, 3, f64::NEG_INFINITY), (2, 3, 0.5)]).unwrap();
        assert_eq!(matrix.get(1, 2).unwrap(), Similarity::Undefined);
        assert_eq!(matrix.get(3, 1).unwrap(), Similarity::Undefined);
        assert_eq!(matrix.get(3, 2).unwrap(), Similarity::Coefficient(0.5));
        assert_eq!(matrix.defined_pairs(), 1);
    }
}
