//! Neighbor selection.
//!
//! For a target user and an item, produce the users whose opinion counts:
//!
//! 1. Start from the target's similarity row
//! 2. Run the candidate filters (undefined similarity, the target itself)
//! 3. Clip weights to `[-1, 1]` and sort by weight descending, ties by
//!    ascending user id
//! 4. Walk the ranking, keeping only users who rated the item, until
//!    `limit` are kept or the ranking runs out
//!
//! Steps 1-3 depend only on the target, so [`NeighborSelector::rank`] can be
//! reused across many items for the same user.

pub mod filters;

use crate::similarity::Similarity;
use data_loader::{ItemId, RatingTable, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use filters::{NeighborFilter, SelfExclusionFilter, UndefinedSimilarityFilter};

/// One entry of a similarity row, before filtering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub user_id: UserId,
    pub similarity: Similarity,
}

impl Candidate {
    pub fn new(user_id: UserId, similarity: Similarity) -> Self {
        Self {
            user_id,
            similarity,
        }
    }
}

/// A selected neighbor and its (clipped) weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub weight: f64,
}

/// Ranks and selects neighbors through a chain of [`NeighborFilter`]s.
///
/// ## Usage
/// ```ignore
/// let selector = NeighborSelector::new(40);
/// let neighbors = selector.select(target, item_id, matrix.row(target)?, &table);
/// ```
pub struct NeighborSelector {
    filters: Vec<Box<dyn NeighborFilter>>,
    limit: usize,
}

impl NeighborSelector {
    /// Selector with the default filters and the given neighbor limit
    pub fn new(limit: usize) -> Self {
        Self {
            filters: Vec::new(),
            limit,
        }
        .add_filter(UndefinedSimilarityFilter)
        .add_filter(SelfExclusionFilter)
    }

    /// Add a filter to the chain (builder pattern)
    pub fn add_filter(mut self, filter: impl NeighborFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Filter and order a similarity row (index 0 is user 1)
    pub fn rank(&self, target: UserId, row: &[Similarity]) -> Vec<Neighbor> {
        let mut current: Vec<Candidate> = row
            .iter()
            .enumerate()
            .map(|(idx, &similarity)| Candidate::new(idx as UserId + 1, similarity))
            .collect();

        for filter in &self.filters {
            let before = current.len();
            current = filter.apply(current, target);
            debug!(
                "Filter {} kept {} of {} candidates",
                filter.name(),
                current.len(),
                before
            );
        }

        let mut ranked: Vec<Neighbor> = current
            .into_iter()
            .filter_map(|candidate| {
                candidate.similarity.clipped().map(|weight| Neighbor {
                    user_id: candidate.user_id,
                    weight,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        ranked
    }

    /// Walk a ranking and keep the first `limit` users who rated `item_id`
    pub fn take_raters(&self, ranked: &[Neighbor], item_id: ItemId, table: &RatingTable) -> Vec<Neighbor> {
        ranked
            .iter()
            .filter(|neighbor| table.get(neighbor.user_id, item_id).is_some())
            .take(self.limit)
            .copied()
            .collect()
    }

    /// Neighbors of `target` that can speak for `item_id`. May be empty.
    pub fn select(
        &self,
        target: UserId,
        item_id: ItemId,
        row: &[Similarity],
        table: &RatingTable,
    ) -> Vec<Neighbor> {
        let ranked = self.rank(target, row);
        let neighbors = self.take_raters(&ranked, item_id, table);
        debug!(
            target_user = target,
            item_id,
            ranked = ranked.len(),
            selected = neighbors.len(),
            "Selected neighbors"
        );
        neighbors
    }
}

impl Default for NeighborSelector {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NEIGHBOR_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::RatingRecord;

    fn table_with_raters(n_users: usize, raters: &[UserId]) -> RatingTable {
        let records: Vec<RatingRecord> = raters
            .iter()
            .map(|&user_id| RatingRecord {
                user_id,
                item_id: 1,
                rating: 3,
                timestamp: 0,
            })
            .collect();
        RatingTable::from_records(n_users, 1, &records).unwrap()
    }

    #[test]
    fn test_excludes_target_and_undefined() {
        let row = [
            Similarity::Undefined,        // user 1 = target
            Similarity::Coefficient(0.5), // user 2
            Similarity::Undefined,        // user 3
            Similarity::Coefficient(0.9), // user 4
        ];
        let table = table_with_raters(4, &[1, 2, 3, 4]);
        let selected = NeighborSelector::new(40).select(1, 1, &row, &table);

        assert_eq!(
            selected,
            vec![
                Neighbor { user_id: 4, weight: 0.9 },
                Neighbor { user_id: 2, weight: 0.5 },
            ]
        );
    }

    #[test]
    fn test_non_finite_coefficients_dropped() {
        let row = [
            Similarity::Undefined,
            Similarity::Coefficient(f64::NAN),
            Similarity::Coefficient(0.4),
            Similarity::Coefficient(f64::INFINITY),
            Similarity::Coefficient(0.7),
        ];
        let table = table_with_raters(5, &[2, 3, 4, 5]);
        let selected = NeighborSelector::new(40).select(1, 1, &row, &table);

        assert_eq!(
            selected,
            vec![
                Neighbor { user_id: 5, weight: 0.7 },
                Neighbor { user_id: 3, weight: 0.4 },
            ]
        );
    }

    #[test]
    fn test_target_excluded_even_with_defined_self_similarity() {
        let row = [Similarity::Coefficient(1.0), Similarity::Coefficient(0.2)];
        let table = table_with_raters(2, &[1, 2]);
        let selected = NeighborSelector::new(40).select(1, 1, &row, &table);
        assert_eq!(selected, vec![Neighbor { user_id: 2, weight: 0.2 }]);
    }

    #[test]
    fn test_skips_users_without_rating() {
        let row = [
            Similarity::Undefined,
            Similarity::Coefficient(0.9),
            Similarity::Coefficient(0.7),
            Similarity::Coefficient(0.1),
        ];
        let table = table_with_raters(4, &[3, 4]);
        let selected = NeighborSelector::new(40).select(1, 1, &row, &table);
        let ids: Vec<UserId> = selected.iter().map(|n| n.user_id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn test_ties_broken_by_user_id() {
        let row = [
            Similarity::Undefined,
            Similarity::Coefficient(0.5),
            Similarity::Coefficient(0.8),
            Similarity::Coefficient(0.5),
            Similarity::Coefficient(0.5),
        ];
        let table = table_with_raters(5, &[2, 3, 4, 5]);
        let ids: Vec<UserId> = NeighborSelector::new(40)
            .select(1, 1, &row, &table)
            .iter()
            .map(|n| n.user_id)
            .collect();
        assert_eq!(ids, vec![3, 2, 4, 5]);
    }

    #[test]
    fn test_weights_clipped() {
        let row = [Similarity::Undefined, Similarity::Coefficient(1.0000001), Similarity::Coefficient(-1.2)];
        let table = table_with_raters(3, &[2, 3]);
        let selected = NeighborSelector::new(40).select(1, 1, &row, &table);
        assert_eq!(selected[0].weight, 1.0);
        assert_eq!(selected[1].weight, -1.0);
    }

    #[test]
    fn test_limit_respected() {
        let n_users = 60;
        let mut row = vec![Similarity::Undefined];
        row.extend((2..=n_users).map(|u| Similarity::Coefficient(1.0 / u as f64)));
        let raters: Vec<UserId> = (1..=n_users as UserId).collect();
        let table = table_with_raters(n_users, &raters);

        let selected = NeighborSelector::new(40).select(1, 1, &row, &table);
        assert_eq!(selected.len(), 40);
        assert!(selected.windows(2).all(|w| w[0].weight >= w[1].weight));
        assert_eq!(selected[0].user_id, 2);
    }

    #[test]
    fn test_empty_when_nobody_qualifies() {
        let row = [Similarity::Undefined, Similarity::Undefined];
        let table = table_with_raters(2, &[2]);
        assert!(NeighborSelector::default().select(1, 1, &row, &table).is_empty());
    }

    struct PositiveOnly;

    impl NeighborFilter for PositiveOnly {
        fn name(&self) -> &str {
            "PositiveOnly"
        }

        fn apply(&self, candidates: Vec<Candidate>, _target: UserId) -> Vec<Candidate> {
            candidates
                .into_iter()
                .filter(|c| c.similarity.coefficient().is_some_and(|w| w > 0.0))
                .collect()
        }
    }

    #[test]
    fn test_custom_filter_in_chain() {
        let row = [Similarity::Undefined, Similarity::Coefficient(-0.4), Similarity::Coefficient(0.3)];
        let table = table_with_raters(3, &[2, 3]);
        let selector = NeighborSelector::new(40).add_filter(PositiveOnly);
        let ids: Vec<UserId> = selector.select(1, 1, &row, &table).iter().map(|n| n.user_id).collect();
        assert_eq!(ids, vec![3]);
    }
}
