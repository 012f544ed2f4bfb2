//! Candidate filters applied before neighbors are ranked.

use super::Candidate;
use data_loader::UserId;

/// Core trait for filtering neighbor candidates.
///
/// Filters take ownership of the candidate list and return what survives,
/// so a chain of them can run without cloning.
pub trait NeighborFilter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    fn apply(&self, candidates: Vec<Candidate>, target: UserId) -> Vec<Candidate>;
}

/// Drops candidates whose similarity to the target is undefined
pub struct UndefinedSimilarityFilter;

impl NeighborFilter for UndefinedSimilarityFilter {
    fn name(&self) -> &str {
        "UndefinedSimilarityFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, _target: UserId) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|candidate| candidate.similarity.is_defined())
            .collect()
    }
}

/// Drops the target user from its own candidate list
pub struct SelfExclusionFilter;

impl NeighborFilter for SelfExclusionFilter {
    fn name(&self) -> &str {
        "SelfExclusionFilter"
    }

    fn apply(&self, candidates: Vec<Candidate>, target: UserId) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|candidate| candidate.user_id != target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::Similarity;

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new(1, Similarity::Coefficient(0.4)),
            Candidate::new(2, Similarity::Undefined),
            Candidate::new(3, Similarity::Coefficient(-0.2)),
        ]
    }

    #[test]
    fn test_undefined_filter() {
        let kept = UndefinedSimilarityFilter.apply(candidates(), 9);
        let ids: Vec<UserId> = kept.iter().map(|c| c.user_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_self_exclusion_filter() {
        let kept = SelfExclusionFilter.apply(candidates(), 3);
        let ids: Vec<UserId> = kept.iter().map(|c| c.user_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
