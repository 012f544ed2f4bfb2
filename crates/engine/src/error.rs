//! Errors surfaced by the prediction engine.

use data_loader::{ItemId, UserId};
use thiserror::Error;

/// Failures that make a prediction impossible.
///
/// Numeric degeneracies inside the formula are not errors; they are
/// recovered with the fallback rating (see [`crate::PredictionOutcome`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredictError {
    #[error("User {0} not found")]
    UnknownUser(UserId),

    #[error("Item {0} not found")]
    UnknownItem(ItemId),

    /// The user exists but has rated nothing, so there is no mean to anchor on
    #[error("User {0} has no ratings")]
    NoRatings(UserId),
}

pub type Result<T> = std::result::Result<T, PredictError>;
