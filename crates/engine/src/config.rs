//! Engine tuning knobs.

use data_loader::{MAX_SCORE, MIN_SCORE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Neighbors consulted per prediction
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 40;

/// Returned when no usable neighbor evidence exists
pub const FALLBACK_RATING: f64 = 1.0;

/// Correlation used to compare two users over their co-rated items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimilarityMethod {
    #[default]
    Pearson,
    /// Pearson over average ranks of the co-rated values
    Spearman,
}

impl fmt::Display for SimilarityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMethod::Pearson => write!(f, "pearson"),
            SimilarityMethod::Spearman => write!(f, "spearman"),
        }
    }
}

impl FromStr for SimilarityMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(SimilarityMethod::Pearson),
            "spearman" => Ok(SimilarityMethod::Spearman),
            other => Err(format!("unknown similarity method '{}'", other)),
        }
    }
}

/// Settings for building and querying a [`Predictor`](crate::Predictor)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub neighbor_limit: usize,
    pub method: SimilarityMethod,
    pub fallback_rating: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
            method: SimilarityMethod::default(),
            fallback_rating: FALLBACK_RATING,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the neighbor limit (default: 40)
    pub fn with_neighbor_limit(mut self, limit: usize) -> Self {
        self.neighbor_limit = limit;
        self
    }

    /// Configure the similarity method (default: Pearson)
    pub fn with_method(mut self, method: SimilarityMethod) -> Self {
        self.method = method;
        self
    }

    /// Configure the degenerate-case rating (default: 1.0), kept inside the
    /// rating range
    pub fn with_fallback_rating(mut self, rating: f64) -> Self {
        self.fallback_rating = rating.clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE));
        self
    }
}
