//! # Engine Crate
//!
//! User-based collaborative filtering: predicts how a user would rate an
//! item from the ratings of users who rate like them.
//!
//! ## Components
//!
//! - **stats**: per-user mean rating
//! - **similarity**: symmetric user-user correlation over co-rated items
//! - **neighbors**: filter and rank the users whose opinion counts
//! - **predict**: mean-centred weighted average, clamped to `[1, 5]`
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Dataset, DatasetConfig};
//! use engine::{EngineConfig, Predictor};
//! use std::sync::Arc;
//!
//! let dataset = Dataset::load(&DatasetConfig::new("data/ml-100k"))?;
//! let predictor = Predictor::build(Arc::new(dataset.table), EngineConfig::default());
//!
//! let rating = predictor.predict(196, 242)?;
//! ```

pub mod config;
pub mod error;
pub mod neighbors;
pub mod predict;
pub mod similarity;
pub mod stats;

// Re-export commonly used types
pub use config::{DEFAULT_NEIGHBOR_LIMIT, EngineConfig, FALLBACK_RATING, SimilarityMethod};
pub use error::{PredictError, Result};
pub use neighbors::{Candidate, Neighbor, NeighborFilter, NeighborSelector};
pub use predict::{DegenerateReason, Prediction, PredictionOutcome, Predictor, clamp_rating};
pub use similarity::{Similarity, SimilarityMatrix};
pub use stats::UserStatistics;
