//! # Data Loader Crate
//!
//! Loads the MovieLens 100k dataset into memory.
//!
//! ## Main Components
//!
//! - **types**: Domain records (User, Item, RatingRecord) and the Registry
//! - **table**: The dense RatingTable, its Score type and the zero-filled view
//! - **parser**: Parse u.info / u.user / u.item / u.data
//! - **loader**: Build and validate a Dataset from a DatasetConfig
//! - **config**: Where the files live
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Dataset, DatasetConfig};
//!
//! let dataset = Dataset::load(&DatasetConfig::new("data/ml-100k"))?;
//! let score = dataset.table.get(196, 242);
//! let item = dataset.registry.item(242).unwrap();
//! println!("user 196 gave {} {:?}", item.title, score);
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod parser;
pub mod table;
pub mod types;

// Re-export commonly used types for convenience
pub use config::DatasetConfig;
pub use error::{DataLoadError, ErrorKind, Result};
pub use loader::{Dataset, load_dataset};
pub use parser::DatasetInfo;
pub use table::{MAX_SCORE, MIN_SCORE, RatingTable, Score, ZeroFilledRatings};
pub use types::{
    // Type aliases
    ItemId,
    UserId,
    // Core types
    Gender,
    Genre,
    Item,
    RatingRecord,
    Registry,
    User,
};
