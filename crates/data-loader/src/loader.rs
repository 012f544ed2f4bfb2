//! Dataset loading.
//!
//! Parses the four MovieLens 100k files, builds the [`RatingTable`] and the
//! [`Registry`], and validates that everything references declared ids.
//! Any failure aborts the load; a partially built table is never returned.

use crate::config::DatasetConfig;
use crate::error::{DataLoadError, Result};
use crate::parser::{self, DatasetInfo};
use crate::table::RatingTable;
use crate::types::{Registry, UserId};
use tracing::{debug, info, instrument};

/// Everything loaded from a dataset directory
#[derive(Debug)]
pub struct Dataset {
    pub table: RatingTable,
    pub registry: Registry,
    pub info: DatasetInfo,
}

impl Dataset {
    /// Load the whole dataset described by `config`.
    ///
    /// Steps:
    /// 1. Parse all four files in parallel
    /// 2. Build the registry
    /// 3. Build the rating table sized from `u.info`
    /// 4. Validate counts and references
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub fn load(config: &DatasetConfig) -> Result<Self> {
        info!("Loading MovieLens dataset");

        let info_path = config.info_path();
        let user_path = config.user_path();
        let item_path = config.item_path();
        let rating_path = config.rating_path();

        // Nested joins give four-way parallelism
        let ((info, users), (items, ratings)) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_info(&info_path),
                    || parser::parse_users(&user_path),
                )
            },
            || {
                rayon::join(
                    || parser::parse_items(&item_path),
                    || parser::parse_ratings(&rating_path),
                )
            },
        );

        let info = info?;
        let users = users?;
        let items = items?;
        let ratings = ratings?;

        debug!(
            users = users.len(),
            items = items.len(),
            ratings = ratings.len(),
            "Parsed dataset files"
        );

        let mut registry = Registry::new();
        for user in users {
            registry.insert_user(user);
        }
        for item in items {
            registry.insert_item(item);
        }

        let table = RatingTable::from_records(info.users, info.items, &ratings)?;

        let dataset = Dataset {
            table,
            registry,
            info,
        };
        dataset.validate()?;

        info!(
            users = dataset.info.users,
            items = dataset.info.items,
            ratings = dataset.table.rating_count(),
            "Dataset loaded and validated"
        );
        Ok(dataset)
    }

    /// Check that:
    /// - the registry describes every declared user and item
    /// - the registry has nothing beyond the declared counts
    pub fn validate(&self) -> Result<()> {
        let (registered_users, registered_items) = self.registry.counts();
        if registered_users != self.info.users {
            return Err(DataLoadError::Validation(format!(
                "u.info declares {} users but {} were listed",
                self.info.users, registered_users
            )));
        }
        if registered_items != self.info.items {
            return Err(DataLoadError::Validation(format!(
                "u.info declares {} items but {} were listed",
                self.info.items, registered_items
            )));
        }

        for user_id in self.table.user_ids() {
            if self.registry.user(user_id).is_none() {
                return Err(DataLoadError::MissingReference {
                    entity: "User".to_string(),
                    id: user_id,
                });
            }
        }
        for item_id in self.table.item_ids() {
            if self.registry.item(item_id).is_none() {
                return Err(DataLoadError::MissingReference {
                    entity: "Item".to_string(),
                    id: item_id,
                });
            }
        }
        Ok(())
    }

    /// (users, items, ratings) actually present
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.table.n_users(),
            self.table.n_items(),
            self.table.rating_count(),
        )
    }

    /// Users with at least one rating
    pub fn active_users(&self) -> Vec<UserId> {
        self.table
            .user_ids()
            .filter(|&user_id| self.table.user_ratings(user_id).next().is_some())
            .collect()
    }
}

/// Load the dataset described by `config`
pub fn load_dataset(config: &DatasetConfig) -> Result<Dataset> {
    Dataset::load(config)
}
