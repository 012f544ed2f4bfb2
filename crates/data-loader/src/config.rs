//! Dataset location settings.

use std::path::{Path, PathBuf};

/// Where the MovieLens 100k files live.
///
/// Passed explicitly into the loader; nothing is read from fixed paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    pub data_dir: PathBuf,
    pub info_file: String,
    pub user_file: String,
    pub item_file: String,
    pub rating_file: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/ml-100k"),
            info_file: "u.info".to_string(),
            user_file: "u.user".to_string(),
            item_file: "u.item".to_string(),
            rating_file: "u.data".to_string(),
        }
    }
}

impl DatasetConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Use a different ratings file, e.g. one of the `u1.base` splits
    pub fn with_rating_file(mut self, file: impl Into<String>) -> Self {
        self.rating_file = file.into();
        self
    }

    pub fn info_path(&self) -> PathBuf {
        self.data_dir.join(&self.info_file)
    }

    pub fn user_path(&self) -> PathBuf {
        self.data_dir.join(&self.user_file)
    }

    pub fn item_path(&self) -> PathBuf {
        self.data_dir.join(&self.item_file)
    }

    pub fn rating_path(&self) -> PathBuf {
        self.data_dir.join(&self.rating_file)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
