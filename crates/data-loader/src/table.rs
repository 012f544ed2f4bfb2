//! Dense rating storage.
//!
//! [`RatingTable`] is the absent-aware view: every cell is `Option<Score>`,
//! so "never rated" can't be mistaken for a low rating. [`ZeroFilledRatings`]
//! is the separate view where absent cells read as `0.0`; it is its own type
//! and can't be passed where a `RatingTable` is expected.

use crate::error::{DataLoadError, Result};
use crate::types::{ItemId, RatingRecord, UserId};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// A rating known to be an integer in `1..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub fn new(value: u8) -> Option<Self> {
        (MIN_SCORE..=MAX_SCORE).contains(&value).then_some(Score(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<u8> for Score {
    type Error = DataLoadError;

    fn try_from(value: u8) -> Result<Self> {
        Score::new(value).ok_or_else(|| DataLoadError::InvalidValue {
            field: "rating".to_string(),
            value: value.to_string(),
        })
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

/// Dense `users x items` table of known ratings.
///
/// Ids are 1-based. Id 0 and ids above the declared counts are never part
/// of the table; lookups on them behave as "not present".
#[derive(Debug, Clone, PartialEq)]
pub struct RatingTable {
    n_users: usize,
    n_items: usize,
    cells: Vec<Option<Score>>,
}

impl RatingTable {
    /// Creates a table with every cell absent
    pub fn new(n_users: usize, n_items: usize) -> Self {
        Self {
            n_users,
            n_items,
            cells: vec![None; n_users * n_items],
        }
    }

    /// Builds a table from raw records, validating ids and values
    pub fn from_records<'a>(
        n_users: usize,
        n_items: usize,
        records: impl IntoIterator<Item = &'a RatingRecord>,
    ) -> Result<Self> {
        let mut table = Self::new(n_users, n_items);
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    pub fn n_users(&self) -> usize {
        self.n_users
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn user_ids(&self) -> RangeInclusive<UserId> {
        1..=self.n_users as UserId
    }

    pub fn item_ids(&self) -> RangeInclusive<ItemId> {
        1..=self.n_items as ItemId
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        user_id >= 1 && (user_id as usize) <= self.n_users
    }

    pub fn contains_item(&self, item_id: ItemId) -> bool {
        item_id >= 1 && (item_id as usize) <= self.n_items
    }

    fn offset(&self, user_id: UserId, item_id: ItemId) -> Option<usize> {
        if self.contains_user(user_id) && self.contains_item(item_id) {
            Some((user_id as usize - 1) * self.n_items + (item_id as usize - 1))
        } else {
            None
        }
    }

    /// Place a record into the table. A repeated (user, item) pair keeps the
    /// latest value.
    pub fn insert(&mut self, record: &RatingRecord) -> Result<()> {
        let score = Score::try_from(record.rating)?;
        if !self.contains_user(record.user_id) {
            return Err(DataLoadError::MissingReference {
                entity: "User".to_string(),
                id: record.user_id,
            });
        }
        if !self.contains_item(record.item_id) {
            return Err(DataLoadError::MissingReference {
                entity: "Item".to_string(),
                id: record.item_id,
            });
        }
        if let Some(offset) = self.offset(record.user_id, record.item_id) {
            self.cells[offset] = Some(score);
        }
        Ok(())
    }

    /// The user's rating for the item, or `None` if absent (or either id is
    /// outside the table)
    pub fn get(&self, user_id: UserId, item_id: ItemId) -> Option<Score> {
        self.offset(user_id, item_id).and_then(|offset| self.cells[offset])
    }

    /// Returns the full row of cells for a user (index 0 is item 1)
    pub fn row(&self, user_id: UserId) -> Option<&[Option<Score>]> {
        if !self.contains_user(user_id) {
            return None;
        }
        let start = (user_id as usize - 1) * self.n_items;
        Some(&self.cells[start..start + self.n_items])
    }

    /// Iterate `(item, score)` over the items a user actually rated, in
    /// ascending item order
    pub fn user_ratings(&self, user_id: UserId) -> impl Iterator<Item = (ItemId, Score)> + '_ {
        self.row(user_id)
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| cell.map(|score| (idx as ItemId + 1, score)))
    }

    /// Total number of non-absent cells
    pub fn rating_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Materialise the zero-filled view of this table
    pub fn zero_filled(&self) -> ZeroFilledRatings {
        ZeroFilledRatings {
            n_users: self.n_users,
            n_items: self.n_items,
            values: self
                .cells
                .iter()
                .map(|cell| cell.map_or(0.0, |score| score.as_f64() as f32))
                .collect(),
        }
    }
}

/// Dense view where absent ratings read as `0.0`.
///
/// Meant for models that want a plain numeric matrix. It deliberately has
/// no way to ask "was this rated", so it can't stand in for a
/// [`RatingTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroFilledRatings {
    n_users: usize,
    n_items: usize,
    values: Vec<f32>,
}

impl ZeroFilledRatings {
    pub fn dims(&self) -> (usize, usize) {
        (self.n_users, self.n_items)
    }

    pub fn value(&self, user_id: UserId, item_id: ItemId) -> f32 {
        let in_range = user_id >= 1
            && (user_id as usize) <= self.n_users
            && item_id >= 1
            && (item_id as usize) <= self.n_items;
        if !in_range {
            return 0.0;
        }
        self.values[(user_id as usize - 1) * self.n_items + (item_id as usize - 1)]
    }

    /// One user's row as a flat slice (index 0 is item 1)
    pub fn row(&self, user_id: UserId) -> &[f32] {
        if user_id == 0 || user_id as usize > self.n_users {
            return &[];
        }
        let start = (user_id as usize - 1) * self.n_items;
        &self.values[start..start + self.n_items]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(user_id: UserId, item_id: ItemId, rating: u8) -> RatingRecord {
        RatingRecord {
            user_id,
            item_id,
            rating,
            timestamp: 881250949,
        }
    }

    #[test]
    fn test_score_bounds() {
        assert!(Score::new(0).is_none());
        assert!(Score::new(6).is_none());
        assert_eq!(Score::new(1).map(Score::value), Some(1));
        assert_eq!(Score::new(5).map(Score::as_f64), Some(5.0));
        assert!(Score::try_from(9).is_err());
    }

    #[test]
    fn test_absent_is_not_a_rating() {
        let table = RatingTable::from_records(2, 3, &[record(1, 2, 3)]).unwrap();

        assert_eq!(table.get(1, 2), Score::new(3));
        assert_eq!(table.get(1, 1), None);
        assert_eq!(table.get(2, 2), None);
        assert_eq!(table.rating_count(), 1);
    }

    #[test]
    fn test_id_zero_is_never_valid() {
        let table = RatingTable::new(3, 3);
        assert!(!table.contains_user(0));
        assert!(!table.contains_item(0));
        assert_eq!(table.get(0, 1), None);
        assert_eq!(table.user_ids(), 1..=3);
        assert!(table.row(0).is_none());
    }

    #[test]
    fn test_insert_rejects_bad_records() {
        let mut table = RatingTable::new(2, 2);

        let err = table.insert(&record(3, 1, 4)).unwrap_err();
        assert!(matches!(err, DataLoadError::MissingReference { id: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::Integrity);

        let err = table.insert(&record(1, 0, 4)).unwrap_err();
        assert!(matches!(err, DataLoadError::MissingReference { id: 0, .. }));

        let err = table.insert(&record(1, 1, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(table.rating_count(), 0);
    }

    #[test]
    fn test_user_ratings_in_item_order() {
        let records = [record(1, 3, 5), record(1, 1, 2), record(2, 2, 4)];
        let table = RatingTable::from_records(2, 3, &records).unwrap();

        let rated: Vec<(ItemId, u8)> = table.user_ratings(1).map(|(i, s)| (i, s.value())).collect();
        assert_eq!(rated, vec![(1, 2), (3, 5)]);
        assert_eq!(table.user_ratings(3).count(), 0);
    }

    #[test]
    fn test_zero_filled_view() {
        let table = RatingTable::from_records(2, 2, &[record(2, 1, 4)]).unwrap();
        let zeros = table.zero_filled();

        assert_eq!(zeros.dims(), (2, 2));
        assert_eq!(zeros.value(2, 1), 4.0);
        assert_eq!(zeros.value(1, 1), 0.0);
        assert_eq!(zeros.value(0, 1), 0.0);
        assert_eq!(zeros.row(2), &[4.0, 0.0]);
        // the absent-aware table still knows the difference
        assert_eq!(table.get(1, 1), None);
    }
}
