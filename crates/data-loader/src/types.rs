//! Core domain types for the MovieLens 100k dataset.
//!
//! Users and items are addressed by 1-based ids. The [`Registry`] holds the
//! descriptive records for both, and is only consulted by presentation code;
//! the prediction engine works purely off the [`RatingTable`](crate::RatingTable).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user (1..=943 in MovieLens 100k)
pub type UserId = u32;

/// Unique identifier for an item (1..=1682 in MovieLens 100k)
pub type ItemId = u32;

// =============================================================================
// User-related Types
// =============================================================================

/// Represents a user in the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub age: u8,
    pub gender: Gender,
    /// Free-text occupation as it appears in `u.user` (e.g. "technician")
    pub occupation: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id:         {}", self.id)?;
        writeln!(f, "age:        {}", self.age)?;
        writeln!(f, "gender:     {}", self.gender.code())?;
        writeln!(f, "occupation: {}", self.occupation)?;
        write!(f, "zip code:   {}", self.zip_code)
    }
}

// =============================================================================
// Item-related Types
// =============================================================================

/// Represents a movie item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    /// Release date as written in the dataset (e.g. "01-Jan-1995")
    pub release_date: Option<String>,
    pub video_release_date: Option<String>,
    pub imdb_url: Option<String>,
    pub genres: Vec<Genre>,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let genres = self
            .genres
            .iter()
            .map(|g| g.name())
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(f, "id:                 {}", self.id)?;
        writeln!(f, "Title:              {}", self.title)?;
        writeln!(f, "Release Date:       {}", self.release_date.as_deref().unwrap_or(""))?;
        writeln!(f, "Video release Date: {}", self.video_release_date.as_deref().unwrap_or(""))?;
        writeln!(f, "IMDb URL:           {}", self.imdb_url.as_deref().unwrap_or(""))?;
        write!(f, "Genres:             [{}]", genres)
    }
}

/// The 19 genre flags carried by every line of `u.item`, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Unknown,
    Action,
    Adventure,
    Animation,
    Children,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Fantasy,
    FilmNoir,
    Horror,
    Musical,
    Mystery,
    Romance,
    SciFi,
    Thriller,
    War,
    Western,
}

impl Genre {
    /// Genre columns in the order they appear in `u.item`
    pub const ALL: [Genre; 19] = [
        Genre::Unknown,
        Genre::Action,
        Genre::Adventure,
        Genre::Animation,
        Genre::Children,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Fantasy,
        Genre::FilmNoir,
        Genre::Horror,
        Genre::Musical,
        Genre::Mystery,
        Genre::Romance,
        Genre::SciFi,
        Genre::Thriller,
        Genre::War,
        Genre::Western,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Genre::Unknown => "unknown",
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Children => "Children's",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Fantasy => "Fantasy",
            Genre::FilmNoir => "Film-Noir",
            Genre::Horror => "Horror",
            Genre::Musical => "Musical",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::SciFi => "Sci-Fi",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }
}

// =============================================================================
// Rating Record
// =============================================================================

/// One line of `u.data` before it is placed into the rating table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Raw value as read; validated into a [`Score`](crate::Score) on insert
    pub rating: u8,
    /// Unix timestamp when the rating was made
    pub timestamp: i64,
}

// =============================================================================
// Registry
// =============================================================================

/// Lookup of descriptive user and item attributes by id.
///
/// Not consumed by the prediction formula, only by whatever presents results.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) items: HashMap<ItemId, Item>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_item(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    /// Case-insensitive substring search over item titles, sorted by id
    pub fn search_items(&self, query: &str) -> Vec<&Item> {
        let needle = query.to_lowercase();
        let mut found: Vec<&Item> = self
            .items
            .values()
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .collect();
        found.sort_by_key(|item| item.id);
        found
    }

    /// (users, items)
    pub fn counts(&self) -> (usize, usize) {
        (self.users.len(), self.items.len())
    }
}
