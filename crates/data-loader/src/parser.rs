//! Parser for MovieLens 100k data files.
//!
//! - u.info: `<n> users` / `<n> items` / `<n> ratings`
//! - u.user: userId|age|gender|occupation|zipcode
//! - u.item: itemId|title|release date|video release date|IMDb URL|19 genre flags
//! - u.data: userId itemId rating timestamp (whitespace separated)

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Number of fields on a `u.item` line: 5 descriptive + 19 genre flags
const ITEM_FIELDS: usize = 5 + 19;

/// Counts declared in `u.info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetInfo {
    pub users: usize,
    pub items: usize,
    pub ratings: usize,
}

/// Read a file as ISO-8859-1 (Latin-1) and split it into lines.
///
/// `u.item` is CP1252; every byte maps straight to a code point, which is
/// close enough for titles.
fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    let fetch_err = |source| DataLoadError::Fetch {
        path: path.display().to_string(),
        source,
    };

    let mut file = File::open(path).map_err(fetch_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(fetch_err)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();
    Ok(content.lines().map(|s| s.to_string()).collect())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn next_field<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    file: &str,
    line: usize,
    name: &str,
) -> Result<&'a str> {
    parts.next().ok_or_else(|| DataLoadError::Parse {
        file: file.to_string(),
        line,
        reason: format!("Missing {}", name),
    })
}

fn parse_field<T>(value: &str, file: &str, line: usize, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e| DataLoadError::Parse {
        file: file.to_string(),
        line,
        reason: format!("Invalid {} '{}': {}", name, value, e),
    })
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Parse the u.info file
pub fn parse_info(path: &Path) -> Result<DatasetInfo> {
    let file = file_name(path);
    let lines = read_lines_latin1(path)?;

    let mut users = None;
    let mut items = None;
    let mut ratings = None;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let mut parts = line.split_whitespace();
        let Some(count) = parts.next() else {
            continue;
        };
        let label = next_field(&mut parts, &file, line_no, "label")?;
        let count: usize = parse_field(count, &file, line_no, "count")?;

        match label {
            "users" => users = Some(count),
            "items" => items = Some(count),
            "ratings" => ratings = Some(count),
            other => {
                return Err(DataLoadError::Parse {
                    file,
                    line: line_no,
                    reason: format!("Unknown label '{}'", other),
                });
            }
        }
    }

    let missing = |what: &str| DataLoadError::Parse {
        file: file.clone(),
        line: lines.len(),
        reason: format!("Missing {} count", what),
    };

    Ok(DatasetInfo {
        users: users.ok_or_else(|| missing("users"))?,
        items: items.ok_or_else(|| missing("items"))?,
        ratings: ratings.ok_or_else(|| missing("ratings"))?,
    })
}

fn parse_gender(s: &str) -> Result<Gender> {
    match s {
        "M" => Ok(Gender::Male),
        "F" => Ok(Gender::Female),
        _ => Err(DataLoadError::InvalidValue {
            field: "gender".to_string(),
            value: s.to_string(),
        }),
    }
}

/// Parse the u.user file
pub fn parse_users(path: &Path) -> Result<Vec<User>> {
    let file = file_name(path);
    let lines = read_lines_latin1(path)?;
    let mut users = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }

        let mut parts = line_trimmed.split('|');
        let user_id = next_field(&mut parts, &file, line_no, "userId")?;
        let age = next_field(&mut parts, &file, line_no, "age")?;
        let gender = next_field(&mut parts, &file, line_no, "gender")?;
        let occupation = next_field(&mut parts, &file, line_no, "occupation")?;
        let zip_code = next_field(&mut parts, &file, line_no, "zip code")?;

        users.push(User {
            id: parse_field(user_id, &file, line_no, "userId")?,
            age: parse_field(age, &file, line_no, "age")?,
            gender: parse_gender(gender)?,
            occupation: occupation.to_string(),
            zip_code: zip_code.to_string(),
        });
    }

    Ok(users)
}

/// Parse the u.item file
///
/// The trailing 19 columns are 0/1 genre flags in [`Genre::ALL`] order.
pub fn parse_items(path: &Path) -> Result<Vec<Item>> {
    let file = file_name(path);
    let lines = read_lines_latin1(path)?;
    let mut items = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim_end_matches(['\r', '\n']);
        if line_trimmed.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line_trimmed.split('|').collect();
        if fields.len() != ITEM_FIELDS {
            return Err(DataLoadError::FieldCountMismatch {
                file,
                expected: ITEM_FIELDS,
                found: fields.len(),
                line: line_no,
            });
        }

        let genres = parse_genre_flags(&fields[5..], &file, line_no)?;

        items.push(Item {
            id: parse_field(fields[0], &file, line_no, "itemId")?,
            title: fields[1].to_string(),
            release_date: non_empty(fields[2]),
            video_release_date: non_empty(fields[3]),
            imdb_url: non_empty(fields[4]),
            genres,
        });
    }

    Ok(items)
}

fn parse_genre_flags(flags: &[&str], file: &str, line: usize) -> Result<Vec<Genre>> {
    let mut genres = Vec::new();
    for (genre, flag) in Genre::ALL.iter().zip(flags) {
        match flag.trim() {
            "1" => genres.push(*genre),
            "0" => {}
            other => {
                return Err(DataLoadError::Parse {
                    file: file.to_string(),
                    line,
                    reason: format!("Invalid flag '{}' for genre {}", other, genre.name()),
                });
            }
        }
    }
    Ok(genres)
}

/// Parse the u.data file
pub fn parse_ratings(path: &Path) -> Result<Vec<RatingRecord>> {
    let file = file_name(path);
    let lines = read_lines_latin1(path)?;
    let mut ratings = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }

        let mut parts = line_trimmed.split_whitespace();
        let user_id = next_field(&mut parts, &file, line_no, "userId")?;
        let item_id = next_field(&mut parts, &file, line_no, "itemId")?;
        let rating = next_field(&mut parts, &file, line_no, "rating")?;
        let timestamp = next_field(&mut parts, &file, line_no, "timestamp")?;

        ratings.push(RatingRecord {
            user_id: parse_field(user_id, &file, line_no, "userId")?,
            item_id: parse_field(item_id, &file, line_no, "itemId")?,
            rating: parse_field(rating, &file, line_no, "rating")?,
            timestamp: parse_field(timestamp, &file, line_no, "timestamp")?,
        });
    }

    Ok(ratings)
}
