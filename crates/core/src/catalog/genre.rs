//! Mapping of free-text catalog categories onto a closed set of genres.
//!
//! Catalogs send hierarchies such as `Fiction>Mystery>Noir` or
//! `국내도서>소설/시/희곡>한국소설`. Segments are checked from the most
//! specific one back to the root; the first segment containing a known
//! keyword decides the genre.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Genre tag of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Novel,
    Mystery,
    ScienceFiction,
    Fantasy,
    Romance,
    Poetry,
    Essay,
    Humanities,
    History,
    Science,
    SelfHelp,
    Business,
    Art,
    Children,
    Comics,
    #[default]
    Other,
}

/// Keyword table, checked in order.
///
/// Longer phrases come before the words they contain ("science fiction"
/// before "fiction" and "science").
const KEYWORDS: &[(&str, Genre)] = &[
    ("science fiction", Genre::ScienceFiction),
    ("sci-fi", Genre::ScienceFiction),
    ("sf", Genre::ScienceFiction),
    ("과학소설", Genre::ScienceFiction),
    ("fantasy", Genre::Fantasy),
    ("판타지", Genre::Fantasy),
    ("mystery", Genre::Mystery),
    ("thriller", Genre::Mystery),
    ("crime", Genre::Mystery),
    ("추리", Genre::Mystery),
    ("미스터리", Genre::Mystery),
    ("romance", Genre::Romance),
    ("로맨스", Genre::Romance),
    ("comic", Genre::Comics),
    ("graphic novel", Genre::Comics),
    ("manga", Genre::Comics),
    ("만화", Genre::Comics),
    ("poetry", Genre::Poetry),
    ("poem", Genre::Poetry),
    ("시집", Genre::Poetry),
    ("essay", Genre::Essay),
    ("에세이", Genre::Essay),
    ("수필", Genre::Essay),
    ("children", Genre::Children),
    ("juvenile", Genre::Children),
    ("어린이", Genre::Children),
    ("유아", Genre::Children),
    ("self-help", Genre::SelfHelp),
    ("self help", Genre::SelfHelp),
    ("자기계발", Genre::SelfHelp),
    ("business", Genre::Business),
    ("economics", Genre::Business),
    ("경제경영", Genre::Business),
    ("경제", Genre::Business),
    ("history", Genre::History),
    ("역사", Genre::History),
    ("science", Genre::Science),
    ("과학", Genre::Science),
    ("humanities", Genre::Humanities),
    ("philosophy", Genre::Humanities),
    ("인문", Genre::Humanities),
    ("철학", Genre::Humanities),
    ("art", Genre::Art),
    ("music", Genre::Art),
    ("예술", Genre::Art),
    ("fiction", Genre::Novel),
    ("novel", Genre::Novel),
    ("소설", Genre::Novel),
];

/// Classify a category string. Never fails; unknown text is [`Genre::Other`].
pub fn classify(category_text: &str) -> Genre {
    category_text
        .split(['>', '/'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .rev()
        .find_map(match_segment)
        .unwrap_or(Genre::Other)
}

fn match_segment(segment: &str) -> Option<Genre> {
    let segment = segment.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| contains_keyword(&segment, keyword))
        .map(|(_, genre)| *genre)
}

/// ASCII keywords must match whole words ("art" is not in "party");
/// Hangul keywords match anywhere since words compound freely.
fn contains_keyword(segment: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return segment.contains(keyword);
    }
    segment.match_indices(keyword).any(|(start, matched)| {
        let before = segment[..start].chars().next_back();
        let after = segment[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

impl Genre {
    /// Stable identifier, used when genres are stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Novel => "novel",
            Genre::Mystery => "mystery",
            Genre::ScienceFiction => "science_fiction",
            Genre::Fantasy => "fantasy",
            Genre::Romance => "romance",
            Genre::Poetry => "poetry",
            Genre::Essay => "essay",
            Genre::Humanities => "humanities",
            Genre::History => "history",
            Genre::Science => "science",
            Genre::SelfHelp => "self_help",
            Genre::Business => "business",
            Genre::Art => "art",
            Genre::Children => "children",
            Genre::Comics => "comics",
            Genre::Other => "other",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "novel" => Ok(Genre::Novel),
            "mystery" => Ok(Genre::Mystery),
            "science_fiction" => Ok(Genre::ScienceFiction),
            "fantasy" => Ok(Genre::Fantasy),
            "romance" => Ok(Genre::Romance),
            "poetry" => Ok(Genre::Poetry),
            "essay" => Ok(Genre::Essay),
            "humanities" => Ok(Genre::Humanities),
            "history" => Ok(Genre::History),
            "science" => Ok(Genre::Science),
            "self_help" => Ok(Genre::SelfHelp),
            "business" => Ok(Genre::Business),
            "art" => Ok(Genre::Art),
            "children" => Ok(Genre::Children),
            "comics" => Ok(Genre::Comics),
            "other" => Ok(Genre::Other),
            _ => Err(format!("Unknown genre: {}", s)),
        }
    }
}
