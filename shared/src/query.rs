//! This module provides [SearchQuery] and the parser for the search language users type to find media items.
//!
//! A query is a sequence of whitespace-delimited words:
//!
//! * `word`: the item must have tag `word`
//! * `-word`: the item must not have tag `word`
//! * `~word`: optional tag (recorded, but does not currently affect results)
//! * `*word`: wildcard tag (recorded, but does not currently affect results)
//! * `/key:value`: attribute filter, e.g. `/rating:s`, `/type:video`, `/minwidth:1920`, `/parent:none`
//!
//! Parsing never fails.  Words which cannot be interpreted (unknown filter keys, malformed values, a bare `-`)
//! are dropped.

use {
    crate::{MediaType, Rating},
    chrono::{DateTime, Utc},
    serde_derive::{Deserialize, Serialize},
    std::{convert::Infallible, str::FromStr},
};

/// Structured form of a search, as produced by [parse] or built directly by a caller
#[derive(Serialize, Deserialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(default)]
pub struct SearchQuery {
    /// Tags every matching item must have
    pub include: Vec<String>,

    /// Tags no matching item may have
    pub exclude: Vec<String>,

    /// Tags the user marked as optional
    ///
    /// These are parsed and preserved, but have no effect on which items match or how they are ordered.
    pub optional: Vec<String>,

    /// Tags the user marked as wildcard patterns
    ///
    /// These are parsed and preserved, but are not compiled into any filter.
    pub wildcard: Vec<String>,

    pub favorite: Option<bool>,

    /// Matching items must have one of these ratings (any rating if empty)
    pub ratings: Vec<Rating>,

    /// Matching items must have one of these types (any type if empty)
    pub media_types: Vec<MediaType>,

    pub min_width: Option<i64>,
    pub max_width: Option<i64>,
    pub min_height: Option<i64>,
    pub max_height: Option<i64>,
    pub min_file_size: Option<i64>,
    pub max_file_size: Option<i64>,

    /// Whether matching items must (or must not) have a parent
    pub has_parent: Option<bool>,

    /// Matching items must be children of this item
    pub parent_id: Option<i64>,

    pub has_children: Option<bool>,

    /// Inclusive lower bound on creation time
    pub created_after: Option<DateTime<Utc>>,

    /// Inclusive upper bound on creation time
    pub created_before: Option<DateTime<Utc>>,

    /// Page size; the server default is used if this is `None` or not positive
    pub limit: Option<i64>,

    /// Number of matching items to skip when no cursor is given
    pub offset: Option<i64>,

    /// Cursor: return items strictly older than this id
    pub before_id: Option<i64>,

    /// Cursor: return items strictly newer than this id (ignored if `before_id` is set)
    pub after_id: Option<i64>,
}

impl FromStr for SearchQuery {
    type Err = Infallible;

    /// Parse a `SearchQuery` from a string, e.g. "cat -dog /rating:s".  See [parse].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse(s))
    }
}

fn is_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn push_tag(tags: &mut Vec<String>, tag: &str) {
    if !tag.is_empty() {
        tags.push(tag.to_owned());
    }
}

/// Interpret the body of a `/key:value` word, updating `query` in place.
///
/// Repeating a scalar filter overwrites the earlier value; `rating` and `type` accumulate.
fn apply_filter(query: &mut SearchQuery, filter: &str) {
    let (key, value) = filter.split_once(':').unwrap_or((filter, ""));

    let int = || value.parse::<i64>().ok();

    match key {
        "favorite" => match value {
            "true" => query.favorite = Some(true),
            "false" => query.favorite = Some(false),
            _ => (),
        },
        "rating" => {
            if let Ok(rating) = value.parse() {
                query.ratings.push(rating);
            }
        }
        "type" => {
            if let Ok(media_type) = value.parse() {
                query.media_types.push(media_type);
            }
        }
        "minwidth" => query.min_width = int().or(query.min_width),
        "maxwidth" => query.max_width = int().or(query.max_width),
        "minheight" => query.min_height = int().or(query.min_height),
        "maxheight" => query.max_height = int().or(query.max_height),
        "minfilesize" => query.min_file_size = int().or(query.min_file_size),
        "maxfilesize" => query.max_file_size = int().or(query.max_file_size),
        "parent" => match value {
            "none" | "false" => {
                query.has_parent = Some(false);
                query.parent_id = None;
            }
            "any" | "true" => {
                query.has_parent = Some(true);
                query.parent_id = None;
            }
            _ => {
                if let Some(id) = int() {
                    query.has_parent = Some(true);
                    query.parent_id = Some(id);
                }
            }
        },
        _ => (),
    }
}

/// Parse the search language described in the module documentation.
///
/// Tag text is returned exactly as typed; case-insensitive matching happens when the query is executed.
pub fn parse(query: &str) -> SearchQuery {
    let mut result = SearchQuery::default();

    for word in query.split(is_delimiter).filter(|word| !word.is_empty()) {
        let mut chars = word.chars();

        match chars.next() {
            Some('-') => push_tag(&mut result.exclude, chars.as_str()),
            Some('~') => push_tag(&mut result.optional, chars.as_str()),
            Some('*') => push_tag(&mut result.wildcard, chars.as_str()),
            Some('/') => apply_filter(&mut result, chars.as_str()),
            _ => push_tag(&mut result.include, word),
        }
    }

    result
}
