//! mediatag shared (e.g. protocol) code
//!
//! This crate contains code shared between the mediatag server and its clients.  It consists of the
//! [serde](https://crates.io/crates/serde)-enabled structs and enums which describe media items, tags, and the
//! search protocol, plus the two small languages users type into a client:
//!
//! * The `query` submodule defines the search language used to find media items by tag and attribute
//! (e.g. "cat -dog /rating:s").
//!
//! * The `tag_spec` submodule defines the syntax used to add tags to an item (e.g. "artist:someone sunset").

#![deny(warnings)]

use {
    anyhow::{anyhow, Error},
    chrono::{DateTime, Utc},
    serde_derive::{Deserialize, Serialize},
    std::{
        fmt::{self, Display},
        str::FromStr,
    },
};

pub use {
    query::SearchQuery,
    tag_spec::{parse_tag_specs, validate_tag_name, TagSpec},
};

pub mod query;
pub mod tag_spec;

/// Number of items per page if the client does not specify a (positive) limit
pub const DEFAULT_LIMIT: usize = 20;

/// Content rating of a media item
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    #[default]
    Safe,
    Questionable,
    Explicit,
}

impl Rating {
    /// Return the canonical name of this rating, as stored in the database (e.g. "safe").
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Safe => "safe",
            Rating::Questionable => "questionable",
            Rating::Explicit => "explicit",
        }
    }
}

impl FromStr for Rating {
    type Err = Error;

    /// Parse a `Rating` from either its full name or its one-letter abbreviation (e.g. "safe" or "s").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "safe" | "s" => Rating::Safe,
            "questionable" | "q" => Rating::Questionable,
            "explicit" | "e" => Rating::Explicit,
            _ => return Err(anyhow!("unrecognized rating: {s}")),
        })
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the currently supported media item formats
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
        }
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            _ => return Err(anyhow!("unrecognized media type: {s}")),
        })
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The category a tag belongs to
///
/// Each media item keeps a separate count of how many tags of each category it carries.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    #[default]
    General,
    Artist,
    Copyright,
    Character,
    Metadata,
}

impl TagCategory {
    pub const ALL: [TagCategory; 5] = [
        TagCategory::General,
        TagCategory::Artist,
        TagCategory::Copyright,
        TagCategory::Character,
        TagCategory::Metadata,
    ];

    /// Return the integer code used to store this category in the database.
    pub fn code(self) -> i64 {
        match self {
            TagCategory::General => 0,
            TagCategory::Artist => 1,
            TagCategory::Copyright => 2,
            TagCategory::Character => 3,
            TagCategory::Metadata => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagCategory::General => "general",
            TagCategory::Artist => "artist",
            TagCategory::Copyright => "copyright",
            TagCategory::Character => "character",
            TagCategory::Metadata => "metadata",
        }
    }

    /// Resolve a category prefix as typed by a user (e.g. "a", "series", "char"), falling back to
    /// `TagCategory::General` for anything unrecognized.
    pub fn from_alias(alias: &str) -> Self {
        match alias.trim().to_lowercase().as_str() {
            "artist" | "a" => TagCategory::Artist,
            "copyright" | "series" => TagCategory::Copyright,
            "character" | "char" | "ch" => TagCategory::Character,
            "meta" | "metadata" => TagCategory::Metadata,
            _ => TagCategory::General,
        }
    }
}

impl TryFrom<i64> for TagCategory {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        TagCategory::ALL
            .iter()
            .copied()
            .find(|category| category.code() == code)
            .ok_or_else(|| anyhow!("unrecognized tag category code: {code}"))
    }
}

impl FromStr for TagCategory {
    type Err = Error;

    /// Parse the canonical name of a category (e.g. "artist").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| anyhow!("unrecognized tag category: {s}"))
    }
}

impl Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of tags of each category attached to a media item
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct TagCounts {
    pub general: i64,
    pub artist: i64,
    pub copyright: i64,
    pub character: i64,
    pub metadata: i64,
}

impl TagCounts {
    pub fn get(&self, category: TagCategory) -> i64 {
        match category {
            TagCategory::General => self.general,
            TagCategory::Artist => self.artist,
            TagCategory::Copyright => self.copyright,
            TagCategory::Character => self.character,
            TagCategory::Metadata => self.metadata,
        }
    }

    pub fn total(&self) -> i64 {
        TagCategory::ALL.iter().map(|&category| self.get(category)).sum()
    }
}

/// Metadata associated with a given media item
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Media {
    /// Identifier allocated in increasing order as items are created
    pub id: i64,

    /// Hash of the contents of the file
    pub content_hash: String,

    pub file_ext: String,

    pub media_type: MediaType,

    pub mime_type: String,

    /// File size in bytes
    pub file_size: i64,

    pub width: Option<i64>,

    pub height: Option<i64>,

    /// Play length in seconds, for video and audio items
    pub duration: Option<f64>,

    pub codec: Option<String>,

    pub rating: Rating,

    pub is_favorite: bool,

    /// Total number of tags attached to this item
    ///
    /// This always equals `category_tag_counts.total()`.
    pub tag_count: i64,

    pub category_tag_counts: TagCounts,

    pub parent_id: Option<i64>,

    /// Whether any item has ever named this one as its parent
    ///
    /// Once set, this is never cleared, even if every child is later deleted or re-parented.
    pub has_children: bool,

    pub source_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_viewed_at: Option<DateTime<Utc>>,
}

/// A tag used to organize media items
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct Tag {
    pub id: i64,

    /// Name of the tag, unique under case-insensitive comparison
    pub name: String,

    pub category: TagCategory,

    /// Number of media items this tag is currently attached to
    pub usage_count: i64,

    pub created_at: DateTime<Utc>,
}

/// Represents the body of a POST /media request, which registers a new media item
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateMedia {
    pub content_hash: String,
    pub file_ext: String,
    pub media_type: MediaType,
    pub mime_type: String,
    pub file_size: i64,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Represents the body of a PATCH /media/{id} request
///
/// Fields which are `None` are left unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct UpdateMedia {
    pub rating: Option<Rating>,
    pub is_favorite: Option<bool>,
    pub parent_id: Option<i64>,
    pub source_url: Option<String>,
}

impl UpdateMedia {
    pub fn is_empty(&self) -> bool {
        self.rating.is_none()
            && self.is_favorite.is_none()
            && self.parent_id.is_none()
            && self.source_url.is_none()
    }
}

/// Represents the kind of edit operation to be applied to the set of tags for a media item
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Add a tag to the item
    Add,

    /// Remove a tag from the item
    Remove,
}

/// Represents an edit operation to be applied to the set of tags for a media item
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Patch {
    /// Id of the item whose tag set is to be edited
    pub media: i64,

    /// Tag to add or remove
    ///
    /// The category is only consulted when adding a tag which does not exist yet.
    pub tag: TagSpec,

    /// Whether to add or remove the tag
    pub action: Action,
}

/// Represents a query string included in a GET /media request
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct MediaQuery {
    /// Search expression, e.g. "cat -dog /rating:s"
    pub query: Option<String>,

    /// Maximum number of items requested
    pub limit: Option<i64>,

    /// Number of matching items to skip (ignored if `before` or `after` is specified)
    pub offset: Option<i64>,

    /// Return items strictly older than the item with this id
    pub before: Option<i64>,

    /// Return items strictly newer than the item with this id (ignored if `before` is specified)
    pub after: Option<i64>,
}

impl From<&MediaQuery> for SearchQuery {
    fn from(query: &MediaQuery) -> Self {
        SearchQuery {
            limit: query.limit,
            offset: query.offset,
            before_id: query.before,
            after_id: query.after,
            ..query::parse(query.query.as_deref().unwrap_or(""))
        }
    }
}

/// Represents a query string included in a GET /tags request
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct TagsQuery {
    /// Only return tags whose names start with this prefix (case-insensitively)
    pub prefix: Option<String>,

    /// Only return tags in this category
    pub category: Option<TagCategory>,

    /// Maximum number of tags requested
    pub limit: Option<i64>,
}

/// Represents the response to a GET /media request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SearchResult {
    /// The page of matching items, most recent first
    pub media: Vec<Media>,

    /// Total number of items matching the query, ignoring pagination
    pub total: i64,

    /// Id of the first item on this page, usable as an `after` cursor to page backward
    pub first_id: Option<i64>,

    /// Id of the last item on this page, usable as a `before` cursor to page forward
    pub last_id: Option<i64>,

    /// Whether more items exist beyond this page in the direction it was fetched
    pub has_more: bool,
}

/// Order in which the rows of a page were fetched from the store
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    /// Most recent first (the first page, offset pages, and `before` cursors)
    Older,

    /// Least recent first (`after` cursors); the page is reversed when built
    Newer,
}

/// Assembles a `SearchResult` from a window of rows fetched with one more row than the page limit
///
/// The extra row is never returned; its presence is what tells us there is more to fetch.
pub struct SearchResultBuilder {
    limit: usize,
    direction: Direction,
    media: Vec<Media>,
    has_more: bool,
}

impl SearchResultBuilder {
    pub fn new(limit: usize, direction: Direction) -> Self {
        Self {
            limit,
            direction,
            media: Vec::new(),
            has_more: false,
        }
    }

    pub fn consider(&mut self, media: Media) {
        if self.media.len() < self.limit {
            self.media.push(media);
        } else {
            self.has_more = true;
        }
    }

    pub fn build(mut self, total: i64) -> SearchResult {
        if self.direction == Direction::Newer {
            self.media.reverse();
        }

        SearchResult {
            first_id: self.media.first().map(|media| media.id),
            last_id: self.media.last().map(|media| media.id),
            has_more: self.has_more,
            total,
            media: self.media,
        }
    }
}

/// Represents the response to a GET /stats request
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Default)]
pub struct Stats {
    pub media: i64,
    pub tags: i64,
    pub links: i64,
    pub total_file_size: i64,

    /// Number of recorded views across all items
    pub views: i64,
}
