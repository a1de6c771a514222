//! This module provides [TagSpec], the (name, category) pair users supply when attaching tags to media items,
//! along with the textual syntax for it, e.g. "artist:someone sunset copyright:some_series".

use {
    crate::TagCategory,
    anyhow::{anyhow, Error, Result},
    serde::{Deserializer, Serializer},
    std::{
        fmt::{self, Display},
        str::FromStr,
    },
};

/// Characters which may not appear at the start or end of a tag name, since they would be read as search
/// modifiers or category separators
const RESTRICTED: &[char] = &['-', '~', ':', '*', '/'];

/// A tag to be attached to a media item, identified by name
///
/// The category only takes effect if a tag with this name (compared case-insensitively) does not exist yet.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Clone, Hash)]
pub struct TagSpec {
    pub name: String,
    pub category: TagCategory,
}

impl TagSpec {
    pub fn new(name: impl Into<String>, category: TagCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }

    pub fn general(name: impl Into<String>) -> Self {
        Self::new(name, TagCategory::General)
    }
}

/// Check that `name` is usable as a tag name: non-empty, free of whitespace, and neither starting nor ending with
/// one of `- ~ : * /`.
pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("tag name must not be empty"));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(anyhow!("tag '{name}' must not contain whitespace"));
    }

    for c in RESTRICTED {
        if name.starts_with(*c) {
            return Err(anyhow!("tag '{name}' cannot start with '{c}'"));
        }

        if name.ends_with(*c) {
            return Err(anyhow!("tag '{name}' cannot end with '{c}'"));
        }
    }

    Ok(())
}

impl FromStr for TagSpec {
    type Err = Error;

    /// Parse a `TagSpec` from a string, e.g. "sunset" or "artist:someone".
    ///
    /// Names are lower-cased.  Only the first colon separates the category, so "artist:a:b" names tag "a:b".  An
    /// unrecognized category prefix falls back to `TagCategory::General`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (category, name) = if let Some((category, name)) = s.split_once(':') {
            (TagCategory::from_alias(category), name.trim())
        } else {
            (TagCategory::General, s.as_str())
        };

        validate_tag_name(name)?;

        Ok(TagSpec::new(name, category))
    }
}

impl Display for TagSpec {
    /// Convert a `TagSpec` to a string, e.g. "sunset" or "artist:someone".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category == TagCategory::General {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.category, self.name)
        }
    }
}

impl<'de> serde::Deserialize<'de> for TagSpec {
    /// Deserialize a `TagSpec` using `TagSpec::from_str`.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for TagSpec {
    /// Serialize a `TagSpec` using `TagSpec::fmt`.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Parse a whitespace-separated list of tags, e.g. "cat artist:someone character:hero".
///
/// Entries with a category but no name (e.g. "artist:") are skipped; any other invalid entry fails the whole
/// list.
pub fn parse_tag_specs(s: &str) -> Result<Vec<TagSpec>> {
    s.split_whitespace()
        .filter(|word| !word.ends_with(':') || word.trim_end_matches(':').contains(':'))
        .map(TagSpec::from_str)
        .collect()
}
