//! This module provides the tag catalog: lookup, get-or-create, listing, and deletion of tags.

use {
    crate::{
        error::{Error, Result},
        tags,
    },
    mediatag_shared::{validate_tag_name, Tag, TagCategory, TagsQuery},
    sqlx::{sqlite::SqliteRow, Row, SqliteConnection},
    tracing::{debug, info},
};

/// Number of tags returned by `list_tags` if the caller does not specify a (positive) limit
pub const DEFAULT_TAG_LIMIT: i64 = 100;

pub(crate) const TAG_COLUMNS: &str = "t.id, t.name, t.category, t.usage_count, t.created_at";

pub(crate) fn tag_from_row(row: &SqliteRow) -> Result<Tag, sqlx::Error> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: TagCategory::try_from(row.try_get::<i64, _>("category")?)
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        usage_count: row.try_get("usage_count")?,
        created_at: crate::timestamp(row.try_get("created_at")?)?,
    })
}

pub async fn get_tag(conn: &mut SqliteConnection, id: i64) -> Result<Tag> {
    let row = sqlx::query(&format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("tag {id}")))?;

    Ok(tag_from_row(&row)?)
}

/// Look up a tag by name, ignoring case.
pub async fn find_tag(conn: &mut SqliteConnection, name: &str) -> Result<Option<Tag>> {
    sqlx::query(&format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.name = ?1"))
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| tag_from_row(&row))
        .transpose()
        .map_err(Error::from)
}

pub async fn get_tag_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
    find_tag(conn, name)
        .await?
        .ok_or_else(|| Error::not_found(format!("tag '{name}'")))
}

async fn insert_tag(conn: &mut SqliteConnection, name: &str, category: TagCategory) -> Result<Tag> {
    let now = crate::now();

    let id = sqlx::query("INSERT INTO tags (name, category, created_at) VALUES (?1, ?2, ?3)")
        .bind(name)
        .bind(category.code())
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    info!(id, name, %category, "created tag");

    Ok(Tag {
        id,
        name: name.to_owned(),
        category,
        usage_count: 0,
        created_at: crate::timestamp(now)?,
    })
}

/// Insert a new tag, or, if a concurrent writer created one with the same name first, return that one.
///
/// Only a single re-read is attempted.
pub(crate) async fn insert_or_reread(
    conn: &mut SqliteConnection,
    name: &str,
    category: TagCategory,
) -> Result<Tag> {
    match insert_tag(conn, name, category).await {
        Err(Error::ConstraintViolation(message)) => {
            debug!(name, "tag was created concurrently; reading it back");

            find_tag(conn, name)
                .await?
                .ok_or(Error::ConstraintViolation(message))
        }

        result => result,
    }
}

/// Return the tag named `name` (compared case-insensitively), creating it with the specified category if it does
/// not exist.
///
/// The category of an existing tag is never changed.  Fails with `Error::InvalidInput` if `name` is not a valid
/// tag name.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    name: &str,
    category: TagCategory,
) -> Result<Tag> {
    validate_tag_name(name).map_err(|e| Error::InvalidInput(e.to_string()))?;

    if let Some(tag) = find_tag(conn, name).await? {
        return Ok(tag);
    }

    insert_or_reread(conn, name, category).await
}

/// Delete a tag, first detaching it from every media item it is attached to.
pub async fn delete_tag(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let mut tx = crate::begin_write(conn).await?;

    let tag = get_tag(&mut tx, id).await?;

    let media = sqlx::query_scalar::<_, i64>("SELECT media_id FROM media_tags WHERE tag_id = ?1")
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

    for &media_id in &media {
        tags::unlink(&mut tx, media_id, &tag).await?;
    }

    sqlx::query("DELETE FROM tags WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(id, name = %tag.name, unlinked = media.len(), "deleted tag");

    Ok(())
}

/// Escape `LIKE` metacharacters in `prefix` and append a trailing wildcard.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);

    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }

    pattern.push('%');
    pattern
}

/// List tags, most used first, optionally restricted to a name prefix and/or a category.
pub async fn list_tags(conn: &mut SqliteConnection, query: &TagsQuery) -> Result<Vec<Tag>> {
    let rows = sqlx::query(&format!(
        "SELECT {TAG_COLUMNS} FROM tags t \
         WHERE (?1 IS NULL OR t.name LIKE ?1 ESCAPE '\\') \
         AND (?2 IS NULL OR t.category = ?2) \
         ORDER BY t.usage_count DESC, t.name \
         LIMIT ?3"
    ))
    .bind(query.prefix.as_deref().map(like_prefix))
    .bind(query.category.map(TagCategory::code))
    .bind(query.limit.filter(|&limit| limit > 0).unwrap_or(DEFAULT_TAG_LIMIT))
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(tag_from_row)
        .collect::<Result<_, sqlx::Error>>()?)
}
