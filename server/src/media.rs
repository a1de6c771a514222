//! This module provides storage operations for media items: creation, retrieval, partial updates, deletion, and the
//! parent/child bookkeeping which accompanies them.

use {
    crate::{
        error::{is_unique_violation, Error, Result},
        tags,
    },
    mediatag_shared::{
        CreateMedia, Media, MediaType, Rating, Stats, TagCounts, UpdateMedia,
    },
    sqlx::{sqlite::SqliteRow, Row, SqliteConnection},
    tracing::{debug, info},
};

/// Columns selected whenever a full `Media` is read, qualified by the conventional `m` alias
pub(crate) const MEDIA_COLUMNS: &str = "m.id, m.content_hash, m.file_ext, m.media_type, m.mime_type, \
     m.file_size, m.width, m.height, m.duration, m.codec, m.rating, m.is_favorite, \
     m.tag_count, m.tag_count_general, m.tag_count_artist, m.tag_count_copyright, \
     m.tag_count_character, m.tag_count_metadata, \
     m.parent_id, m.has_children, m.source_url, m.created_at, m.updated_at, m.last_viewed_at";

fn decode<T>(result: anyhow::Result<T>) -> Result<T, sqlx::Error> {
    result.map_err(|e| sqlx::Error::Decode(e.into()))
}

pub(crate) fn media_from_row(row: &SqliteRow) -> Result<Media, sqlx::Error> {
    Ok(Media {
        id: row.try_get("id")?,
        content_hash: row.try_get("content_hash")?,
        file_ext: row.try_get("file_ext")?,
        media_type: decode(row.try_get::<&str, _>("media_type")?.parse::<MediaType>())?,
        mime_type: row.try_get("mime_type")?,
        file_size: row.try_get("file_size")?,
        width: row.try_get("width")?,
        height: row.try_get("height")?,
        duration: row.try_get("duration")?,
        codec: row.try_get("codec")?,
        rating: decode(row.try_get::<&str, _>("rating")?.parse::<Rating>())?,
        is_favorite: row.try_get("is_favorite")?,
        tag_count: row.try_get("tag_count")?,
        category_tag_counts: TagCounts {
            general: row.try_get("tag_count_general")?,
            artist: row.try_get("tag_count_artist")?,
            copyright: row.try_get("tag_count_copyright")?,
            character: row.try_get("tag_count_character")?,
            metadata: row.try_get("tag_count_metadata")?,
        },
        parent_id: row.try_get("parent_id")?,
        has_children: row.try_get("has_children")?,
        source_url: row.try_get("source_url")?,
        created_at: crate::timestamp(row.try_get("created_at")?)?,
        updated_at: crate::timestamp(row.try_get("updated_at")?)?,
        last_viewed_at: row
            .try_get::<Option<i64>, _>("last_viewed_at")?
            .map(crate::timestamp)
            .transpose()?,
    })
}

/// Fail with `Error::NotFound` unless a media item with the specified `id` exists.
pub(crate) async fn require_media(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("SELECT 1 FROM media WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(drop)
        .ok_or_else(|| Error::not_found(format!("media {id}")))
}

/// Set `has_children` on the specified item.
///
/// Nothing ever clears this flag; it records that the item has had a child at some point.
async fn mark_has_children(conn: &mut SqliteConnection, parent: i64) -> Result<()> {
    sqlx::query("UPDATE media SET has_children = 1 WHERE id = ?1")
        .bind(parent)
        .execute(&mut *conn)
        .await?;

    debug!(parent, "marked media as having children");

    Ok(())
}

/// Validate a prospective parent for the item `child` (`None` for an item not created yet).
async fn check_parent(conn: &mut SqliteConnection, child: Option<i64>, parent: i64) -> Result<()> {
    if child == Some(parent) {
        return Err(Error::InvalidInput(format!(
            "media {parent} cannot be its own parent"
        )));
    }

    require_media(conn, parent).await
}

pub async fn get_media(conn: &mut SqliteConnection, id: i64) -> Result<Media> {
    let row = sqlx::query(&format!("SELECT {MEDIA_COLUMNS} FROM media m WHERE m.id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("media {id}")))?;

    Ok(media_from_row(&row)?)
}

/// Register a new media item.
///
/// Fails with `Error::ConstraintViolation` if an item with the same content hash exists, or `Error::NotFound` if
/// the requested parent does not exist.  If a parent is given, its `has_children` flag is set in the same
/// transaction.
pub async fn create_media(conn: &mut SqliteConnection, input: &CreateMedia) -> Result<Media> {
    let mut tx = crate::begin_write(conn).await?;

    if let Some(parent) = input.parent_id {
        check_parent(&mut tx, None, parent).await?;
    }

    let now = crate::now();

    let id = sqlx::query(
        "INSERT INTO media (content_hash, file_ext, media_type, mime_type, file_size, width, height, duration, \
                            codec, rating, parent_id, source_url, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
    )
    .bind(&input.content_hash)
    .bind(&input.file_ext)
    .bind(input.media_type.as_str())
    .bind(&input.mime_type)
    .bind(input.file_size)
    .bind(input.width)
    .bind(input.height)
    .bind(input.duration)
    .bind(&input.codec)
    .bind(input.rating.as_str())
    .bind(input.parent_id)
    .bind(&input.source_url)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::ConstraintViolation(format!(
                "media with content hash {} already exists",
                input.content_hash
            ))
        } else {
            Error::from(e)
        }
    })?
    .last_insert_rowid();

    if let Some(parent) = input.parent_id {
        mark_has_children(&mut tx, parent).await?;
    }

    let media = get_media(&mut tx, id).await?;

    tx.commit().await?;

    info!(id, hash = %input.content_hash, "created media");

    Ok(media)
}

/// Apply the fields present in `update` to the specified item, returning the updated item.
///
/// Setting a parent validates it (it must exist and must not be the item itself) and sets the parent's
/// `has_children` flag.  An empty update changes nothing, not even `updated_at`.
pub async fn update_media(
    conn: &mut SqliteConnection,
    id: i64,
    update: &UpdateMedia,
) -> Result<Media> {
    let mut tx = crate::begin_write(conn).await?;

    let current = get_media(&mut tx, id).await?;

    if update.is_empty() {
        return Ok(current);
    }

    if let Some(parent) = update.parent_id {
        check_parent(&mut tx, Some(id), parent).await?;
    }

    sqlx::query(
        "UPDATE media \
         SET rating = COALESCE(?2, rating), \
             is_favorite = COALESCE(?3, is_favorite), \
             parent_id = COALESCE(?4, parent_id), \
             source_url = COALESCE(?5, source_url), \
             updated_at = ?6 \
         WHERE id = ?1",
    )
    .bind(id)
    .bind(update.rating.map(Rating::as_str))
    .bind(update.is_favorite)
    .bind(update.parent_id)
    .bind(&update.source_url)
    .bind(crate::now())
    .execute(&mut *tx)
    .await?;

    if let Some(parent) = update.parent_id {
        mark_has_children(&mut tx, parent).await?;
    }

    let media = get_media(&mut tx, id).await?;

    tx.commit().await?;

    info!(id, ?update, "updated media");

    Ok(media)
}

/// Delete the specified item.
///
/// Every tag link is removed first, through the same path as an explicit untag, so tag usage counts stay
/// accurate.  Children of the item lose their parent reference; the item's own parent keeps `has_children`.
pub async fn delete_media(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let mut tx = crate::begin_write(conn).await?;

    require_media(&mut tx, id).await?;

    let linked = tags::tags_for_media(&mut tx, id).await?;

    for tag in &linked {
        tags::unlink(&mut tx, id, tag).await?;
    }

    sqlx::query("DELETE FROM media WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(id, unlinked = linked.len(), "deleted media");

    Ok(())
}

pub async fn toggle_favorite(conn: &mut SqliteConnection, id: i64) -> Result<Media> {
    let mut tx = crate::begin_write(conn).await?;

    let result = sqlx::query(
        "UPDATE media SET is_favorite = 1 - is_favorite, updated_at = ?2 WHERE id = ?1",
    )
    .bind(id)
    .bind(crate::now())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found(format!("media {id}")));
    }

    let media = get_media(&mut tx, id).await?;

    tx.commit().await?;

    Ok(media)
}

/// Record that the specified item was just viewed, appending to its view history.
pub async fn record_view(conn: &mut SqliteConnection, id: i64) -> Result<Media> {
    let mut tx = crate::begin_write(conn).await?;

    let now = crate::now();

    let result = sqlx::query("UPDATE media SET last_viewed_at = ?2, updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found(format!("media {id}")));
    }

    sqlx::query("INSERT INTO view_history (media_id, viewed_at) VALUES (?1, ?2)")
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let media = get_media(&mut tx, id).await?;

    tx.commit().await?;

    Ok(media)
}

pub async fn stats(conn: &mut SqliteConnection) -> Result<Stats> {
    let row = sqlx::query(
        "SELECT (SELECT COUNT(*) FROM media), \
                (SELECT COUNT(*) FROM tags), \
                (SELECT COUNT(*) FROM media_tags), \
                (SELECT COALESCE(SUM(file_size), 0) FROM media), \
                (SELECT COUNT(*) FROM view_history)",
    )
    .fetch_one(&mut *conn)
    .await?;

    Ok(Stats {
        media: row.try_get(0)?,
        tags: row.try_get(1)?,
        links: row.try_get(2)?,
        total_file_size: row.try_get(3)?,
        views: row.try_get(4)?,
    })
}
