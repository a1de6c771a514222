//! This module manages the links between media items and tags.
//!
//! Every link creation or removal goes through [link] or [unlink], which keep the denormalized counters in step
//! with the `media_tags` table: the tag's `usage_count`, and the item's `tag_count` plus the per-category count
//! for the tag's category.

use {
    crate::{
        catalog,
        error::{Error, Result},
        media::require_media,
    },
    mediatag_shared::{Action, Patch, Tag, TagCategory, TagSpec},
    sqlx::SqliteConnection,
    std::collections::{HashMap, HashSet},
    tracing::{debug, info},
};

/// Return the name of the per-category counter column in the `media` table.
fn count_column(category: TagCategory) -> &'static str {
    match category {
        TagCategory::General => "tag_count_general",
        TagCategory::Artist => "tag_count_artist",
        TagCategory::Copyright => "tag_count_copyright",
        TagCategory::Character => "tag_count_character",
        TagCategory::Metadata => "tag_count_metadata",
    }
}

async fn adjust_counts(
    conn: &mut SqliteConnection,
    media_id: i64,
    tag: &Tag,
    delta: i64,
) -> Result<()> {
    sqlx::query("UPDATE tags SET usage_count = usage_count + ?2 WHERE id = ?1")
        .bind(tag.id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

    let column = count_column(tag.category);

    sqlx::query(&format!(
        "UPDATE media SET tag_count = tag_count + ?2, {column} = {column} + ?2, updated_at = ?3 WHERE id = ?1"
    ))
    .bind(media_id)
    .bind(delta)
    .bind(crate::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Attach `tag` to the specified item, returning false if it was already attached.
async fn link(conn: &mut SqliteConnection, media_id: i64, tag: &Tag) -> Result<bool> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO media_tags (media_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(media_id)
    .bind(tag.id)
    .bind(crate::now())
    .execute(&mut *conn)
    .await?
    .rows_affected()
        == 1;

    if inserted {
        adjust_counts(conn, media_id, tag, 1).await?;

        debug!(media_id, tag = %tag.name, "linked");
    }

    Ok(inserted)
}

/// Detach `tag` from the specified item, failing with `Error::NotFound` if it is not attached.
pub(crate) async fn unlink(conn: &mut SqliteConnection, media_id: i64, tag: &Tag) -> Result<()> {
    let removed = sqlx::query("DELETE FROM media_tags WHERE media_id = ?1 AND tag_id = ?2")
        .bind(media_id)
        .bind(tag.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if removed == 0 {
        return Err(Error::not_found(format!(
            "tag '{}' on media {media_id}",
            tag.name
        )));
    }

    adjust_counts(conn, media_id, tag, -1).await?;

    debug!(media_id, tag = %tag.name, "unlinked");

    Ok(())
}

async fn attach(conn: &mut SqliteConnection, media_id: i64, spec: &TagSpec) -> Result<bool> {
    let tag = catalog::get_or_create(conn, &spec.name, spec.category).await?;

    link(conn, media_id, &tag).await
}

/// Return the tags attached to the specified item, ordered by category and then name.
pub async fn tags_for_media(conn: &mut SqliteConnection, media_id: i64) -> Result<Vec<Tag>> {
    require_media(conn, media_id).await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM media_tags mt JOIN tags t ON t.id = mt.tag_id \
         WHERE mt.media_id = ?1 \
         ORDER BY t.category, t.name",
        catalog::TAG_COLUMNS
    ))
    .bind(media_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(catalog::tag_from_row)
        .collect::<Result<_, sqlx::Error>>()?)
}

/// Attach each of `specs` to the specified item, creating tags as needed.
///
/// Tags which are already attached are skipped, so repeating a call changes nothing.  Returns the number of new
/// links.
pub async fn add_tags_to_media(
    conn: &mut SqliteConnection,
    media_id: i64,
    specs: &[TagSpec],
) -> Result<usize> {
    let mut tx = crate::begin_write(conn).await?;

    require_media(&mut tx, media_id).await?;

    let mut added = 0;

    for spec in specs {
        if attach(&mut tx, media_id, spec).await? {
            added += 1;
        }
    }

    tx.commit().await?;

    info!(media_id, added, "added tags");

    Ok(added)
}

/// Detach the specified tag from the specified item.
pub async fn remove_tag_from_media(
    conn: &mut SqliteConnection,
    media_id: i64,
    tag_id: i64,
) -> Result<()> {
    let mut tx = crate::begin_write(conn).await?;

    require_media(&mut tx, media_id).await?;

    let tag = catalog::get_tag(&mut tx, tag_id).await?;

    unlink(&mut tx, media_id, &tag).await?;

    tx.commit().await?;

    info!(media_id, tag = %tag.name, "removed tag");

    Ok(())
}

/// Make the set of tags attached to the specified item exactly `specs`, returning the resulting set.
///
/// Names are compared case-insensitively, as the store compares them.  Tags already attached are left alone, so
/// setting the current set again changes nothing.
pub async fn set_tags(
    conn: &mut SqliteConnection,
    media_id: i64,
    specs: &[TagSpec],
) -> Result<Vec<Tag>> {
    let mut tx = crate::begin_write(conn).await?;

    let current = tags_for_media(&mut tx, media_id)
        .await?
        .into_iter()
        .map(|tag| (tag.name.to_ascii_lowercase(), tag))
        .collect::<HashMap<_, _>>();

    let mut desired = HashSet::new();
    let mut to_add = Vec::new();

    for spec in specs {
        let key = spec.name.to_ascii_lowercase();

        if desired.insert(key.clone()) && !current.contains_key(&key) {
            to_add.push(spec);
        }
    }

    let mut removed = 0;

    for (key, tag) in &current {
        if !desired.contains(key) {
            unlink(&mut tx, media_id, tag).await?;
            removed += 1;
        }
    }

    for spec in &to_add {
        attach(&mut tx, media_id, spec).await?;
    }

    let result = tags_for_media(&mut tx, media_id).await?;

    tx.commit().await?;

    info!(media_id, added = to_add.len(), removed, "set tags");

    Ok(result)
}

/// Apply a batch of tag edits, possibly spanning several items, as a single transaction.
///
/// Adding a tag which is already attached is a no-op; removing one which is not attached fails the whole batch
/// with `Error::NotFound`.
pub async fn apply_patches(conn: &mut SqliteConnection, patches: &[Patch]) -> Result<()> {
    let mut tx = crate::begin_write(conn).await?;

    for patch in patches {
        require_media(&mut tx, patch.media).await?;

        match patch.action {
            Action::Add => {
                attach(&mut tx, patch.media, &patch.tag).await?;
            }

            Action::Remove => {
                let tag = catalog::get_tag_by_name(&mut tx, &patch.tag.name).await?;

                unlink(&mut tx, patch.media, &tag).await?;
            }
        }
    }

    tx.commit().await?;

    info!(count = patches.len(), "applied patches");

    Ok(())
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            media::{get_media, stats},
            test_util::{connection, new_media},
        },
        anyhow::Result,
        mediatag_shared::{parse_tag_specs, Media, TagCounts},
    };

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|tag| tag.name.as_str()).collect()
    }

    async fn link_rows(conn: &mut SqliteConnection) -> Result<Vec<(i64, i64, i64)>> {
        Ok(sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT media_id, tag_id, created_at FROM media_tags ORDER BY media_id, tag_id",
        )
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Check that the counters on every item and tag agree with the links actually stored.
    async fn assert_consistent(conn: &mut SqliteConnection, media: &[Media]) -> Result<()> {
        for item in media {
            let item = get_media(conn, item.id).await?;
            let tags = tags_for_media(conn, item.id).await?;

            let mut counts = TagCounts::default();

            for tag in &tags {
                match tag.category {
                    TagCategory::General => counts.general += 1,
                    TagCategory::Artist => counts.artist += 1,
                    TagCategory::Copyright => counts.copyright += 1,
                    TagCategory::Character => counts.character += 1,
                    TagCategory::Metadata => counts.metadata += 1,
                }
            }

            assert_eq!(item.category_tag_counts, counts);
            assert_eq!(item.tag_count, tags.len() as i64);
            assert_eq!(item.tag_count, item.category_tag_counts.total());
        }

        for tag in catalog::list_tags(conn, &Default::default()).await? {
            let links = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM media_tags WHERE tag_id = ?1")
                .bind(tag.id)
                .fetch_one(&mut *conn)
                .await?;

            assert_eq!(tag.usage_count, links, "usage count of {}", tag.name);
        }

        Ok(())
    }

    #[tokio::test]
    async fn counters() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;
        let b = new_media(&mut conn, "b").await?;

        let added = add_tags_to_media(
            &mut conn,
            a.id,
            &parse_tag_specs("cat artist:someone copyright:series ch:hero meta:highres")?,
        )
        .await?;

        assert_eq!(added, 5);

        add_tags_to_media(&mut conn, b.id, &parse_tag_specs("cat dog")?).await?;

        let item = get_media(&mut conn, a.id).await?;

        assert_eq!(item.tag_count, 5);
        assert_eq!(
            item.category_tag_counts,
            TagCounts {
                general: 1,
                artist: 1,
                copyright: 1,
                character: 1,
                metadata: 1,
            }
        );
        assert_eq!(catalog::get_tag_by_name(&mut conn, "cat").await?.usage_count, 2);

        assert_consistent(&mut conn, &[a.clone(), b.clone()]).await?;

        let cat = catalog::get_tag_by_name(&mut conn, "cat").await?;

        remove_tag_from_media(&mut conn, a.id, cat.id).await?;

        assert_eq!(catalog::get_tag_by_name(&mut conn, "cat").await?.usage_count, 1);
        assert_eq!(get_media(&mut conn, a.id).await?.category_tag_counts.general, 0);

        assert_consistent(&mut conn, &[a, b]).await?;

        Ok(())
    }

    #[tokio::test]
    async fn idempotent_add() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;

        let specs = parse_tag_specs("cat artist:someone")?;

        assert_eq!(add_tags_to_media(&mut conn, a.id, &specs).await?, 2);
        assert_eq!(add_tags_to_media(&mut conn, a.id, &specs).await?, 0);
        assert_eq!(
            add_tags_to_media(&mut conn, a.id, &parse_tag_specs("CAT cat")?).await?,
            0
        );

        let item = get_media(&mut conn, a.id).await?;

        assert_eq!(item.tag_count, 2);
        assert_eq!(catalog::get_tag_by_name(&mut conn, "cat").await?.usage_count, 1);
        assert_eq!(stats(&mut conn).await?.links, 2);

        Ok(())
    }

    #[tokio::test]
    async fn existing_category_wins() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;
        let b = new_media(&mut conn, "b").await?;

        add_tags_to_media(&mut conn, a.id, &parse_tag_specs("artist:someone")?).await?;
        add_tags_to_media(&mut conn, b.id, &parse_tag_specs("someone")?).await?;

        let b = get_media(&mut conn, b.id).await?;

        assert_eq!(b.category_tag_counts.artist, 1);
        assert_eq!(b.category_tag_counts.general, 0);

        Ok(())
    }

    #[tokio::test]
    async fn remove_missing_link() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;
        let b = new_media(&mut conn, "b").await?;

        add_tags_to_media(&mut conn, b.id, &parse_tag_specs("cat")?).await?;

        let cat = catalog::get_tag_by_name(&mut conn, "cat").await?;

        assert!(matches!(
            remove_tag_from_media(&mut conn, a.id, cat.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            remove_tag_from_media(&mut conn, a.id, 999).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            remove_tag_from_media(&mut conn, 999, cat.id).await,
            Err(Error::NotFound(_))
        ));

        assert_eq!(catalog::get_tag_by_name(&mut conn, "cat").await?.usage_count, 1);
        assert_eq!(get_media(&mut conn, a.id).await?.tag_count, 0);

        assert_consistent(&mut conn, &[a, b]).await?;

        Ok(())
    }

    #[tokio::test]
    async fn missing_media() -> Result<()> {
        let mut conn = connection().await?;

        assert!(matches!(
            add_tags_to_media(&mut conn, 1, &parse_tag_specs("cat")?).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(tags_for_media(&mut conn, 1).await, Err(Error::NotFound(_))));
        assert!(matches!(set_tags(&mut conn, 1, &[]).await, Err(Error::NotFound(_))));

        // The failed add must not leave a tag behind.
        assert!(catalog::find_tag(&mut conn, "cat").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn ordering() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;

        add_tags_to_media(
            &mut conn,
            a.id,
            &parse_tag_specs("zebra apple meta:tagme artist:bob artist:alice")?,
        )
        .await?;

        assert_eq!(
            names(&tags_for_media(&mut conn, a.id).await?),
            vec!["apple", "zebra", "alice", "bob", "tagme"]
        );

        Ok(())
    }

    #[tokio::test]
    async fn set_exact() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;

        add_tags_to_media(&mut conn, a.id, &parse_tag_specs("cat dog artist:someone")?).await?;

        let tags = set_tags(&mut conn, a.id, &parse_tag_specs("dog bird artist:someone")?).await?;

        assert_eq!(names(&tags), vec!["bird", "dog", "someone"]);
        assert_eq!(catalog::get_tag_by_name(&mut conn, "cat").await?.usage_count, 0);

        let tags = set_tags(&mut conn, a.id, &[]).await?;

        assert!(tags.is_empty());
        assert_eq!(get_media(&mut conn, a.id).await?.tag_count, 0);

        assert_consistent(&mut conn, &[a]).await?;

        Ok(())
    }

    #[tokio::test]
    async fn set_same_is_noop() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;

        add_tags_to_media(&mut conn, a.id, &parse_tag_specs("cat artist:someone")?).await?;

        let before = get_media(&mut conn, a.id).await?;
        let before_links = link_rows(&mut conn).await?;

        let tags = set_tags(&mut conn, a.id, &parse_tag_specs("SOMEONE cat cat")?).await?;

        assert_eq!(names(&tags), vec!["cat", "someone"]);
        assert_eq!(get_media(&mut conn, a.id).await?, before);
        assert_eq!(link_rows(&mut conn).await?, before_links);

        Ok(())
    }

    #[tokio::test]
    async fn patches() -> Result<()> {
        let mut conn = connection().await?;

        let a = new_media(&mut conn, "a").await?;
        let b = new_media(&mut conn, "b").await?;

        let patch = |media: &Media, tag: &str, action| -> Result<Patch> {
            Ok(Patch {
                media: media.id,
                tag: tag.parse()?,
                action,
            })
        };

        apply_patches(
            &mut conn,
            &[
                patch(&a, "cat", Action::Add)?,
                patch(&b, "cat", Action::Add)?,
                patch(&a, "artist:someone", Action::Add)?,
                patch(&a, "cat", Action::Add)?,
            ],
        )
        .await?;

        assert_eq!(names(&tags_for_media(&mut conn, a.id).await?), vec!["cat", "someone"]);

        apply_patches(&mut conn, &[patch(&a, "cat", Action::Remove)?]).await?;

        assert_eq!(names(&tags_for_media(&mut conn, a.id).await?), vec!["someone"]);

        // A failing patch rolls back the whole batch.
        assert!(matches!(
            apply_patches(
                &mut conn,
                &[
                    patch(&b, "dog", Action::Add)?,
                    patch(&a, "cat", Action::Remove)?,
                ],
            )
            .await,
            Err(Error::NotFound(_))
        ));

        assert_eq!(names(&tags_for_media(&mut conn, b.id).await?), vec!["cat"]);
        assert!(catalog::find_tag(&mut conn, "dog").await?.is_none());

        assert_consistent(&mut conn, &[a, b]).await?;

        Ok(())
    }
}
