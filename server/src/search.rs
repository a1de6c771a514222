//! This module compiles a [SearchQuery] into parameterized SQL and runs it.
//!
//! Each condition becomes a [Predicate], rendered as a SQL fragment containing only `?` placeholders and then bound
//! in the same order.  User text never reaches the SQL string itself.

use {
    crate::{
        error::Result,
        media::{media_from_row, MEDIA_COLUMNS},
    },
    futures::TryStreamExt,
    mediatag_shared::{
        Direction, MediaType, Rating, SearchQuery, SearchResult, SearchResultBuilder, DEFAULT_LIMIT,
    },
    sqlx::{
        query::Query,
        sqlite::{SqliteArguments, SqliteRow},
        Connection, Row, Sqlite, SqliteConnection,
    },
    tracing::debug,
};

/// A numeric column which may be bounded by a range filter
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Column {
    Width,
    Height,
    FileSize,
    CreatedAt,
}

impl Column {
    fn sql(self) -> &'static str {
        match self {
            Column::Width => "m.width",
            Column::Height => "m.height",
            Column::FileSize => "m.file_size",
            Column::CreatedAt => "m.created_at",
        }
    }
}

/// A single condition a media item must satisfy
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Predicate {
    /// Has a tag with this name (case-insensitive)
    HasTag(String),
    /// Has no tag with this name (case-insensitive)
    LacksTag(String),
    Favorite(bool),
    RatingIn(Vec<Rating>),
    MediaTypeIn(Vec<MediaType>),
    AtLeast(Column, i64),
    AtMost(Column, i64),
    HasParent(bool),
    ParentIs(i64),
    HasChildren(bool),
    /// Id strictly less than this one (an older item)
    IdBelow(i64),
    /// Id strictly greater than this one (a newer item)
    IdAbove(i64),
}

const TAG_EXISTS: &str = "EXISTS (SELECT 1 FROM media_tags mt JOIN tags t ON t.id = mt.tag_id \
                          WHERE mt.media_id = m.id AND t.name = ? COLLATE NOCASE)";

fn append_placeholders(buffer: &mut String, count: usize) {
    for index in 0..count {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push('?');
    }
}

fn append_predicate(buffer: &mut String, predicate: &Predicate) {
    match predicate {
        Predicate::HasTag(_) => buffer.push_str(TAG_EXISTS),
        Predicate::LacksTag(_) => {
            buffer.push_str("NOT ");
            buffer.push_str(TAG_EXISTS);
        }
        Predicate::Favorite(_) => buffer.push_str("m.is_favorite = ?"),
        Predicate::RatingIn(ratings) => {
            if ratings.is_empty() {
                buffer.push('0');
            } else {
                buffer.push_str("m.rating IN (");
                append_placeholders(buffer, ratings.len());
                buffer.push(')');
            }
        }
        Predicate::MediaTypeIn(types) => {
            if types.is_empty() {
                buffer.push('0');
            } else {
                buffer.push_str("m.media_type IN (");
                append_placeholders(buffer, types.len());
                buffer.push(')');
            }
        }
        Predicate::AtLeast(column, _) => {
            buffer.push_str(column.sql());
            buffer.push_str(" >= ?");
        }
        Predicate::AtMost(column, _) => {
            buffer.push_str(column.sql());
            buffer.push_str(" <= ?");
        }
        Predicate::HasParent(true) => buffer.push_str("m.parent_id IS NOT NULL"),
        Predicate::HasParent(false) => buffer.push_str("m.parent_id IS NULL"),
        Predicate::ParentIs(_) => buffer.push_str("m.parent_id = ?"),
        Predicate::HasChildren(_) => buffer.push_str("m.has_children = ?"),
        Predicate::IdBelow(_) => buffer.push_str("m.id < ?"),
        Predicate::IdAbove(_) => buffer.push_str("m.id > ?"),
    }
}

fn bind_predicate<'a>(
    select: Query<'a, Sqlite, SqliteArguments<'a>>,
    predicate: &Predicate,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
    match predicate {
        Predicate::HasTag(tag) | Predicate::LacksTag(tag) => select.bind(tag.to_owned()),
        Predicate::Favorite(value) | Predicate::HasChildren(value) => select.bind(*value),
        Predicate::RatingIn(ratings) => ratings
            .iter()
            .fold(select, |select, rating| select.bind(rating.as_str())),
        Predicate::MediaTypeIn(types) => types
            .iter()
            .fold(select, |select, media_type| select.bind(media_type.as_str())),
        Predicate::AtLeast(_, value)
        | Predicate::AtMost(_, value)
        | Predicate::ParentIs(value)
        | Predicate::IdBelow(value)
        | Predicate::IdAbove(value) => select.bind(*value),
        Predicate::HasParent(_) => select,
    }
}

/// Render `predicates` as the body of a WHERE clause, matching everything if there are none.
pub fn where_clause(predicates: &[Predicate]) -> String {
    if predicates.is_empty() {
        return "1".into();
    }

    let mut buffer = String::new();

    for (index, predicate) in predicates.iter().enumerate() {
        if index > 0 {
            buffer.push_str(" AND ");
        }
        append_predicate(&mut buffer, predicate);
    }

    buffer
}

fn bind_all<'a>(
    select: Query<'a, Sqlite, SqliteArguments<'a>>,
    predicates: &[Predicate],
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
    predicates.iter().fold(select, bind_predicate)
}

/// Translate the filters of `query` into predicates, ignoring its pagination fields.
///
/// Optional and wildcard tags produce no predicates.
pub fn predicates(query: &SearchQuery) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    predicates.extend(query.include.iter().cloned().map(Predicate::HasTag));
    predicates.extend(query.exclude.iter().cloned().map(Predicate::LacksTag));
    predicates.extend(query.favorite.map(Predicate::Favorite));

    if !query.ratings.is_empty() {
        predicates.push(Predicate::RatingIn(query.ratings.clone()));
    }

    if !query.media_types.is_empty() {
        predicates.push(Predicate::MediaTypeIn(query.media_types.clone()));
    }

    let ranges = [
        (Column::Width, query.min_width, query.max_width),
        (Column::Height, query.min_height, query.max_height),
        (Column::FileSize, query.min_file_size, query.max_file_size),
        (
            Column::CreatedAt,
            query.created_after.map(|time| time.timestamp()),
            query.created_before.map(|time| time.timestamp()),
        ),
    ];

    for (column, min, max) in ranges {
        predicates.extend(min.map(|min| Predicate::AtLeast(column, min)));
        predicates.extend(max.map(|max| Predicate::AtMost(column, max)));
    }

    predicates.extend(query.has_parent.map(Predicate::HasParent));
    predicates.extend(query.parent_id.map(Predicate::ParentIs));
    predicates.extend(query.has_children.map(Predicate::HasChildren));

    predicates
}

/// Where a page starts, as determined by the pagination fields of a query
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Window {
    /// Cursor condition, if any
    pub cursor: Option<Predicate>,

    /// Order in which rows are fetched
    pub direction: Direction,

    /// Rows to skip (always zero when a cursor is present)
    pub offset: i64,

    pub limit: usize,
}

impl Window {
    /// `before_id` takes precedence over `after_id`, and either takes precedence over `offset`.
    pub fn of(query: &SearchQuery) -> Self {
        let limit = query
            .limit
            .filter(|&limit| limit > 0)
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(DEFAULT_LIMIT);

        let (cursor, direction) = if let Some(id) = query.before_id {
            (Some(Predicate::IdBelow(id)), Direction::Older)
        } else if let Some(id) = query.after_id {
            (Some(Predicate::IdAbove(id)), Direction::Newer)
        } else {
            (None, Direction::Older)
        };

        let offset = if cursor.is_none() {
            query.offset.unwrap_or(0).max(0)
        } else {
            0
        };

        Self {
            cursor,
            direction,
            offset,
            limit,
        }
    }

    fn order(&self) -> &'static str {
        // Ids are allocated in creation order, so the id tiebreak keeps `created_at` order consistent with the id
        // cursors.
        match self.direction {
            Direction::Older => "m.created_at DESC, m.id DESC",
            Direction::Newer => "m.created_at ASC, m.id ASC",
        }
    }
}

/// Find the media items matching `query`, returning one page of them (most recent first) along with the total
/// number of matches.
pub async fn search(conn: &mut SqliteConnection, query: &SearchQuery) -> Result<SearchResult> {
    let filters = predicates(query);
    let window = Window::of(query);

    debug!(?filters, ?window, "search");

    let mut tx = conn.begin().await?;

    let count = format!("SELECT COUNT(*) FROM media m WHERE {}", where_clause(&filters));

    let total = bind_all(sqlx::query(&count), &filters)
        .fetch_one(&mut *tx)
        .await?
        .try_get::<i64, _>(0)?;

    let mut page = filters;
    page.extend(window.cursor.clone());

    let select = format!(
        "SELECT {MEDIA_COLUMNS} FROM media m WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        where_clause(&page),
        window.order()
    );

    let mut builder = SearchResultBuilder::new(window.limit, window.direction);

    {
        let mut rows = bind_all(sqlx::query(&select), &page)
            .bind(i64::try_from(window.limit.saturating_add(1)).unwrap_or(i64::MAX))
            .bind(window.offset)
            .fetch(&mut *tx);

        while let Some(row) = rows.try_next().await? {
            builder.consider(media_from_row(&row)?);
        }
    }

    tx.commit().await?;

    Ok(builder.build(total))
}

/// Count the media items matching the filters of `query`, ignoring pagination.
pub async fn count(conn: &mut SqliteConnection, query: &SearchQuery) -> Result<i64> {
    let filters = predicates(query);

    let count = format!("SELECT COUNT(*) FROM media m WHERE {}", where_clause(&filters));

    let row: SqliteRow = bind_all(sqlx::query(&count), &filters)
        .fetch_one(&mut *conn)
        .await?;

    Ok(row.try_get(0)?)
}
