#![deny(warnings)]

use {
    crate::warp_util::HttpError,
    anyhow::Result,
    chrono::{DateTime, Utc},
    futures::future::{BoxFuture, FutureExt},
    http::{
        header,
        response::{self, Response},
        status::StatusCode,
    },
    hyper::Body,
    mediatag_shared::{
        CreateMedia, MediaQuery, Patch, SearchQuery, TagSpec, TagsQuery,
        UpdateMedia,
    },
    serde::{de::DeserializeOwned, Serialize},
    sqlx::{
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
        Connection, Sqlite, SqliteConnection, SqlitePool, Transaction,
    },
    std::{convert::Infallible, net::SocketAddrV4, time::Duration},
    structopt::StructOpt,
    tokio::time,
    tracing::{info, warn},
    warp::{Filter, Rejection, Reply},
};

pub use {
    catalog::{delete_tag, find_tag, get_or_create, get_tag, get_tag_by_name, list_tags},
    error::{Error, Result as StoreResult},
    maintenance::{analyze, check_integrity, vacuum},
    media::{
        create_media, delete_media, get_media, record_view, stats, toggle_favorite, update_media,
    },
    search::search,
    tags::{add_tags_to_media, apply_patches, remove_tag_from_media, set_tags, tags_for_media},
};

pub mod catalog;
pub mod error;
pub mod maintenance;
pub mod media;
pub mod search;
pub mod tags;
mod warp_util;

/// How long a writer waits for a competing writer to release the database before giving up
const BUSY_TIMEOUT_SECS: u64 = 5;

/// Largest request body accepted, in bytes
const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(StructOpt, Debug)]
#[structopt(name = "mediatag-server", about = "Media library tagging and search backend")]
pub struct Options {
    /// Address to which to bind
    #[structopt(long)]
    pub address: SocketAddrV4,

    /// SQLite database to create or reuse
    #[structopt(long)]
    pub state_file: String,

    /// Maximum time to spend on a single request before answering 503
    #[structopt(long, default_value = "30")]
    pub request_timeout_secs: u64,
}

/// Open (creating if necessary) the database in `state_file` and bring its schema up to date.
pub async fn open(state_file: &str) -> Result<SqlitePool> {
    let options = format!("sqlite://{}", state_file)
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    apply_schema(&mut *pool.acquire().await?).await?;

    Ok(pool)
}

async fn apply_schema(conn: &mut SqliteConnection) -> Result<()> {
    for statement in schema::DDL_STATEMENTS {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    Ok(())
}

/// Begin a transaction which will write, taking the database write lock up front.
///
/// A deferred transaction which reads before it writes fails immediately with SQLITE_BUSY when another writer got
/// there first, whereas `BEGIN IMMEDIATE` waits out the busy timeout.  Inside an enclosing transaction this opens
/// a savepoint instead.
pub(crate) async fn begin_write(
    conn: &mut SqliteConnection,
) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
    if conn.is_in_transaction() {
        conn.begin().await
    } else {
        conn.begin_with("BEGIN IMMEDIATE").await
    }
}

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

/// Convert a stored unix timestamp (in seconds) to a `DateTime`.
pub(crate) fn timestamp(seconds: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::<Utc>::from_timestamp(seconds, 0).ok_or_else(|| {
        sqlx::Error::Decode(format!("timestamp out of range: {seconds}").into())
    })
}

/// Parse a list of tag specs as supplied in a request body, e.g. `["artist:someone", "cat"]`.
///
/// Each element names exactly one tag, so an element containing whitespace or lacking a name fails the list.
pub fn tag_specs(specs: &[String]) -> StoreResult<Vec<TagSpec>> {
    specs
        .iter()
        .map(|spec| {
            spec.parse::<TagSpec>()
                .map_err(|e| Error::InvalidInput(e.to_string()))
        })
        .collect()
}

fn response() -> response::Builder {
    Response::builder()
}

fn internal_error(e: impl std::fmt::Debug) -> Rejection {
    warn!("error building response: {:?}", e);

    Rejection::from(HttpError::internal_server_error())
}

fn json<T: Serialize>(value: &T) -> Result<Response<Body>, Rejection> {
    let body = serde_json::to_vec(value).map_err(internal_error)?;

    response()
        .header(header::CONTENT_LENGTH, body.len())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(internal_error)
}

fn no_content() -> Result<Response<Body>, Rejection> {
    response()
        .status(StatusCode::NO_CONTENT)
        .body(Body::empty())
        .map_err(internal_error)
}

/// Per-request context: the connection pool and the deadline applied to each request
#[derive(Clone)]
struct State {
    pool: SqlitePool,
    timeout: Duration,
}

impl State {
    /// Run `operation` on a pooled connection, abandoning it (and thereby rolling back any open transaction) if
    /// it has not finished within the request deadline.
    async fn run<T, F>(&self, operation: F) -> Result<T, Rejection>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, StoreResult<T>> + Send,
    {
        let pool = &self.pool;

        let result = time::timeout(self.timeout, async move {
            let mut conn = pool.acquire().await?;

            operation(&mut *conn).await
        })
        .await;

        match result {
            Ok(Ok(value)) => Ok(value),

            Ok(Err(error)) => {
                warn!("error handling request: {:?}", error);

                Err(Rejection::from(HttpError::from(&error)))
            }

            Err(_) => {
                warn!("request exceeded {:?} deadline", self.timeout);

                Err(Rejection::from(HttpError::timeout()))
            }
        }
    }

    async fn json<T, F>(&self, operation: F) -> Result<Response<Body>, Rejection>
    where
        T: Serialize + Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, StoreResult<T>> + Send,
    {
        json(&self.run(operation).await?)
    }

    async fn no_content<F>(&self, operation: F) -> Result<Response<Body>, Rejection>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, StoreResult<()>> + Send,
    {
        self.run(operation).await?;

        no_content()
    }
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn routes(
    pool: SqlitePool,
    options: &Options,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let state = State {
        pool,
        timeout: Duration::from_secs(options.request_timeout_secs),
    };

    let state = warp::any().map(move || state.clone());

    let media_routes = warp::get()
        .and(warp::path!("media"))
        .and(warp::query::<MediaQuery>())
        .and(state.clone())
        .and_then(|query: MediaQuery, state: State| async move {
            let query = SearchQuery::from(&query);

            state
                .json(move |conn| async move { search::search(conn, &query).await }.boxed())
                .await
        })
        .or(warp::post()
            .and(warp::path!("media"))
            .and(json_body())
            .and(state.clone())
            .and_then(|create: CreateMedia, state: State| async move {
                state
                    .json(move |conn| async move { media::create_media(conn, &create).await }.boxed())
                    .await
            }))
        .or(warp::get()
            .and(warp::path!("media" / i64))
            .and(state.clone())
            .and_then(|id: i64, state: State| async move {
                state
                    .json(move |conn| media::get_media(conn, id).boxed())
                    .await
            }))
        .or(warp::patch()
            .and(warp::path!("media" / i64))
            .and(json_body())
            .and(state.clone())
            .and_then(|id: i64, update: UpdateMedia, state: State| async move {
                state
                    .json(move |conn| {
                        async move { media::update_media(conn, id, &update).await }.boxed()
                    })
                    .await
            }))
        .or(warp::delete()
            .and(warp::path!("media" / i64))
            .and(state.clone())
            .and_then(|id: i64, state: State| async move {
                state
                    .no_content(move |conn| media::delete_media(conn, id).boxed())
                    .await
            }))
        .or(warp::post()
            .and(warp::path!("media" / i64 / "favorite"))
            .and(state.clone())
            .and_then(|id: i64, state: State| async move {
                state
                    .json(move |conn| media::toggle_favorite(conn, id).boxed())
                    .await
            }))
        .or(warp::post()
            .and(warp::path!("media" / i64 / "view"))
            .and(state.clone())
            .and_then(|id: i64, state: State| async move {
                state
                    .json(move |conn| media::record_view(conn, id).boxed())
                    .await
            }));

    let media_tag_routes = warp::get()
        .and(warp::path!("media" / i64 / "tags"))
        .and(state.clone())
        .and_then(|id: i64, state: State| async move {
            state
                .json(move |conn| tags::tags_for_media(conn, id).boxed())
                .await
        })
        .or(warp::put()
            .and(warp::path!("media" / i64 / "tags"))
            .and(json_body())
            .and(state.clone())
            .and_then(|id: i64, specs: Vec<String>, state: State| async move {
                state
                    .json(move |conn| {
                        async move { tags::set_tags(conn, id, &tag_specs(&specs)?).await }.boxed()
                    })
                    .await
            }))
        .or(warp::post()
            .and(warp::path!("media" / i64 / "tags"))
            .and(json_body())
            .and(state.clone())
            .and_then(|id: i64, specs: Vec<String>, state: State| async move {
                state
                    .json(move |conn| {
                        async move {
                            let specs = tag_specs(&specs)?;

                            tags::add_tags_to_media(&mut *conn, id, &specs).await?;

                            tags::tags_for_media(conn, id).await
                        }
                        .boxed()
                    })
                    .await
            }))
        .or(warp::delete()
            .and(warp::path!("media" / i64 / "tags" / i64))
            .and(state.clone())
            .and_then(|id: i64, tag: i64, state: State| async move {
                state
                    .no_content(move |conn| tags::remove_tag_from_media(conn, id, tag).boxed())
                    .await
            }));

    let tag_routes = warp::get()
        .and(warp::path!("tags"))
        .and(warp::query::<TagsQuery>())
        .and(state.clone())
        .and_then(|query: TagsQuery, state: State| async move {
            state
                .json(move |conn| async move { catalog::list_tags(conn, &query).await }.boxed())
                .await
        })
        .or(warp::patch()
            .and(warp::path!("tags"))
            .and(json_body())
            .and(state.clone())
            .and_then(|patches: Vec<Patch>, state: State| async move {
                state
                    .no_content(move |conn| async move { tags::apply_patches(conn, &patches).await }.boxed())
                    .await
            }))
        .or(warp::delete()
            .and(warp::path!("tags" / i64))
            .and(state.clone())
            .and_then(|id: i64, state: State| async move {
                state
                    .no_content(move |conn| catalog::delete_tag(conn, id).boxed())
                    .await
            }))
        .or(warp::get()
            .and(warp::path!("stats"))
            .and(state)
            .and_then(|state: State| async move {
                state.json(|conn| media::stats(conn).boxed()).await
            }));

    media_routes
        .or(media_tag_routes)
        .or(tag_routes)
        .recover(warp_util::handle_rejection)
        .with(warp::log("mediatag"))
}

pub async fn serve(pool: SqlitePool, options: &Options) -> Result<()> {
    let (address, future) = warp::serve(routes(pool, options)).try_bind_ephemeral(options.address)?;

    info!("listening on {}", address);

    future.await;

    Ok(())
}


#[cfg(test)]
mod test {
    use {
        super::*,
        crate::test_util::{image, pool},
        maplit::hashset,
        mediatag_shared::{Media, SearchResult, Stats, Tag, TagCategory},
        std::collections::HashSet,
        tempfile::TempDir,
    };

    fn options(request_timeout_secs: u64) -> Result<Options> {
        Ok(Options {
            address: "0.0.0.0:0".parse()?,
            state_file: "does-not-exist-5b0c8f0e-6a0f-4a43-9d55-3e8f1c2a7d11".to_string(),
            request_timeout_secs,
        })
    }

    fn body<T: DeserializeOwned>(response: &Response<hyper::body::Bytes>) -> Result<T> {
        Ok(serde_json::from_slice(response.body())?)
    }

    async fn create<F>(routes: &F, hash: &str) -> Result<Media>
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let response = warp::test::request()
            .method("POST")
            .path("/media")
            .json(&image(hash))
            .reply(routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);

        body(&response)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn media_lifecycle() -> Result<()> {
        let routes = routes(pool().await?, &options(30)?);

        let media = create(&routes, "abc").await?;

        assert_eq!(media.content_hash, "abc");
        assert_eq!(media.tag_count, 0);

        // Duplicate content hash

        let response = warp::test::request()
            .method("POST")
            .path("/media")
            .json(&image("abc"))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/media/{}", media.id))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body::<Media>(&response)?, media);

        let response = warp::test::request()
            .method("PATCH")
            .path(&format!("/media/{}", media.id))
            .json(&serde_json::json!({ "rating": "explicit" }))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body::<Media>(&response)?.rating.as_str(), "explicit");

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/media/{}/favorite", media.id))
            .reply(&routes)
            .await;

        assert!(body::<Media>(&response)?.is_favorite);

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/media/{}/view", media.id))
            .reply(&routes)
            .await;

        assert!(body::<Media>(&response)?.last_viewed_at.is_some());

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/media/{}", media.id))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/media/{}", media.id))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let error = body::<serde_json::Value>(&response)?;

        assert_eq!(error["status"], 404);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn tagging_and_search() -> Result<()> {
        let routes = routes(pool().await?, &options(30)?);

        let a = create(&routes, "a").await?;
        let b = create(&routes, "b").await?;

        let response = warp::test::request()
            .method("PUT")
            .path(&format!("/media/{}/tags", a.id))
            .json(&["cat", "artist:someone"])
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);

        let names = |tags: Vec<Tag>| tags.into_iter().map(|tag| tag.name).collect::<HashSet<_>>();

        assert_eq!(
            names(body(&response)?),
            hashset!["cat".to_string(), "someone".to_string()]
        );

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/media/{}/tags", b.id))
            .json(&["cat", "dog"])
            .reply(&routes)
            .await;

        assert_eq!(
            names(body(&response)?),
            hashset!["cat".to_string(), "dog".to_string()]
        );

        // Invalid tag names, including elements which do not name exactly one tag

        for specs in [&["-cat"][..], &["cat dog"], &["artist:"], &["cat", ""]] {
            let response = warp::test::request()
                .method("PUT")
                .path(&format!("/media/{}/tags", a.id))
                .json(&specs)
                .reply(&routes)
                .await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{specs:?}");
        }

        let response = warp::test::request()
            .method("GET")
            .path("/media?query=cat%20-dog")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);

        let result = body::<SearchResult>(&response)?;

        assert_eq!(result.total, 1);
        assert_eq!(result.media.len(), 1);
        assert_eq!(result.media[0].id, a.id);
        assert_eq!(result.media[0].tag_count, 2);
        assert_eq!(result.media[0].category_tag_counts.artist, 1);

        let response = warp::test::request()
            .method("GET")
            .path("/media?query=cat&limit=1")
            .reply(&routes)
            .await;

        let result = body::<SearchResult>(&response)?;

        assert_eq!(result.total, 2);
        assert!(result.has_more);

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/media?query=cat&limit=1&before={}", b.id))
            .reply(&routes)
            .await;

        let result = body::<SearchResult>(&response)?;

        assert_eq!(result.first_id, Some(a.id));
        assert!(!result.has_more);

        let response = warp::test::request()
            .method("GET")
            .path("/tags?prefix=c&category=general")
            .reply(&routes)
            .await;

        let cat = body::<Vec<Tag>>(&response)?;

        assert_eq!(cat.len(), 1);
        assert_eq!(cat[0].name, "cat");
        assert_eq!(cat[0].usage_count, 2);
        assert_eq!(cat[0].category, TagCategory::General);

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/media/{}/tags/{}", b.id, cat[0].id))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/media/{}/tags/{}", b.id, cat[0].id))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = warp::test::request()
            .method("PATCH")
            .path("/tags")
            .json(&serde_json::json!([
                { "media": b.id, "tag": "character:hero", "action": "add" },
                { "media": a.id, "tag": "cat", "action": "remove" },
            ]))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/media/{}/tags", b.id))
            .reply(&routes)
            .await;

        assert_eq!(
            names(body(&response)?),
            hashset!["dog".to_string(), "hero".to_string()]
        );

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/tags/{}", cat[0].id))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = warp::test::request()
            .method("GET")
            .path("/stats")
            .reply(&routes)
            .await;

        assert_eq!(
            body::<Stats>(&response)?,
            Stats {
                media: 2,
                tags: 3,
                links: 3,
                total_file_size: 2048,
                views: 0,
            }
        );

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn malformed_requests() -> Result<()> {
        let routes = routes(pool().await?, &options(30)?);

        let response = warp::test::request()
            .method("POST")
            .path("/media")
            .header("content-type", "application/json")
            .body("{\"content_hash\": 7}")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = warp::test::request()
            .method("GET")
            .path("/media?limit=lots")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = warp::test::request()
            .method("GET")
            .path("/nowhere")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // A query which cannot be interpreted still succeeds.

        let response = warp::test::request()
            .method("GET")
            .path("/media?query=%2Fbogus%3A1%20-")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body::<SearchResult>(&response)?, SearchResult::default());

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn deadline() -> Result<()> {
        let pool = pool().await?;
        let routes = routes(pool.clone(), &options(1)?);

        // Hold the only connection so the request cannot make progress.
        let held = pool.acquire().await?;

        let response = warp::test::request()
            .method("GET")
            .path("/stats")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        drop(held);

        let response = warp::test::request()
            .method("GET")
            .path("/stats")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::OK);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn reopen() -> Result<()> {
        let dir = TempDir::new()?;
        let state_file = dir.path().join("state.db");
        let state_file = state_file.to_str().ok_or_else(|| anyhow::anyhow!("invalid UTF-8"))?;

        let id = {
            let pool = open(state_file).await?;

            let media = media::create_media(&mut *pool.acquire().await?, &image("abc")).await?;

            tags::add_tags_to_media(
                &mut *pool.acquire().await?,
                media.id,
                &tag_specs(&["cat".to_string()])?,
            )
            .await?;

            pool.close().await;

            media.id
        };

        let pool = open(state_file).await?;

        let media = media::get_media(&mut *pool.acquire().await?, id).await?;

        assert_eq!(media.tag_count, 1);
        assert_eq!(
            catalog::get_tag_by_name(&mut *pool.acquire().await?, "cat")
                .await?
                .usage_count,
            1
        );

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers() -> Result<()> {
        let dir = TempDir::new()?;
        let state_file = dir.path().join("state.db");
        let state_file = state_file.to_str().ok_or_else(|| anyhow::anyhow!("invalid UTF-8"))?;

        let pool = open(state_file).await?;

        let mut ids = Vec::new();
        for number in 0..8 {
            ids.push(
                media::create_media(&mut *pool.acquire().await?, &image(&format!("item{number}")))
                    .await?
                    .id,
            );
        }

        const ROUNDS: usize = 10;

        // Every task creates the same per-round tags, so the tag creation race is exercised too.
        let tasks = ids
            .iter()
            .map(|&id| {
                let pool = pool.clone();

                tokio::spawn(async move {
                    for round in 0..ROUNDS {
                        let specs = tag_specs(&["shared".to_string(), format!("round{round}")])?;

                        tags::add_tags_to_media(&mut *pool.acquire().await?, id, &specs).await?;
                    }

                    Ok::<_, Error>(())
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await??;
        }

        let mut conn = pool.acquire().await?;

        for &id in &ids {
            let media = media::get_media(&mut conn, id).await?;

            assert_eq!(media.tag_count, ROUNDS as i64 + 1);
            assert_eq!(media.category_tag_counts.general, ROUNDS as i64 + 1);
        }

        for tag in catalog::list_tags(&mut conn, &TagsQuery::default()).await? {
            assert_eq!(tag.usage_count, ids.len() as i64, "usage count of {}", tag.name);
        }

        assert_eq!(media::stats(&mut conn).await?.tags, ROUNDS as i64 + 1);

        Ok(())
    }

    #[tokio::test]
    async fn nested_writes_roll_back_together() -> Result<()> {
        let mut conn = crate::test_util::connection().await?;

        let media = media::create_media(&mut conn, &image("abc")).await?;

        {
            let mut tx = begin_write(&mut conn).await?;

            tags::add_tags_to_media(&mut tx, media.id, &tag_specs(&["cat".to_string()])?).await?;

            assert_eq!(media::get_media(&mut tx, media.id).await?.tag_count, 1);
        }

        assert_eq!(media::get_media(&mut conn, media.id).await?.tag_count, 0);
        assert!(catalog::find_tag(&mut conn, "cat").await?.is_none());

        Ok(())
    }
}
