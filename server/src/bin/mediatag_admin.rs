#![deny(warnings)]

use {
    anyhow::{anyhow, Result},
    mediatag_server::{tag_specs, StoreResult},
    mediatag_shared::{query, SearchQuery, TagSpec},
    sqlx::SqliteConnection,
    structopt::StructOpt,
};

#[derive(StructOpt, Debug)]
#[structopt(name = "mediatag-admin", about = "Media library admin tool")]
enum Command {
    /// Search for media items, printing one line per match
    Search {
        /// SQLite database to create or reuse
        state_file: String,

        /// Search expression, e.g. "cat -dog /rating:s" (use `--` before expressions starting with `-`)
        query: String,

        /// Maximum number of items to print
        #[structopt(long)]
        limit: Option<i64>,

        /// Only print items older than this id
        #[structopt(long)]
        before: Option<i64>,

        /// Only print items newer than this id
        #[structopt(long)]
        after: Option<i64>,
    },

    /// Add tags to a media item, creating them as needed
    Tag {
        /// SQLite database to create or reuse
        state_file: String,

        /// Id of the item to tag
        media: i64,

        /// Tags to add, e.g. "sunset artist:someone"
        tags: Vec<String>,
    },

    /// Remove a tag from a media item
    Untag {
        /// SQLite database to create or reuse
        state_file: String,

        /// Id of the item to untag
        media: i64,

        /// Name of the tag to remove
        tag: String,
    },

    /// Replace the set of tags on a media item
    SetTags {
        /// SQLite database to create or reuse
        state_file: String,

        /// Id of the item to edit
        media: i64,

        /// Complete set of tags the item should have
        tags: Vec<String>,
    },

    /// Delete a tag, removing it from every media item
    DeleteTag {
        /// SQLite database to create or reuse
        state_file: String,

        /// Name of the tag to delete
        tag: String,
    },

    /// Print item, tag, link, and view counts
    Stats {
        /// SQLite database to create or reuse
        state_file: String,
    },

    /// Refresh query planner statistics
    Analyze {
        /// SQLite database to create or reuse
        state_file: String,
    },

    /// Rebuild the database file, reclaiming unused space
    Vacuum {
        /// SQLite database to create or reuse
        state_file: String,
    },

    /// Check the database for corruption, failing if any is found
    CheckIntegrity {
        /// SQLite database to create or reuse
        state_file: String,
    },
}

async fn tag_names(conn: &mut SqliteConnection, media: i64) -> StoreResult<String> {
    Ok(mediatag_server::tags_for_media(conn, media)
        .await?
        .iter()
        .map(|tag| TagSpec::new(tag.name.clone(), tag.category).to_string())
        .collect::<Vec<_>>()
        .join(" "))
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_timed();

    match Command::from_args() {
        Command::Search {
            state_file,
            query,
            limit,
            before,
            after,
        } => {
            let pool = mediatag_server::open(&state_file).await?;
            let mut conn = pool.acquire().await?;

            let result = mediatag_server::search(
                &mut conn,
                &SearchQuery {
                    limit,
                    before_id: before,
                    after_id: after,
                    ..query::parse(&query)
                },
            )
            .await?;

            for media in &result.media {
                println!(
                    "{}\t{}.{}\t{}",
                    media.id,
                    media.content_hash,
                    media.file_ext,
                    tag_names(&mut conn, media.id).await?
                );
            }

            println!(
                "{} of {} matching item(s){}",
                result.media.len(),
                result.total,
                if result.has_more { "; more available" } else { "" }
            );

            return Ok(());
        }

        Command::Tag {
            state_file,
            media,
            tags,
        } => {
            let pool = mediatag_server::open(&state_file).await?;

            mediatag_server::add_tags_to_media(&mut *pool.acquire().await?, media, &tag_specs(&tags)?)
                .await?;
        }

        Command::Untag {
            state_file,
            media,
            tag,
        } => {
            let pool = mediatag_server::open(&state_file).await?;
            let mut conn = pool.acquire().await?;

            let tag = mediatag_server::get_tag_by_name(&mut conn, &tag.parse::<TagSpec>()?.name).await?;

            mediatag_server::remove_tag_from_media(&mut conn, media, tag.id).await?;
        }

        Command::SetTags {
            state_file,
            media,
            tags,
        } => {
            let pool = mediatag_server::open(&state_file).await?;

            mediatag_server::set_tags(&mut *pool.acquire().await?, media, &tag_specs(&tags)?).await?;
        }

        Command::DeleteTag { state_file, tag } => {
            let pool = mediatag_server::open(&state_file).await?;
            let mut conn = pool.acquire().await?;

            let tag = mediatag_server::get_tag_by_name(&mut conn, &tag.parse::<TagSpec>()?.name).await?;

            mediatag_server::delete_tag(&mut conn, tag.id).await?;
        }

        Command::Stats { state_file } => {
            let pool = mediatag_server::open(&state_file).await?;

            let stats = mediatag_server::stats(&mut *pool.acquire().await?).await?;

            println!("{}", serde_json::to_string_pretty(&stats)?);

            return Ok(());
        }

        Command::Analyze { state_file } => {
            let pool = mediatag_server::open(&state_file).await?;

            mediatag_server::analyze(&mut *pool.acquire().await?).await?;
        }

        Command::Vacuum { state_file } => {
            let pool = mediatag_server::open(&state_file).await?;

            mediatag_server::vacuum(&mut *pool.acquire().await?).await?;
        }

        Command::CheckIntegrity { state_file } => {
            let pool = mediatag_server::open(&state_file).await?;

            let problems = mediatag_server::check_integrity(&mut *pool.acquire().await?).await?;

            for problem in &problems {
                println!("{problem}");
            }

            if !problems.is_empty() {
                return Err(anyhow!("integrity check found {} problem(s)", problems.len()));
            }
        }
    }

    println!("success!");

    Ok(())
}
