//! Store upkeep: planner statistics, space reclamation, and consistency checking.
//!
//! None of these may run inside a transaction; `VACUUM` in particular refuses to.

use {
    crate::error::Result,
    futures::TryStreamExt,
    sqlx::{Row, SqliteConnection},
    tracing::info,
};

/// Refresh the statistics the query planner uses to choose indexes.
pub async fn analyze(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("ANALYZE").execute(&mut *conn).await?;

    info!("analyzed");

    Ok(())
}

/// Rebuild the database file, reclaiming the space left by deleted rows.
pub async fn vacuum(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("VACUUM").execute(&mut *conn).await?;

    info!("vacuumed");

    Ok(())
}

/// Run SQLite's integrity check, returning the problems it reports (empty if the database is sound).
pub async fn check_integrity(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let mut problems = Vec::new();

    let mut rows = sqlx::query("PRAGMA integrity_check").fetch(&mut *conn);

    while let Some(row) = rows.try_next().await? {
        let line = row.try_get::<String, _>(0)?;

        if line != "ok" {
            problems.push(line);
        }
    }

    info!(problems = problems.len(), "checked integrity");

    Ok(problems)
}
