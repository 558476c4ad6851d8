//! Database schema migrations.
//!
//! Applied steps are recorded in a `_migrations` table; only steps newer
//! than its highest version run on open.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Schema steps as `(version, SQL)`, strictly increasing by version.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_prices.sql"))];

/// Bring the schema up to the latest version.
///
/// Each pending step runs in its own transaction together with its
/// `_migrations` row, so a failed step leaves the previous version intact.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the step that could not be applied.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let applied: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > applied) {
            tracing::debug!(version, "applying cache migration");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Highest schema version this build knows about.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |(version, _)| *version)
}
