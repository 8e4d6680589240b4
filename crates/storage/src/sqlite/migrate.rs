use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::SqliteInitError;

/// Schema steps in version order. Applied steps are recorded in
/// `schema_migrations` and never rerun.
pub(super) const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r"
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
    ),
    (
        2,
        r"
            CREATE INDEX IF NOT EXISTS documents_updated_at
                ON documents (updated_at);
        ",
    ),
];

pub(super) async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;

    for &(version, sql) in MIGRATIONS {
        if is_applied(pool, version).await? {
            continue;
        }
        apply(pool, version, sql)
            .await
            .map_err(|source| SqliteInitError::Migration { version, source })?;
        log::info!("applied schema migration {version}");
    }
    Ok(())
}

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn apply(pool: &SqlitePool, version: i64, sql: &str) -> Result<(), sqlx::Error> {
    let mut tx: Transaction<'_, Sqlite> = pool.begin().await?;
    sqlx::query(sql).execute(&mut *tx).await?;
    sqlx::query(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)
         ON CONFLICT(version) DO NOTHING",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    tx.commit().await
}
