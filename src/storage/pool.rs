//! SQLite connection pool management, modeled on the pipeline's single
//! relational store (§10.9: the Postgres feature the teacher carried is
//! dropped here — this system has no multi-tenant scaling need that would
//! justify it).

use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::Sqlite;
use tracing::info;

use crate::domain::{PipelineError, Result};

#[derive(Clone)]
pub struct SqlitePool {
    pool: sqlx::SqlitePool,
}

impl SqlitePool {
    /// Opens (creating if missing) the database at `url`, in WAL mode with
    /// foreign keys enforced.
    pub async fn connect(url: &str) -> Result<Self> {
        if !url.contains(":memory:") && !Sqlite::database_exists(url).await.unwrap_or(false) {
            info!(url, "creating sqlite database");
            Sqlite::create_database(url).await.map_err(|e| PipelineError::Storage(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PipelineError::Storage(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = sqlx::SqlitePool::connect_with(options).await.map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PipelineError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(())
    }

    pub(crate) fn inner(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_to_in_memory_database() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        pool.health_check().await.unwrap();
    }
}
