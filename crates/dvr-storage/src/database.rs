// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle: PRAGMAs, WAL mode and migrations.
//!
//! Every statement runs on tokio-rusqlite's single background thread, which
//! makes this connection the only writer. Do not open a second connection
//! for writes.

use std::path::Path;

use dvr_core::DvrError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Handle to the DVR database. Clones share the connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, DvrError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(DvrError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(DvrError::storage)?;
        let db = Self { conn };
        db.initialize(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, DvrError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(DvrError::storage)?;
        let db = Self { conn };
        db.initialize(false).await?;
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), DvrError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                conn.execute_batch(
                    "PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| run_migrations(conn))
            .await
            .map_err(|e| DvrError::Storage {
                source: e.to_string().into(),
            })?;
        debug!("migrations applied");
        Ok(())
    }

    /// `PRAGMA data_version`: changes only when another connection commits.
    pub async fn data_version(&self) -> Result<i64, DvrError> {
        self.conn
            .call(|conn| conn.query_row("PRAGMA data_version", [], |row| row.get(0)))
            .await
            .map_err(map_tr_err)
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(self) -> Result<(), DvrError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| DvrError::Storage {
            source: e.to_string().into(),
        })
    }
}

pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> DvrError {
    DvrError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dvr.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' \
                     AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .unwrap();

        assert!(tables.contains(&"scheduled_recordings".to_string()));
        assert!(tables.contains(&"recorded_programs".to_string()));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn data_version_moves_only_for_other_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dvr.db");
        let path = path.to_str().unwrap();
        let ours = Database::open(path, true).await.unwrap();
        let theirs = Database::open(path, true).await.unwrap();

        let before = ours.data_version().await.unwrap();
        ours.connection()
            .call(|conn| conn.execute("DELETE FROM recorded_programs", []))
            .await
            .unwrap();
        assert_eq!(ours.data_version().await.unwrap(), before);

        theirs
            .connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO scheduled_recordings \
                     (channel_id, start_time_ms, end_time_ms, priority, state, recording_type) \
                     VALUES (1, 0, 10, 0, 'NOT_STARTED', 'TIMED')",
                    [],
                )
            })
            .await
            .unwrap();
        assert_ne!(ours.data_version().await.unwrap(), before);
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dvr.db");
        let path = path.to_str().unwrap();
        Database::open(path, true).await.unwrap().close().await.unwrap();
        Database::open(path, true).await.unwrap().close().await.unwrap();
    }
}
