//! libSQL storage layer for the local Pokédex database.
//!
//! The [`Storage`] struct wraps one local database connection holding the
//! keyed record tables ([`schema`]), the ingest run history, and the
//! aggregate queries behind the statistics reports.
//!
//! One `Storage` is opened per command and passed by reference to whatever
//! needs it; the connection is released when it is dropped.

mod migrations;
mod queries;
mod records;
pub mod schema;
mod sql;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use pokedex_shared::{PokedexError, Result};
use serde::Serialize;
use uuid::Uuid;

pub use queries::{AttackRow, BaseStats};
pub use records::{RecordStore, TableStore};
pub use schema::{ColumnKind, ColumnSpec, POKEMON, POKEMON_GO_STATS, POKEMON_IMAGES, TableSpec};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Map any libSQL failure into the persistence error variant.
pub(crate) fn storage_err(e: libsql::Error) -> PokedexError {
    PokedexError::Persistence(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PokedexError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` for reporting only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PokedexError::validation(format!(
                "database {} does not exist; run a fetch first",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PokedexError::Persistence(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PokedexError::Persistence(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ingest run history
    // -----------------------------------------------------------------------

    /// Record the start of an ingestion run. Returns the generated run ID.
    pub async fn insert_ingest_run(&self, source: &str, table_name: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_runs (id, source, table_name, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), source, table_name, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Close an ingestion run with its final stats.
    pub async fn finish_ingest_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingest_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent ingestion runs, newest first.
    pub async fn recent_ingest_runs(&self, limit: u32) -> Result<Vec<IngestRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source, table_name, started_at, finished_at, stats_json
                 FROM ingest_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_ingest_run(&row)?);
        }
        Ok(results)
    }

    /// Row counts of every record table, in schema order.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, u64)>> {
        let mut counts = Vec::with_capacity(schema::RECORD_TABLES.len());
        for table in schema::RECORD_TABLES {
            counts.push((table.name, self.count_records(table).await?));
        }
        Ok(counts)
    }
}

/// One entry of the ingest run history.
#[derive(Debug, Clone, Serialize)]
pub struct IngestRun {
    pub id: String,
    pub source: String,
    pub table_name: String,
    pub started_at: DateTime<Utc>,
    /// `None` while running, or if the process died mid-run.
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: Option<serde_json::Value>,
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PokedexError::Persistence(format!("invalid date: {e}")))
}

/// Convert a database row to an [`IngestRun`].
fn row_to_ingest_run(row: &libsql::Row) -> Result<IngestRun> {
    let started: String = row.get(3).map_err(storage_err)?;
    let finished = match row.get::<String>(4).ok() {
        Some(s) => Some(parse_timestamp(&s)?),
        None => None,
    };
    Ok(IngestRun {
        id: row.get(0).map_err(storage_err)?,
        source: row.get(1).map_err(storage_err)?,
        table_name: row.get(2).map_err(storage_err)?,
        started_at: parse_timestamp(&started)?,
        finished_at: finished,
        stats: row
            .get::<String>(5)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok()),
    })
}

/// Create a temp file storage for testing.
#[cfg(test)]
pub(crate) async fn test_storage() -> Storage {
    let tmp = std::env::temp_dir().join(format!("pokedex_test_{}.db", Uuid::now_v7()));
    Storage::open(&tmp).await.expect("open test db")
}
