//! Keyed record operations and the [`RecordStore`] seam used by ingestion.

use std::collections::HashSet;

use libsql::Value;
use libsql::params::Params;
use pokedex_shared::{FieldValue, PokedexError, Record, RecordId, Result, UpsertMode};

use crate::schema::{ColumnKind, TableSpec};
use crate::{Storage, sql, storage_err};

/// Keyed persistence as seen by an ingestion run.
///
/// Implementations must make each `upsert` durable before returning; a run
/// that aborts later keeps everything written so far.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    /// Table name, for logs and run history.
    fn table_name(&self) -> &str;

    async fn exists(&self, id: RecordId) -> Result<bool>;

    async fn count(&self) -> Result<u64>;

    /// Write one record. Returns `true` if a row was inserted or replaced.
    async fn upsert(&self, record: &Record, mode: UpsertMode) -> Result<bool>;

    /// Write a batch of records. Returns how many rows were written.
    async fn upsert_many(&self, records: &[Record], mode: UpsertMode) -> Result<u64>;

    /// The subset of `ids` already present.
    async fn existing_ids(&self, ids: &[RecordId]) -> Result<HashSet<RecordId>>;
}

/// Ids per `IN (...)` query, below SQLite's bound-parameter limit.
const EXISTING_IDS_CHUNK: usize = 500;

/// A [`RecordStore`] over one table of a [`Storage`].
#[derive(Clone, Copy)]
pub struct TableStore<'a> {
    storage: &'a Storage,
    table: &'static TableSpec,
}

impl<'a> TableStore<'a> {
    pub fn new(storage: &'a Storage, table: &'static TableSpec) -> Self {
        Self { storage, table }
    }
}

impl RecordStore for TableStore<'_> {
    fn table_name(&self) -> &str {
        self.table.name
    }

    async fn exists(&self, id: RecordId) -> Result<bool> {
        self.storage.record_exists(self.table, id).await
    }

    async fn count(&self) -> Result<u64> {
        self.storage.count_records(self.table).await
    }

    async fn upsert(&self, record: &Record, mode: UpsertMode) -> Result<bool> {
        self.storage.upsert_record(self.table, record, mode).await
    }

    async fn upsert_many(&self, records: &[Record], mode: UpsertMode) -> Result<u64> {
        self.storage.upsert_records(self.table, records, mode).await
    }

    async fn existing_ids(&self, ids: &[RecordId]) -> Result<HashSet<RecordId>> {
        self.storage.existing_ids(self.table, ids).await
    }
}

// ---------------------------------------------------------------------------
// Storage record operations
// ---------------------------------------------------------------------------

impl Storage {
    /// Whether a row with `id` exists in `table`.
    pub async fn record_exists(&self, table: &TableSpec, id: RecordId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT 1 FROM {} WHERE id = ?1", table.name),
                libsql::params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Number of rows in `table`.
    pub async fn count_records(&self, table: &TableSpec) -> Result<u64> {
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {}", table.name), ())
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).map_err(storage_err)?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Insert `record`, resolving an id conflict according to `mode`.
    ///
    /// Returns `true` if a row was written. Records that do not fit the
    /// table (missing required column, wrong type) fail with
    /// [`PokedexError::MalformedRecord`] before touching the database.
    pub async fn upsert_record(
        &self,
        table: &TableSpec,
        record: &Record,
        mode: UpsertMode,
    ) -> Result<bool> {
        self.check_writable()?;
        let values = bind_record(table, record)?;
        let changed = self
            .conn
            .execute(
                &table.upsert_sql(mode == UpsertMode::Replace),
                Params::Positional(values),
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    /// Upsert a batch inside one transaction.
    ///
    /// Every record is validated first; one malformed record rejects the
    /// whole batch without writing.
    pub async fn upsert_records(
        &self,
        table: &TableSpec,
        records: &[Record],
        mode: UpsertMode,
    ) -> Result<u64> {
        self.check_writable()?;
        if records.is_empty() {
            return Ok(0);
        }

        let bound = records
            .iter()
            .map(|r| bind_record(table, r))
            .collect::<Result<Vec<_>>>()?;
        let sql = table.upsert_sql(mode == UpsertMode::Replace);

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        let mut written = 0;
        for values in bound {
            written += tx
                .execute(&sql, Params::Positional(values))
                .await
                .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;

        tracing::debug!(table = table.name, written, "batch upsert committed");
        Ok(written)
    }

    /// Which of `ids` already exist in `table`.
    pub async fn existing_ids(
        &self,
        table: &TableSpec,
        ids: &[RecordId],
    ) -> Result<HashSet<RecordId>> {
        let mut found = HashSet::new();
        for chunk in ids.chunks(EXISTING_IDS_CHUNK) {
            let Some((sql, params)) = sql::in_list(
                &format!("SELECT id FROM {} WHERE id", table.name),
                chunk.iter().copied(),
                "",
            ) else {
                continue;
            };

            let mut rows = self.conn.query(&sql, params).await.map_err(storage_err)?;
            while let Some(row) = rows.next().await.map_err(storage_err)? {
                found.insert(row.get::<i64>(0).map_err(storage_err)?);
            }
        }
        Ok(found)
    }

    /// Fetch one record by id, with every column of `table`.
    pub async fn get_record(&self, table: &TableSpec, id: RecordId) -> Result<Option<Record>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {} FROM {} WHERE id = ?1", table.column_list(), table.name),
                libsql::params![id],
            )
            .await
            .map_err(storage_err)?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };

        let mut record = Record::new(row.get::<i64>(0).map_err(storage_err)?);
        for (offset, column) in table.columns.iter().enumerate() {
            let idx = i32::try_from(offset + 1)
                .map_err(|_| PokedexError::Persistence("too many columns".into()))?;
            let value = row.get_value(idx).map_err(storage_err)?;
            record
                .fields
                .insert(column.name.to_string(), from_sql_value(value)?);
        }
        Ok(Some(record))
    }
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

/// Bind `record` to the table's column order: `id` first, absent fields as NULL.
fn bind_record(table: &TableSpec, record: &Record) -> Result<Vec<Value>> {
    if let Some(unknown) = record.fields.keys().find(|k| table.column(k).is_none()) {
        return Err(PokedexError::malformed(
            Some(record.id),
            format!("unknown column '{unknown}' for table {}", table.name),
        ));
    }

    let mut values = Vec::with_capacity(table.columns.len() + 1);
    values.push(Value::Integer(record.id));

    for column in table.columns {
        let field = record.get(column.name).unwrap_or(&FieldValue::Null);
        let value = match (column.kind, field) {
            (_, FieldValue::Null) if column.required => {
                return Err(PokedexError::malformed(
                    Some(record.id),
                    format!("missing required field '{}'", column.name),
                ));
            }
            (_, FieldValue::Null) => Value::Null,
            (ColumnKind::Integer, FieldValue::Integer(v)) => Value::Integer(*v),
            (ColumnKind::Text, FieldValue::Text(s)) => Value::Text(s.clone()),
            (ColumnKind::Blob, FieldValue::Blob(b)) => Value::Blob(b.clone()),
            (kind, other) => {
                return Err(PokedexError::malformed(
                    Some(record.id),
                    format!("field '{}' expects {kind:?}, got {other:?}", column.name),
                ));
            }
        };
        values.push(value);
    }
    Ok(values)
}

fn from_sql_value(value: Value) -> Result<FieldValue> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Integer(v) => Ok(FieldValue::Integer(v)),
        Value::Text(s) => Ok(FieldValue::Text(s)),
        Value::Blob(b) => Ok(FieldValue::Blob(b)),
        Value::Real(r) => Err(PokedexError::Persistence(format!(
            "unexpected REAL value {r} in record table"
        ))),
    }
}
