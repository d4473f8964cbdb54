//! In-memory source and temp-file store for tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use pokedex_shared::{PokedexError, RawRecord, Record, RecordId, Result, UpsertMode};
use pokedex_sources::{Candidate, Listing, RecordSource, Resolved};
use pokedex_storage::{POKEMON, RecordStore, Storage, TableSpec, TableStore};
use serde_json::{Value, json};

/// Open a fresh database under the system temp dir.
pub(crate) async fn temp_storage() -> Storage {
    let path = std::env::temp_dir().join(format!("pokedex_core_{}.db", uuid::Uuid::now_v7()));
    Storage::open(&path).await.expect("open test db")
}

pub(crate) fn raw_pokemon(name: &str) -> RawRecord {
    json!({ "name": name, "hp": 45 })
        .as_object()
        .cloned()
        .expect("object")
}

/// A [`RecordSource`] writing `pokemon` rows from fixed data.
///
/// Range mode serves every id in the range with a generated record; bulk
/// mode lists the given entries, where `None` resolves as not found.
pub(crate) struct MockSource {
    listing: Listing,
    listing_fails: bool,
    fatal_at: Option<RecordId>,
    resolved: Mutex<Vec<RecordId>>,
}

impl MockSource {
    pub(crate) fn range(start: RecordId, end: RecordId) -> Self {
        Self::with_listing(Listing::Range { start, end })
    }

    pub(crate) fn bulk(entries: impl IntoIterator<Item = (RecordId, Option<RawRecord>)>) -> Self {
        let candidates = entries
            .into_iter()
            .map(|(id, raw)| Candidate { id, raw })
            .collect();
        Self::with_listing(Listing::Bulk {
            candidates,
            unaddressable: 0,
        })
    }

    fn with_listing(listing: Listing) -> Self {
        Self {
            listing,
            listing_fails: false,
            fatal_at: None,
            resolved: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_unaddressable(mut self, count: u64) -> Self {
        if let Listing::Bulk { unaddressable, .. } = &mut self.listing {
            *unaddressable = count;
        }
        self
    }

    pub(crate) fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    /// Fail with a transport error when `id` is resolved.
    pub(crate) fn fatal_at(mut self, id: RecordId) -> Self {
        self.fatal_at = Some(id);
        self
    }

    /// Ids passed to `resolve`, in call order.
    pub(crate) fn resolved_ids(&self) -> Vec<RecordId> {
        self.resolved.lock().expect("lock").clone()
    }
}

impl RecordSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn target(&self) -> &'static TableSpec {
        &POKEMON
    }

    async fn listing(&self) -> Result<Listing> {
        if self.listing_fails {
            return Err(PokedexError::Transport("mock listing down".into()));
        }
        Ok(self.listing.clone())
    }

    async fn resolve(&self, candidate: Candidate) -> Result<Resolved> {
        let id = candidate.id;
        self.resolved.lock().expect("lock").push(id);

        if self.fatal_at == Some(id) {
            return Err(PokedexError::Transport(format!("mock connection reset at {id}")));
        }

        let raw = match (&self.listing, candidate.raw) {
            (Listing::Range { .. }, _) => raw_pokemon(&format!("mon-{id}")),
            (Listing::Bulk { .. }, Some(raw)) => raw,
            (Listing::Bulk { .. }, None) => return Err(PokedexError::not_found("mock", id)),
        };
        Ok(Resolved {
            id,
            raw,
            attachment: None,
        })
    }

    fn normalize(&self, resolved: Resolved) -> Result<Record> {
        let id = resolved.id;
        let name = resolved
            .raw
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| PokedexError::malformed(Some(id), "missing required field 'name'"))?;
        let hp = resolved.raw.get("hp").and_then(Value::as_i64);
        Ok(Record::new(id).with("name", name).with("hp", hp))
    }
}

/// A [`TableStore`] wrapper that counts existence checks.
///
/// With `stale_reads`, every check reports the id as absent, as if another
/// writer stored the row right after the check ran.
pub(crate) struct CountingStore<'a> {
    inner: TableStore<'a>,
    stale_reads: bool,
    exists_calls: AtomicU64,
}

impl<'a> CountingStore<'a> {
    pub(crate) fn new(inner: TableStore<'a>) -> Self {
        Self {
            inner,
            stale_reads: false,
            exists_calls: AtomicU64::new(0),
        }
    }

    pub(crate) fn stale_reads(mut self) -> Self {
        self.stale_reads = true;
        self
    }

    pub(crate) fn exists_calls(&self) -> u64 {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

impl RecordStore for CountingStore<'_> {
    fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    async fn exists(&self, id: RecordId) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.stale_reads {
            return Ok(false);
        }
        self.inner.exists(id).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn upsert(&self, record: &Record, mode: UpsertMode) -> Result<bool> {
        self.inner.upsert(record, mode).await
    }

    async fn upsert_many(&self, records: &[Record], mode: UpsertMode) -> Result<u64> {
        self.inner.upsert_many(records, mode).await
    }

    async fn existing_ids(&self, ids: &[RecordId]) -> Result<HashSet<RecordId>> {
        if self.stale_reads {
            return Ok(HashSet::new());
        }
        self.inner.existing_ids(ids).await
    }
}
