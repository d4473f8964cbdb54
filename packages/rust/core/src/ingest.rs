//! Incremental ingestion: list a source, skip stored ids, add new records
//! until the budget or the source runs out.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use pokedex_shared::{
    BudgetConfig, IngestionBudget, PokedexError, RecordId, Result, UpsertMode,
};
use pokedex_sources::{Candidate, Listing, RecordSource};
use pokedex_storage::{RecordStore, Storage};

use crate::progress::{ProgressReporter, SkipReason};

// ---------------------------------------------------------------------------
// Options & report
// ---------------------------------------------------------------------------

/// Per-run settings for an [`IncrementalIngestor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    pub budget: BudgetConfig,
    /// Conflict handling at write time. Ids found by the existence check are
    /// skipped in every mode, so `Replace` only affects a row another writer
    /// stored after that check.
    pub mode: UpsertMode,
}

/// Why a run stopped adding records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    SourceExhausted,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BudgetExhausted => "budget_exhausted",
            Self::SourceExhausted => "source_exhausted",
        }
    }
}

/// Outcome of a completed ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Run history id, when the run was recorded.
    pub run_id: Option<String>,
    pub source: String,
    pub table: String,
    pub added: u64,
    pub skipped_existing: u64,
    pub skipped_not_found: u64,
    pub skipped_malformed: u64,
    /// Store size after the run.
    pub store_count: u64,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
}

impl IngestReport {
    /// JSON summary stored in the run history.
    pub fn to_stats(&self) -> serde_json::Value {
        json!({
            "status": "completed",
            "added": self.added,
            "skipped_existing": self.skipped_existing,
            "skipped_not_found": self.skipped_not_found,
            "skipped_malformed": self.skipped_malformed,
            "store_count": self.store_count,
            "stop_reason": self.stop_reason.as_str(),
            "elapsed_ms": self.elapsed.as_millis() as u64,
        })
    }
}

/// Counters accumulated while a run is in progress.
#[derive(Debug, Default)]
struct Tally {
    added: u64,
    skipped_existing: u64,
    skipped_not_found: u64,
    skipped_malformed: u64,
}

impl Tally {
    fn skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Existing => self.skipped_existing += 1,
            SkipReason::NotFound => self.skipped_not_found += 1,
            SkipReason::Malformed => self.skipped_malformed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Moves records from one source into one store.
///
/// Candidates are visited in ascending id order. Ids already in the store
/// are skipped before any per-id request is made. Each write commits on its
/// own, so an aborted run keeps what it added.
pub struct IncrementalIngestor<'a, S, T> {
    source: &'a S,
    store: &'a T,
    history: Option<&'a Storage>,
    options: IngestOptions,
}

impl<'a, S: RecordSource, T: RecordStore> IncrementalIngestor<'a, S, T> {
    pub fn new(source: &'a S, store: &'a T, options: IngestOptions) -> Self {
        Self {
            source,
            store,
            history: None,
            options,
        }
    }

    /// Record the run in `storage`'s ingest history.
    pub fn with_history(mut self, storage: &'a Storage) -> Self {
        self.history = Some(storage);
        self
    }

    /// Run once.
    ///
    /// Not-found and malformed candidates are counted and skipped. Any other
    /// error ends the run; the history entry is then closed as failed.
    #[instrument(skip_all, fields(source = %self.source.name(), table = %self.store.table_name()))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<IngestReport> {
        let start = Instant::now();

        let target = self.source.target().name;
        if target != self.store.table_name() {
            return Err(PokedexError::validation(format!(
                "source '{}' writes '{target}', store is '{}'",
                self.source.name(),
                self.store.table_name()
            )));
        }

        let run_id = match self.history {
            Some(storage) => Some(
                storage
                    .insert_ingest_run(self.source.name(), self.store.table_name())
                    .await?,
            ),
            None => None,
        };

        info!(
            per_run_cap = self.options.budget.per_run_cap,
            total_cap = ?self.options.budget.total_cap,
            mode = ?self.options.mode,
            "starting ingestion run"
        );

        let mut tally = Tally::default();
        let stop_reason = match self.execute(&mut tally, progress).await {
            Ok(reason) => reason,
            Err(e) => {
                warn!(error = %e, added = tally.added, "ingestion run failed");
                self.close_failed(run_id.as_deref(), &tally, &e).await;
                return Err(e);
            }
        };

        let store_count = self.store.count().await?;
        let report = IngestReport {
            run_id,
            source: self.source.name().to_string(),
            table: self.store.table_name().to_string(),
            added: tally.added,
            skipped_existing: tally.skipped_existing,
            skipped_not_found: tally.skipped_not_found,
            skipped_malformed: tally.skipped_malformed,
            store_count,
            stop_reason,
            elapsed: start.elapsed(),
        };

        if let (Some(storage), Some(id)) = (self.history, report.run_id.as_deref()) {
            storage
                .finish_ingest_run(id, &report.to_stats().to_string())
                .await?;
        }

        progress.done(&report);

        info!(
            added = report.added,
            skipped_existing = report.skipped_existing,
            skipped_not_found = report.skipped_not_found,
            skipped_malformed = report.skipped_malformed,
            store_count = report.store_count,
            stop_reason = report.stop_reason.as_str(),
            elapsed_ms = report.elapsed.as_millis(),
            "ingestion run complete"
        );

        Ok(report)
    }

    async fn execute(
        &self,
        tally: &mut Tally,
        progress: &dyn ProgressReporter,
    ) -> Result<StopReason> {
        let baseline = self.store.count().await?;
        let mut budget = IngestionBudget::start(self.options.budget, baseline);
        if budget.is_exhausted() {
            info!(store_count = baseline, "budget exhausted before start");
            return Ok(StopReason::BudgetExhausted);
        }

        progress.phase(&format!("Listing {}", self.source.name()));
        let listing = self.source.listing().await?;

        progress.phase(&format!("Ingesting into {}", self.store.table_name()));
        match listing {
            Listing::Range { start, end } => {
                debug!(start, end, "walking id range");
                for id in start..=end {
                    if self.store.exists(id).await? {
                        debug!(id, "already stored");
                        self.skip(id, SkipReason::Existing, tally, progress);
                        continue;
                    }
                    let candidate = Candidate { id, raw: None };
                    self.step(candidate, &mut budget, tally, progress).await?;
                    if budget.is_exhausted() {
                        return Ok(StopReason::BudgetExhausted);
                    }
                }
            }
            Listing::Bulk {
                mut candidates,
                unaddressable,
            } => {
                if unaddressable > 0 {
                    warn!(unaddressable, "listing entries without an id skipped");
                    tally.skipped_malformed += unaddressable;
                }
                // Stable, so the first of several entries sharing an id wins.
                candidates.sort_by_key(|c| c.id);

                let ids: Vec<RecordId> = candidates.iter().map(|c| c.id).collect();
                let mut stored: HashSet<RecordId> = self.store.existing_ids(&ids).await?;
                debug!(
                    candidates = candidates.len(),
                    already_stored = stored.len(),
                    "filtering bulk listing"
                );

                for candidate in candidates {
                    let id = candidate.id;
                    if stored.contains(&id) {
                        debug!(id, "already stored");
                        self.skip(id, SkipReason::Existing, tally, progress);
                        continue;
                    }
                    if self.step(candidate, &mut budget, tally, progress).await? {
                        stored.insert(id);
                    }
                    if budget.is_exhausted() {
                        return Ok(StopReason::BudgetExhausted);
                    }
                }
            }
        }

        Ok(StopReason::SourceExhausted)
    }

    /// Handle one candidate known to be absent from the store.
    ///
    /// Returns `true` if the id is now stored, by this run or another writer.
    async fn step(
        &self,
        candidate: Candidate,
        budget: &mut IngestionBudget,
        tally: &mut Tally,
        progress: &dyn ProgressReporter,
    ) -> Result<bool> {
        let id = candidate.id;

        match self.land(candidate).await {
            Ok(Some(label)) => {
                budget.record_added();
                tally.added += 1;
                info!(id, name = %label, added = budget.added(), "record added");
                progress.record_added(&label, budget.added(), self.options.budget.per_run_cap);
                Ok(true)
            }
            // Written by someone else since the existence check.
            Ok(None) => {
                self.skip(id, SkipReason::Existing, tally, progress);
                Ok(true)
            }
            Err(PokedexError::NotFound { .. }) => {
                debug!(id, "not found at source");
                self.skip(id, SkipReason::NotFound, tally, progress);
                Ok(false)
            }
            Err(e @ PokedexError::MalformedRecord { .. }) => {
                warn!(id, error = %e, "skipping malformed record");
                self.skip(id, SkipReason::Malformed, tally, progress);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve, normalize and write one candidate.
    ///
    /// Returns the record label if a row was written.
    async fn land(&self, candidate: Candidate) -> Result<Option<String>> {
        let resolved = self.source.resolve(candidate).await?;
        let record = self.source.normalize(resolved)?;
        let written = self.store.upsert(&record, self.options.mode).await?;
        Ok(written.then(|| record.label()))
    }

    fn skip(
        &self,
        id: RecordId,
        reason: SkipReason,
        tally: &mut Tally,
        progress: &dyn ProgressReporter,
    ) {
        tally.skip(reason);
        progress.record_skipped(id, reason);
    }

    async fn close_failed(&self, run_id: Option<&str>, tally: &Tally, error: &PokedexError) {
        let (Some(storage), Some(id)) = (self.history, run_id) else {
            return;
        };
        let stats = json!({
            "status": "failed",
            "error": error.to_string(),
            "added": tally.added,
            "skipped_existing": tally.skipped_existing,
            "skipped_not_found": tally.skipped_not_found,
            "skipped_malformed": tally.skipped_malformed,
        });
        if let Err(e) = storage.finish_ingest_run(id, &stats.to_string()).await {
            warn!(run_id = id, error = %e, "could not close failed ingest run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::testing::{CountingStore, MockSource, raw_pokemon, temp_storage};
    use pokedex_shared::{FieldValue, HttpConfig, Record};
    use pokedex_sources::{PogoApiSource, PokeApiSource, build_client};
    use pokedex_storage::{POKEMON, POKEMON_GO_STATS, TableStore};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(per_run_cap: u64, total_cap: Option<u64>) -> IngestOptions {
        IngestOptions {
            budget: BudgetConfig {
                per_run_cap,
                total_cap,
            },
            mode: UpsertMode::InsertIfAbsent,
        }
    }

    fn replacing(per_run_cap: u64) -> IngestOptions {
        IngestOptions {
            mode: UpsertMode::Replace,
            ..options(per_run_cap, None)
        }
    }

    async fn seed(store: &TableStore<'_>, ids: impl IntoIterator<Item = RecordId>) {
        let records: Vec<Record> = ids
            .into_iter()
            .map(|id| Record::new(id).with("name", format!("seed-{id}")))
            .collect();
        store
            .upsert_many(&records, UpsertMode::InsertIfAbsent)
            .await
            .expect("seed");
    }

    #[tokio::test]
    async fn added_never_exceeds_per_run_cap() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        let source = MockSource::range(1, 50);

        let report = IncrementalIngestor::new(&source, &store, options(10, None))
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(report.added, 10);
        assert_eq!(report.store_count, 10);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(source.resolved_ids(), (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn rerun_on_full_store_adds_nothing() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        let source = MockSource::range(1, 5);

        let first = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .unwrap();
        assert_eq!(first.added, 5);
        assert_eq!(first.stop_reason, StopReason::SourceExhausted);

        let second = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped_existing, 5);
        assert_eq!(second.store_count, 5);
        // No detail requests on the second pass.
        assert_eq!(source.resolved_ids().len(), 5);
    }

    #[tokio::test]
    async fn stored_ids_are_never_requested() {
        let server = MockServer::start().await;
        for id in [1, 3] {
            Mock::given(method("GET"))
                .and(path(format!("/api/v2/pokemon/{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "name": format!("mon-{id}"),
                    "stats": [{"base_stat": 40 + id, "stat": {"name": "hp"}}]
                })))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/api/v2/pokemon/2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        seed(&store, [2]).await;

        let client = build_client(&HttpConfig::default()).unwrap();
        let source =
            PokeApiSource::new(client, &format!("{}/api/v2", server.uri()), 1, 3).unwrap();

        let report = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .expect("run");

        assert_eq!(report.added, 2);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.store_count, 3);

        let stored = storage.get_record(&POKEMON, 3).await.unwrap().unwrap();
        assert_eq!(stored.get("hp"), Some(&FieldValue::Integer(43)));
        assert_eq!(stored.get("attack"), Some(&FieldValue::Null));
        let untouched = storage.get_record(&POKEMON, 2).await.unwrap().unwrap();
        assert_eq!(untouched.label(), "seed-2");
    }

    #[tokio::test]
    async fn total_cap_limits_additions() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        seed(&store, 1..=75).await;
        let source = MockSource::range(1, 200);

        let report = IncrementalIngestor::new(&source, &store, options(25, Some(76)))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.store_count, 76);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(source.resolved_ids(), [76]);
    }

    #[tokio::test]
    async fn store_at_total_cap_skips_listing() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        seed(&store, 1..=3).await;
        let source = MockSource::range(1, 10).failing_listing();

        let report = IncrementalIngestor::new(&source, &store, options(25, Some(3)))
            .run(&SilentProgress)
            .await
            .expect("exhausted budget must not touch the source");

        assert_eq!(report.added, 0);
        assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
    }

    #[tokio::test]
    async fn malformed_and_missing_records_are_skipped() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        let source = MockSource::bulk([
            (4, Some(raw_pokemon("charmander"))),
            (1, Some(raw_pokemon("bulbasaur"))),
            (2, Some(json!({"hp": 60}).as_object().cloned().unwrap())),
            (3, None),
        ])
        .with_unaddressable(2);

        let report = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .expect("run continues past bad records");

        assert_eq!(report.added, 2);
        assert_eq!(report.skipped_malformed, 3);
        assert_eq!(report.skipped_not_found, 1);
        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(source.resolved_ids(), [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn duplicate_bulk_ids_keep_first() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        let source = MockSource::bulk([
            (1, Some(raw_pokemon("bulbasaur"))),
            (1, Some(raw_pokemon("bulbasaur-alt"))),
        ]);

        let report = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_existing, 1);
        let stored = storage.get_record(&POKEMON, 1).await.unwrap().unwrap();
        assert_eq!(stored.label(), "bulbasaur");
    }

    #[tokio::test]
    async fn bulk_listing_checks_stored_ids_in_one_query() {
        let storage = temp_storage().await;
        let table = TableStore::new(&storage, &POKEMON);
        seed(&table, 1..=3).await;
        let store = CountingStore::new(table);
        let source = MockSource::bulk([
            (5, Some(raw_pokemon("charmeleon"))),
            (1, Some(raw_pokemon("bulbasaur"))),
            (4, Some(raw_pokemon("charmander"))),
            (2, Some(raw_pokemon("ivysaur"))),
            (4, Some(raw_pokemon("charmander-alt"))),
            (3, Some(raw_pokemon("venusaur"))),
        ]);

        let report = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 2);
        assert_eq!(report.skipped_existing, 4);
        assert_eq!(store.exists_calls(), 0);
        assert_eq!(source.resolved_ids(), [4, 5]);
        let stored = storage.get_record(&POKEMON, 4).await.unwrap().unwrap();
        assert_eq!(stored.label(), "charmander");
    }

    #[tokio::test]
    async fn range_listing_checks_each_id() {
        let storage = temp_storage().await;
        let table = TableStore::new(&storage, &POKEMON);
        seed(&table, [2]).await;
        let store = CountingStore::new(table);
        let source = MockSource::range(1, 4);

        let report = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 3);
        assert_eq!(store.exists_calls(), 4);
        assert_eq!(source.resolved_ids(), [1, 3, 4]);
    }

    #[tokio::test]
    async fn replace_overwrites_row_stored_after_check() {
        let storage = temp_storage().await;
        let table = TableStore::new(&storage, &POKEMON);
        seed(&table, [1]).await;
        let store = CountingStore::new(table).stale_reads();
        let source = MockSource::bulk([(1, Some(raw_pokemon("bulbasaur")))]);

        let report = IncrementalIngestor::new(&source, &store, replacing(25))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_existing, 0);
        assert_eq!(report.store_count, 1);
        let stored = storage.get_record(&POKEMON, 1).await.unwrap().unwrap();
        assert_eq!(stored.label(), "bulbasaur");
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_row_stored_after_check() {
        let storage = temp_storage().await;
        let table = TableStore::new(&storage, &POKEMON);
        seed(&table, [1]).await;
        let store = CountingStore::new(table).stale_reads();
        let source = MockSource::bulk([(1, Some(raw_pokemon("bulbasaur")))]);

        let report = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 0);
        assert_eq!(report.skipped_existing, 1);
        let stored = storage.get_record(&POKEMON, 1).await.unwrap().unwrap();
        assert_eq!(stored.label(), "seed-1");
    }

    #[tokio::test]
    async fn replace_still_skips_ids_seen_as_stored() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        seed(&store, [1]).await;
        let source = MockSource::bulk([
            (1, Some(raw_pokemon("bulbasaur"))),
            (2, Some(raw_pokemon("ivysaur"))),
        ]);

        let report = IncrementalIngestor::new(&source, &store, replacing(25))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(source.resolved_ids(), [2]);
        let stored = storage.get_record(&POKEMON, 1).await.unwrap().unwrap();
        assert_eq!(stored.label(), "seed-1");
    }

    #[tokio::test]
    async fn zero_per_run_cap_adds_nothing() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        let source = MockSource::range(1, 3);

        let report = IncrementalIngestor::new(&source, &store, options(0, None))
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 0);
        assert!(source.resolved_ids().is_empty());
    }

    #[tokio::test]
    async fn fatal_error_midway_keeps_earlier_records() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON);
        let source = MockSource::range(1, 5).fatal_at(3);

        let err = IncrementalIngestor::new(&source, &store, options(25, None))
            .with_history(&storage)
            .run(&SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, PokedexError::Transport(_)));
        assert_eq!(store.count().await.unwrap(), 2);

        let runs = storage.recent_ingest_runs(1).await.unwrap();
        let stats = runs[0].stats.as_ref().expect("failed run is closed");
        assert_eq!(stats["status"], "failed");
        assert_eq!(stats["added"], 2);
    }

    #[tokio::test]
    async fn bulk_transport_failure_adds_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pokemon_stats.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON_GO_STATS);
        let earlier = Record::new(1)
            .with("base_attack", 118_i64)
            .with("base_defense", 111_i64)
            .with("base_stamina", 128_i64);
        store.upsert(&earlier, UpsertMode::InsertIfAbsent).await.unwrap();

        let client = build_client(&HttpConfig::default()).unwrap();
        let source = PogoApiSource::new(
            client,
            &format!("{}/api/v1/pokemon_stats.json", server.uri()),
        )
        .unwrap();

        let err = IncrementalIngestor::new(&source, &store, options(25, None))
            .with_history(&storage)
            .run(&SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, PokedexError::Transport(_)));
        assert_eq!(store.count().await.unwrap(), 1);
        let runs = storage.recent_ingest_runs(1).await.unwrap();
        assert_eq!(runs[0].stats.as_ref().unwrap()["status"], "failed");
    }

    #[tokio::test]
    async fn bulk_source_through_wiremock() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pokemon_stats.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"pokemon_id": 2, "base_attack": 151, "base_defense": 143, "base_stamina": 155},
                {"pokemon_id": 1, "base_attack": "118", "base_defense": "111", "base_stamina": "128"},
                {"pokemon_id": 3, "base_attack": 198, "base_defense": 189}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON_GO_STATS);
        let client = build_client(&HttpConfig::default()).unwrap();
        let source =
            PogoApiSource::new(client, &format!("{}/pokemon_stats.json", server.uri())).unwrap();

        let report = IncrementalIngestor::new(&source, &store, options(25, None))
            .with_history(&storage)
            .run(&SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.added, 2);
        assert_eq!(report.skipped_malformed, 1);
        let first = storage.get_record(&POKEMON_GO_STATS, 1).await.unwrap().unwrap();
        assert_eq!(first.get("base_attack"), Some(&FieldValue::Integer(118)));

        let runs = storage.recent_ingest_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(Some(&runs[0].id), report.run_id.as_ref());
        let stats = runs[0].stats.as_ref().unwrap();
        assert_eq!(stats["status"], "completed");
        assert_eq!(stats["added"], 2);
        assert_eq!(stats["stop_reason"], "source_exhausted");
    }

    #[tokio::test]
    async fn mismatched_table_is_rejected() {
        let storage = temp_storage().await;
        let store = TableStore::new(&storage, &POKEMON_GO_STATS);
        let source = MockSource::range(1, 3);

        let err = IncrementalIngestor::new(&source, &store, options(25, None))
            .run(&SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PokedexError::Validation { .. }));
    }
}
