//! Ingestion runs and statistics reports for the Pokédex store.
//!
//! This crate ties a [`pokedex_sources::RecordSource`] to a
//! [`pokedex_storage::RecordStore`] through the [`ingest::IncrementalIngestor`],
//! and computes the comparison reports over the populated tables.

pub mod ingest;
pub mod progress;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;
