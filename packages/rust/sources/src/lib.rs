//! External record sources and their adapters.
//!
//! This crate provides:
//! - [`RecordSource`] — the seam between an ingestion run and an external source
//! - [`PokeApiSource`] — PokeAPI, requested one id at a time over a range
//! - [`PogoApiSource`] — PoGoAPI, one bulk JSON document filtered locally
//! - [`BulbapediaSource`] — the Bulbapedia Pokédex list, scraped for sprites
//! - [`build_client`] — the HTTP client shared by all of them

mod bulbapedia;
mod fields;
mod http;
mod pogo;
mod pokeapi;

use pokedex_shared::{RawRecord, Record, RecordId, Result};
use pokedex_storage::TableSpec;

pub use bulbapedia::BulbapediaSource;
pub use http::build_client;
pub use pogo::PogoApiSource;
pub use pokeapi::PokeApiSource;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A candidate record announced by a source listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: RecordId,
    /// Fields already known from the listing (bulk sources only).
    pub raw: Option<RawRecord>,
}

/// How a source enumerates its candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// All candidates fetched in one request, to be filtered locally.
    Bulk {
        candidates: Vec<Candidate>,
        /// Listing entries dropped because they carried no usable id.
        unaddressable: u64,
    },
    /// Identifiers `start..=end`, each requiring its own request.
    Range { start: RecordId, end: RecordId },
}

/// Raw data for one candidate, ready for normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub id: RecordId,
    pub raw: RawRecord,
    /// Binary payload downloaded alongside the fields (sprite image bytes).
    pub attachment: Option<Vec<u8>>,
}

/// An external source of records for one target table.
///
/// Error contract for implementations:
/// - `listing` failures end the run.
/// - `resolve`/`normalize` return [`pokedex_shared::PokedexError::NotFound`] or
///   [`pokedex_shared::PokedexError::MalformedRecord`] for records to skip;
///   any other error ends the run.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    /// Short source name for logs and run history.
    fn name(&self) -> &str;

    /// Table the normalized records belong to.
    fn target(&self) -> &'static TableSpec;

    /// Enumerate candidates. Bulk sources fetch their whole document here.
    async fn listing(&self) -> Result<Listing>;

    /// Obtain the raw data for a candidate not yet in the store.
    async fn resolve(&self, candidate: Candidate) -> Result<Resolved>;

    /// Map raw source fields onto the target table's columns.
    fn normalize(&self, resolved: Resolved) -> Result<Record>;
}
