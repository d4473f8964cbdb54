//! PoGoAPI adapter: one bulk `pokemon_stats.json` document, filtered locally.

use pokedex_shared::{PokedexError, Record, Result, SourcesConfig};
use pokedex_storage::{POKEMON_GO_STATS, TableSpec};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::fields::{coerce_int, require_int};
use crate::http::get_listing;
use crate::{Candidate, Listing, RecordSource, Resolved};

/// Bulk source for Pokémon GO base stats.
pub struct PogoApiSource {
    client: Client,
    stats_url: Url,
}

impl PogoApiSource {
    pub fn new(client: Client, stats_url: &str) -> Result<Self> {
        let stats_url = Url::parse(stats_url)
            .map_err(|e| PokedexError::config(format!("invalid PoGoAPI URL '{stats_url}': {e}")))?;
        Ok(Self { client, stats_url })
    }

    pub fn from_config(client: Client, config: &SourcesConfig) -> Result<Self> {
        Self::new(client, &config.pogo_stats_url)
    }
}

impl RecordSource for PogoApiSource {
    fn name(&self) -> &str {
        "pogoapi"
    }

    fn target(&self) -> &'static TableSpec {
        &POKEMON_GO_STATS
    }

    async fn listing(&self) -> Result<Listing> {
        let response = get_listing(&self.client, &self.stats_url).await?;
        let body: Value = response.json().await.map_err(|e| {
            PokedexError::Transport(format!("{}: invalid JSON listing: {e}", self.stats_url))
        })?;
        candidates_from_listing(body).map_err(|kind| {
            PokedexError::Transport(format!(
                "{}: expected a JSON array or object, got {kind}",
                self.stats_url
            ))
        })
    }

    async fn resolve(&self, candidate: Candidate) -> Result<Resolved> {
        // Everything was already fetched with the listing.
        let raw = candidate
            .raw
            .ok_or_else(|| PokedexError::not_found(self.name(), candidate.id))?;
        Ok(Resolved {
            id: candidate.id,
            raw,
            attachment: None,
        })
    }

    fn normalize(&self, resolved: Resolved) -> Result<Record> {
        let Resolved { id, raw, .. } = resolved;
        Ok(Record::new(id)
            .with("base_attack", require_int(&raw, "base_attack", Some(id))?)
            .with("base_defense", require_int(&raw, "base_defense", Some(id))?)
            .with("base_stamina", require_int(&raw, "base_stamina", Some(id))?))
    }
}

/// Split a PoGoAPI document into candidates.
///
/// The endpoint returns an array; older mirrors return an object keyed by
/// id, whose values are used in key order. Any other document is rejected
/// with the kind of JSON value that was found.
fn candidates_from_listing(body: Value) -> std::result::Result<Listing, &'static str> {
    let entries: Vec<Value> = match body {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Null => return Err("null"),
        Value::Bool(_) => return Err("a boolean"),
        Value::Number(_) => return Err("a number"),
        Value::String(_) => return Err("a string"),
    };

    let mut candidates = Vec::with_capacity(entries.len());
    let mut unaddressable = 0;
    for entry in entries {
        let Value::Object(raw) = entry else {
            unaddressable += 1;
            continue;
        };
        match raw.get("pokemon_id").and_then(coerce_int) {
            Some(id) => candidates.push(Candidate { id, raw: Some(raw) }),
            None => {
                let entry = Value::Object(raw);
                warn!(%entry, "listing entry without pokemon_id");
                unaddressable += 1;
            }
        }
    }

    Ok(Listing::Bulk {
        candidates,
        unaddressable,
    })
}
