//! PokeAPI v2 adapter: requests `pokemon/{id}` one identifier at a time.

use pokedex_shared::{PokedexError, RawRecord, Record, RecordId, Result, SourcesConfig};
use pokedex_storage::{POKEMON, TableSpec};
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::fields::{optional_int, require_text};
use crate::http::get_detail;
use crate::{Candidate, Listing, RecordSource, Resolved};

/// PokeAPI stat names and the `pokemon` columns they land in.
const STAT_COLUMNS: [(&str, &str); 6] = [
    ("hp", "hp"),
    ("attack", "attack"),
    ("defense", "defense"),
    ("special-attack", "special_attack"),
    ("special-defense", "special_defense"),
    ("speed", "speed"),
];

/// Range-walked source for main-series base stats.
pub struct PokeApiSource {
    client: Client,
    base_url: Url,
    first_id: RecordId,
    last_id: RecordId,
}

impl PokeApiSource {
    pub fn new(client: Client, base_url: &str, first_id: RecordId, last_id: RecordId) -> Result<Self> {
        if first_id > last_id {
            return Err(PokedexError::validation(format!(
                "empty id range {first_id}..={last_id}"
            )));
        }
        // `Url::join` drops the last path segment unless it ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| PokedexError::config(format!("invalid PokeAPI URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            base_url,
            first_id,
            last_id,
        })
    }

    pub fn from_config(client: Client, config: &SourcesConfig) -> Result<Self> {
        Self::new(
            client,
            &config.pokeapi_base_url,
            config.pokeapi_first_id,
            config.pokeapi_last_id,
        )
    }

    fn resource_url(&self, id: RecordId) -> Result<Url> {
        self.base_url
            .join(&format!("pokemon/{id}"))
            .map_err(|e| PokedexError::config(format!("cannot build PokeAPI URL for {id}: {e}")))
    }
}

impl RecordSource for PokeApiSource {
    fn name(&self) -> &str {
        "pokeapi"
    }

    fn target(&self) -> &'static TableSpec {
        &POKEMON
    }

    async fn listing(&self) -> Result<Listing> {
        Ok(Listing::Range {
            start: self.first_id,
            end: self.last_id,
        })
    }

    async fn resolve(&self, candidate: Candidate) -> Result<Resolved> {
        let id = candidate.id;
        let url = self.resource_url(id)?;
        let response = get_detail(&self.client, &url, self.name(), id).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| PokedexError::malformed(Some(id), format!("invalid JSON body: {e}")))?;

        match body {
            Value::Object(raw) => Ok(Resolved {
                id,
                raw,
                attachment: None,
            }),
            other => Err(PokedexError::malformed(
                Some(id),
                format!("expected a JSON object, got {}", json_kind(&other)),
            )),
        }
    }

    fn normalize(&self, resolved: Resolved) -> Result<Record> {
        let Resolved { id, raw, .. } = resolved;
        let name = require_text(&raw, "name", id)?;
        let stats = flatten_stats(&raw, id)?;

        let mut record = Record::new(id).with("name", name);
        for (stat_name, column) in STAT_COLUMNS {
            record = record.with(column, optional_int(&stats, stat_name, id)?);
        }
        Ok(record)
    }
}

/// Turn `stats: [{ base_stat, stat: { name } }]` into `{ name: base_stat }`.
///
/// A missing `stats` array yields an empty map (all stats absent).
fn flatten_stats(raw: &RawRecord, id: RecordId) -> Result<RawRecord> {
    let mut out = RawRecord::new();
    let Some(entries) = raw.get("stats") else {
        return Ok(out);
    };
    let entries = entries
        .as_array()
        .ok_or_else(|| PokedexError::malformed(Some(id), "'stats' is not an array"))?;

    for entry in entries {
        let Some(name) = entry.pointer("/stat/name").and_then(Value::as_str) else {
            continue;
        };
        let base_stat = entry.get("base_stat").cloned().unwrap_or(Value::Null);
        out.insert(name.to_string(), base_stat);
    }
    Ok(out)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
