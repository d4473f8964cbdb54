//! Bulbapedia adapter: scrapes the National Pokédex list for sprite images.
//!
//! The list page is fetched once and every table row shaped like
//! `<td>#0001</td><td><img src=…></td><td><a>Bulbasaur</a></td>…` becomes a
//! candidate. Resolving a candidate downloads its sprite.

use std::sync::LazyLock;

use pokedex_shared::{FieldValue, PokedexError, RawRecord, Record, RecordId, Result, SourcesConfig};
use pokedex_storage::{POKEMON_IMAGES, TableSpec};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::fields::require_text;
use crate::http::{get_detail, get_listing};
use crate::{Candidate, Listing, RecordSource, Resolved};

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());

/// Dex number cell text, e.g. `#0001`.
static DEX_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#(\d{1,5})$").unwrap());

/// Scraped source for Pokémon sprite images.
pub struct BulbapediaSource {
    client: Client,
    list_url: Url,
}

impl BulbapediaSource {
    pub fn new(client: Client, list_url: &str) -> Result<Self> {
        let list_url = Url::parse(list_url).map_err(|e| {
            PokedexError::config(format!("invalid Bulbapedia URL '{list_url}': {e}"))
        })?;
        Ok(Self { client, list_url })
    }

    pub fn from_config(client: Client, config: &SourcesConfig) -> Result<Self> {
        Self::new(client, &config.bulbapedia_list_url)
    }
}

impl RecordSource for BulbapediaSource {
    fn name(&self) -> &str {
        "bulbapedia"
    }

    fn target(&self) -> &'static TableSpec {
        &POKEMON_IMAGES
    }

    async fn listing(&self) -> Result<Listing> {
        let response = get_listing(&self.client, &self.list_url).await?;
        let body = response.text().await.map_err(|e| {
            PokedexError::Transport(format!("{}: body read failed: {e}", self.list_url))
        })?;

        let doc = Html::parse_document(&body);
        let candidates = extract_rows(&doc, &self.list_url);
        debug!(rows = candidates.len(), "parsed Pokédex list");

        Ok(Listing::Bulk {
            candidates,
            unaddressable: 0,
        })
    }

    async fn resolve(&self, candidate: Candidate) -> Result<Resolved> {
        let id = candidate.id;
        let raw = candidate
            .raw
            .ok_or_else(|| PokedexError::not_found(self.name(), id))?;

        // A row without a name cannot be stored; skip the download.
        require_text(&raw, "name", id)?;

        let image_url = raw
            .get("image_url")
            .and_then(Value::as_str)
            .ok_or_else(|| PokedexError::malformed(Some(id), "no image in list row"))?;
        let image_url = Url::parse(image_url)
            .map_err(|e| PokedexError::malformed(Some(id), format!("bad image URL: {e}")))?;

        let response = get_detail(&self.client, &image_url, self.name(), id).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PokedexError::Transport(format!("{image_url}: body read failed: {e}")))?;

        Ok(Resolved {
            id,
            raw,
            attachment: Some(bytes.to_vec()),
        })
    }

    fn normalize(&self, resolved: Resolved) -> Result<Record> {
        let Resolved {
            id,
            raw,
            attachment,
        } = resolved;
        let name = require_text(&raw, "name", id)?;
        let image = attachment
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| PokedexError::malformed(Some(id), "empty image download"))?;
        let image_url = raw.get("image_url").and_then(Value::as_str).map(String::from);

        Ok(Record::new(id)
            .with("name", name)
            .with("image_url", image_url.map_or(FieldValue::Null, Into::into))
            .with("image", image))
    }
}

/// Extract one candidate per Pokédex table row.
///
/// Rows need at least three cells and a `#NNNN` first cell; anything else
/// (headers, navigation tables) is ignored. Name and image URL are left out
/// of the raw record when missing so that resolution can reject the row.
fn extract_rows(doc: &Html, page_url: &Url) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for row in doc.select(&ROW_SEL) {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL_SEL).collect();
        if cells.len() < 3 {
            continue;
        }

        let number = cell_text(&cells[0]);
        let Some(id) = DEX_NUMBER
            .captures(&number)
            .and_then(|c| c[1].parse::<RecordId>().ok())
        else {
            continue;
        };

        let mut raw = RawRecord::new();
        raw.insert("id".into(), Value::from(id));

        if let Some(name) = cells[2]
            .select(&LINK_SEL)
            .next()
            .map(|a| cell_text(&a))
            .filter(|n| !n.is_empty())
        {
            raw.insert("name".into(), Value::String(name));
        }

        if let Some(src) = cells[1]
            .select(&IMG_SEL)
            .next()
            .and_then(|img| img.value().attr("src"))
        {
            if let Some(resolved) = image_url(page_url, src) {
                raw.insert("image_url".into(), Value::String(resolved.to_string()));
            }
        }

        candidates.push(Candidate { id, raw: Some(raw) });
    }

    candidates
}

/// Absolute sprite URL. Protocol-relative sources (`//archives…`) are always
/// fetched over https; relative ones resolve against the list page.
fn image_url(page_url: &Url, src: &str) -> Option<Url> {
    match src.strip_prefix("//") {
        Some(rest) => Url::parse(&format!("https://{rest}")).ok(),
        None => page_url.join(src).ok(),
    }
}

fn cell_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
