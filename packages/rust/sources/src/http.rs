//! Shared HTTP client and request helpers.
//!
//! Every source issues plain sequential GETs through one [`Client`]. There is
//! a single attempt per request; timeouts come from the client configuration.

use std::time::Duration;

use pokedex_shared::{HttpConfig, PokedexError, RecordId, Result};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

/// Default User-Agent string for source requests.
const USER_AGENT: &str = concat!("pokedex/", env!("CARGO_PKG_VERSION"));

/// Build the client shared by all sources of one command.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_deref().unwrap_or(USER_AGENT))
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| PokedexError::Transport(format!("failed to build HTTP client: {e}")))
}

/// GET a listing document. Any failure here ends the run.
pub(crate) async fn get_listing(client: &Client, url: &Url) -> Result<Response> {
    debug!(%url, "fetching listing");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| PokedexError::Transport(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PokedexError::Transport(format!("{url}: HTTP {status}")));
    }
    Ok(response)
}

/// GET a per-record resource.
///
/// Connection failures are fatal ([`PokedexError::Transport`]). A 404 or any
/// other non-success status means the source has nothing usable for `id`
/// and maps to [`PokedexError::NotFound`].
pub(crate) async fn get_detail(
    client: &Client,
    url: &Url,
    source_name: &str,
    id: RecordId,
) -> Result<Response> {
    debug!(%url, id, "fetching detail");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| PokedexError::Transport(format!("{url}: {e}")))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PokedexError::not_found(source_name, id));
    }
    if !status.is_success() {
        warn!(%url, id, %status, "detail request failed, skipping record");
        return Err(PokedexError::not_found(source_name, id));
    }
    Ok(response)
}
