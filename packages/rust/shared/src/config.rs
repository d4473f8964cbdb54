//! Application configuration for the Pokédex ingester.
//!
//! User config lives at `~/.pokedex/pokedex.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PokedexError, Result};
use crate::types::{BudgetConfig, UpsertMode};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pokedex.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pokedex";

// ---------------------------------------------------------------------------
// Config structs (matching pokedex.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-run ingestion limits.
    #[serde(default)]
    pub budget: BudgetSection,

    /// External source endpoints.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Statistics report defaults.
    #[serde(default)]
    pub reports: ReportsConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pokemon.db")
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header; defaults to `pokedex/<version>` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[budget]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSection {
    /// Maximum new records per run.
    #[serde(default = "default_per_run_cap")]
    pub per_run_cap: u64,

    /// Optional ceiling on total store size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cap: Option<u64>,

    /// Write conflict handling. Ids already stored are skipped before any
    /// request, so `replace` only affects rows stored concurrently.
    #[serde(default)]
    pub upsert_mode: UpsertMode,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            per_run_cap: default_per_run_cap(),
            total_cap: None,
            upsert_mode: UpsertMode::default(),
        }
    }
}

impl BudgetSection {
    /// The run budget described by this section.
    pub fn budget(&self) -> BudgetConfig {
        BudgetConfig {
            per_run_cap: self.per_run_cap,
            total_cap: self.total_cap,
        }
    }
}

fn default_per_run_cap() -> u64 {
    25
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// PokeAPI v2 base URL (per-id resources live under `pokemon/{id}`).
    #[serde(default = "default_pokeapi_base_url")]
    pub pokeapi_base_url: String,

    /// First National Pokédex id to request.
    #[serde(default = "default_first_id")]
    pub pokeapi_first_id: i64,

    /// Last National Pokédex id to request (inclusive).
    #[serde(default = "default_last_id")]
    pub pokeapi_last_id: i64,

    /// PoGoAPI bulk stats endpoint.
    #[serde(default = "default_pogo_stats_url")]
    pub pogo_stats_url: String,

    /// Bulbapedia National Pokédex list page.
    #[serde(default = "default_bulbapedia_list_url")]
    pub bulbapedia_list_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pokeapi_base_url: default_pokeapi_base_url(),
            pokeapi_first_id: default_first_id(),
            pokeapi_last_id: default_last_id(),
            pogo_stats_url: default_pogo_stats_url(),
            bulbapedia_list_url: default_bulbapedia_list_url(),
        }
    }
}

fn default_pokeapi_base_url() -> String {
    "https://pokeapi.co/api/v2/".into()
}
fn default_first_id() -> i64 {
    1
}
fn default_last_id() -> i64 {
    1025
}
fn default_pogo_stats_url() -> String {
    "https://pogoapi.net/api/v1/pokemon_stats.json".into()
}
fn default_bulbapedia_list_url() -> String {
    "https://bulbapedia.bulbagarden.net/wiki/List_of_Pok%C3%A9mon_by_National_Pok%C3%A9dex_number"
        .into()
}

/// `[reports]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Directory report JSON files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// The pair compared by `report compare`.
    #[serde(default = "default_compare_names")]
    pub compare_names: Vec<String>,

    /// Ordered evolution line used by `report evolution`.
    #[serde(default = "default_evolution_names")]
    pub evolution_names: Vec<String>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            compare_names: default_compare_names(),
            evolution_names: default_evolution_names(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_compare_names() -> Vec<String> {
    vec!["bulbasaur".into(), "ivysaur".into()]
}
fn default_evolution_names() -> Vec<String> {
    vec!["bulbasaur".into(), "ivysaur".into(), "venusaur".into()]
}

impl AppConfig {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        let sources = &self.sources;
        if sources.pokeapi_first_id > sources.pokeapi_last_id {
            return Err(PokedexError::config(format!(
                "pokeapi_first_id ({}) is greater than pokeapi_last_id ({})",
                sources.pokeapi_first_id, sources.pokeapi_last_id
            )));
        }
        for (key, value) in [
            ("pokeapi_base_url", &sources.pokeapi_base_url),
            ("pogo_stats_url", &sources.pogo_stats_url),
            ("bulbapedia_list_url", &sources.bulbapedia_list_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| PokedexError::config(format!("invalid {key} '{value}': {e}")))?;
        }
        if self.http.timeout_secs == 0 {
            return Err(PokedexError::config("http.timeout_secs must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pokedex/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| PokedexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pokedex/pokedex.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PokedexError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| PokedexError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PokedexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PokedexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PokedexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("pokemon.db"));
        assert!(toml_str.contains("pogoapi.net"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.budget.per_run_cap, 25);
        assert_eq!(parsed.budget.upsert_mode, UpsertMode::InsertIfAbsent);
        assert_eq!(parsed.sources.pokeapi_last_id, 1025);
        parsed.validate().expect("defaults validate");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[database]
path = "/tmp/dex.db"

[budget]
per_run_cap = 100
total_cap = 76
upsert_mode = "replace"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.database.path, PathBuf::from("/tmp/dex.db"));
        assert_eq!(
            config.budget.budget(),
            BudgetConfig {
                per_run_cap: 100,
                total_cap: Some(76),
            }
        );
        assert_eq!(config.budget.upsert_mode, UpsertMode::Replace);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.reports.evolution_names.len(), 3);
    }

    #[test]
    fn inverted_id_range_rejected() {
        let mut config = AppConfig::default();
        config.sources.pokeapi_first_id = 10;
        config.sources.pokeapi_last_id = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pokeapi_first_id"));
    }

    #[test]
    fn invalid_url_rejected() {
        let mut config = AppConfig::default();
        config.sources.pogo_stats_url = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pogo_stats_url"));
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join(format!("pokedex-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("pokedex.toml");
        std::fs::write(&path, "[http]\ntimeout_secs = 5\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.http.timeout_secs, 5);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
