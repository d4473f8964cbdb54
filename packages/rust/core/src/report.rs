//! Comparison statistics over the ingested tables.
//!
//! Each report is a serializable value; rendering (charts, tables) is left
//! to whoever consumes the JSON written by [`write_report`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use pokedex_shared::{PokedexError, Result};
use pokedex_storage::{AttackRow, BaseStats, Storage};

/// Main-series stat names, in display order.
pub const BASE_STAT_NAMES: [&str; 6] = [
    "hp",
    "attack",
    "defense",
    "special_attack",
    "special_defense",
    "speed",
];

const TREND_STAT_NAMES: [&str; 3] = ["hp", "attack", "defense"];

fn stat(stats: &BaseStats, name: &str) -> Option<i64> {
    match name {
        "hp" => stats.hp,
        "attack" => stats.attack,
        "defense" => stats.defense,
        "special_attack" => stats.special_attack,
        "special_defense" => stats.special_defense,
        "speed" => stats.speed,
        _ => None,
    }
}

fn mean(values: impl IntoIterator<Item = Option<i64>>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0_i64, 0_u32), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum as f64 / f64::from(n))
}

fn diff(from: Option<i64>, to: Option<i64>) -> Option<i64> {
    Some(to? - from?)
}

fn normalize_names(names: &[String]) -> Vec<String> {
    names.iter().map(|n| n.trim().to_lowercase()).collect()
}

// ---------------------------------------------------------------------------
// Attack comparison
// ---------------------------------------------------------------------------

/// Main-series attack (`attack + special_attack`) against GO base attack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackComparison {
    pub rows: Vec<AttackRow>,
    pub avg_pokemon_attack: Option<f64>,
    pub avg_go_base_attack: Option<f64>,
}

#[instrument(skip_all)]
pub async fn attack_comparison(storage: &Storage) -> Result<AttackComparison> {
    let rows = storage.attack_comparison_rows().await?;
    let report = AttackComparison {
        avg_pokemon_attack: mean(rows.iter().map(|r| r.pokemon_attack)),
        avg_go_base_attack: mean(rows.iter().map(|r| r.go_base_attack)),
        rows,
    };
    info!(rows = report.rows.len(), "attack comparison computed");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Two-Pokémon stat comparison
// ---------------------------------------------------------------------------

/// Base stats of two Pokémon side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatComparison {
    pub first: BaseStats,
    pub second: BaseStats,
    /// Per-stat mean of the two.
    pub averages: BTreeMap<&'static str, Option<f64>>,
    /// Per-stat `second - first`.
    pub differences: BTreeMap<&'static str, Option<i64>>,
}

/// Compare `names[0]` with `names[1]`. Both must be stored.
#[instrument(skip(storage))]
pub async fn compare_stats(storage: &Storage, names: &[String]) -> Result<StatComparison> {
    let names = normalize_names(names);
    let [first_name, second_name] = names.as_slice() else {
        return Err(PokedexError::validation(format!(
            "stat comparison needs exactly two names, got {}",
            names.len()
        )));
    };

    let found = storage.base_stats_by_names(&names).await?;
    let lookup = |name: &str| {
        found
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| PokedexError::validation(format!("no stored Pokémon named '{name}'")))
    };
    let first = lookup(first_name)?;
    let second = lookup(second_name)?;

    let mut averages = BTreeMap::new();
    let mut differences = BTreeMap::new();
    for name in BASE_STAT_NAMES {
        let (a, b) = (stat(&first, name), stat(&second, name));
        averages.insert(name, mean([a, b]));
        differences.insert(name, diff(a, b));
    }

    Ok(StatComparison {
        first,
        second,
        averages,
        differences,
    })
}

// ---------------------------------------------------------------------------
// Evolution trend
// ---------------------------------------------------------------------------

/// hp/attack/defense of one evolution stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvolutionStage {
    pub name: String,
    pub hp: Option<i64>,
    pub attack: Option<i64>,
    pub defense: Option<i64>,
}

/// Stat change between consecutive stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDelta {
    pub from: String,
    pub to: String,
    pub changes: BTreeMap<&'static str, Option<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvolutionTrend {
    /// Stored stages, in the requested order.
    pub stages: Vec<EvolutionStage>,
    pub deltas: Vec<StageDelta>,
    /// Requested names with no stored row.
    pub missing: Vec<String>,
}

/// Stat progression along `names`, in the given order.
///
/// Unknown names are reported in `missing`; at least one stage must exist.
#[instrument(skip(storage))]
pub async fn evolution_trend(storage: &Storage, names: &[String]) -> Result<EvolutionTrend> {
    let names = normalize_names(names);
    let found = storage.base_stats_by_names(&names).await?;

    let mut stages = Vec::new();
    let mut missing = Vec::new();
    for name in &names {
        match found.iter().find(|s| &s.name == name) {
            Some(s) => stages.push(EvolutionStage {
                name: s.name.clone(),
                hp: s.hp,
                attack: s.attack,
                defense: s.defense,
            }),
            None => missing.push(name.clone()),
        }
    }

    if stages.is_empty() {
        return Err(PokedexError::validation(format!(
            "none of {names:?} are stored"
        )));
    }
    if !missing.is_empty() {
        warn!(?missing, "evolution stages not stored");
    }

    let deltas = stages
        .windows(2)
        .map(|pair| {
            let (from, to) = (&pair[0], &pair[1]);
            let changes = TREND_STAT_NAMES
                .into_iter()
                .map(|name| (name, diff(stage_stat(from, name), stage_stat(to, name))))
                .collect();
            StageDelta {
                from: from.name.clone(),
                to: to.name.clone(),
                changes,
            }
        })
        .collect();

    Ok(EvolutionTrend {
        stages,
        deltas,
        missing,
    })
}

fn stage_stat(stage: &EvolutionStage, name: &str) -> Option<i64> {
    match name {
        "hp" => stage.hp,
        "attack" => stage.attack,
        "defense" => stage.defense,
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write `report` as pretty JSON to `path`, creating parent directories.
pub fn write_report<R: Serialize>(path: &Path, report: &R) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PokedexError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| PokedexError::validation(format!("report serialization failed: {e}")))?;
    std::fs::write(path, json).map_err(|e| PokedexError::io(path, e))?;
    info!(path = %path.display(), "report written");
    Ok(path.to_path_buf())
}
