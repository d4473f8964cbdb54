//! Read-only aggregate queries feeding the statistics reports.

use pokedex_shared::Result;
use serde::Serialize;

use crate::{Storage, sql, storage_err};

/// One row of the main-series vs. GO attack comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttackRow {
    pub id: i64,
    pub name: String,
    /// `attack + special_attack`; `None` if either is missing.
    pub pokemon_attack: Option<i64>,
    pub go_base_attack: Option<i64>,
}

/// The six main-series base stats of one Pokémon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseStats {
    pub id: i64,
    pub name: String,
    pub hp: Option<i64>,
    pub attack: Option<i64>,
    pub defense: Option<i64>,
    pub special_attack: Option<i64>,
    pub special_defense: Option<i64>,
    pub speed: Option<i64>,
}

impl Storage {
    /// Pokémon present in both `pokemon` and `pokemon_go_stats`, by id.
    pub async fn attack_comparison_rows(&self) -> Result<Vec<AttackRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT p.id, p.name, p.attack + p.special_attack, g.base_attack
                 FROM pokemon p
                 INNER JOIN pokemon_go_stats g ON p.id = g.id
                 ORDER BY p.id",
                (),
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(AttackRow {
                id: row.get(0).map_err(storage_err)?,
                name: row.get(1).map_err(storage_err)?,
                pokemon_attack: row.get::<i64>(2).ok(),
                go_base_attack: row.get::<i64>(3).ok(),
            });
        }
        Ok(results)
    }

    /// Base stats for the named Pokémon, ordered by id. Unknown names are absent.
    pub async fn base_stats_by_names(&self, names: &[String]) -> Result<Vec<BaseStats>> {
        let Some((sql, params)) = sql::in_list(
            "SELECT id, name, hp, attack, defense, special_attack, special_defense, speed
             FROM pokemon WHERE name",
            names.iter().map(String::as_str),
            " ORDER BY id",
        ) else {
            return Ok(Vec::new());
        };

        let mut rows = self.conn.query(&sql, params).await.map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(BaseStats {
                id: row.get(0).map_err(storage_err)?,
                name: row.get(1).map_err(storage_err)?,
                hp: row.get::<i64>(2).ok(),
                attack: row.get::<i64>(3).ok(),
                defense: row.get::<i64>(4).ok(),
                special_attack: row.get::<i64>(5).ok(),
                special_defense: row.get::<i64>(6).ok(),
                speed: row.get::<i64>(7).ok(),
            });
        }
        Ok(results)
    }
}
