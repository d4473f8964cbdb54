//! Static descriptions of the keyed record tables.
//!
//! Every record table has an `INTEGER PRIMARY KEY id`; [`TableSpec::columns`]
//! lists the remaining columns in insertion order. Table and column names are
//! compile-time constants, so they are safe to splice into SQL text. Values
//! are always bound as parameters.

/// SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Blob,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// `NOT NULL` in the schema.
    pub required: bool,
}

/// A keyed record table.
#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
}

const fn col(name: &'static str, kind: ColumnKind, required: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        kind,
        required,
    }
}

/// Main-series base stats from PokeAPI.
pub static POKEMON: TableSpec = TableSpec {
    name: "pokemon",
    columns: &[
        col("name", ColumnKind::Text, true),
        col("hp", ColumnKind::Integer, false),
        col("attack", ColumnKind::Integer, false),
        col("defense", ColumnKind::Integer, false),
        col("special_attack", ColumnKind::Integer, false),
        col("special_defense", ColumnKind::Integer, false),
        col("speed", ColumnKind::Integer, false),
    ],
};

/// Pokémon GO base stats from PoGoAPI.
pub static POKEMON_GO_STATS: TableSpec = TableSpec {
    name: "pokemon_go_stats",
    columns: &[
        col("base_attack", ColumnKind::Integer, false),
        col("base_defense", ColumnKind::Integer, false),
        col("base_stamina", ColumnKind::Integer, false),
    ],
};

/// Sprite images scraped from Bulbapedia.
pub static POKEMON_IMAGES: TableSpec = TableSpec {
    name: "pokemon_images",
    columns: &[
        col("name", ColumnKind::Text, true),
        col("image_url", ColumnKind::Text, false),
        col("image", ColumnKind::Blob, true),
    ],
};

/// All record tables, for status listings.
pub static RECORD_TABLES: [&TableSpec; 3] = [&POKEMON, &POKEMON_GO_STATS, &POKEMON_IMAGES];

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `id, c1, c2, ...`
    pub(crate) fn column_list(&self) -> String {
        std::iter::once("id")
            .chain(self.columns.iter().map(|c| c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `INSERT ... ON CONFLICT(id) ...` for one record, with positional placeholders.
    pub(crate) fn upsert_sql(&self, replace: bool) -> String {
        let placeholders = crate::sql::placeholders(1, self.columns.len() + 1);
        let conflict = if replace && !self.columns.is_empty() {
            let sets = self
                .columns
                .iter()
                .map(|c| format!("{0} = excluded.{0}", c.name))
                .collect::<Vec<_>>()
                .join(", ");
            format!("DO UPDATE SET {sets}")
        } else {
            "DO NOTHING".to_string()
        };
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT(id) {conflict}",
            self.name,
            self.column_list()
        )
    }
}
