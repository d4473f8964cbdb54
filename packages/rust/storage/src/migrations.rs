//! SQL migration definitions for the Pokédex database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: pokemon, pokemon_go_stats, pokemon_images",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Main-series base stats (PokeAPI)
CREATE TABLE IF NOT EXISTS pokemon (
    id              INTEGER PRIMARY KEY,
    name            TEXT NOT NULL,
    hp              INTEGER,
    attack          INTEGER,
    defense         INTEGER,
    special_attack  INTEGER,
    special_defense INTEGER,
    speed           INTEGER
);

CREATE INDEX IF NOT EXISTS idx_pokemon_name ON pokemon(name);

-- Pokémon GO base stats (PoGoAPI); no name column
CREATE TABLE IF NOT EXISTS pokemon_go_stats (
    id           INTEGER PRIMARY KEY,
    base_attack  INTEGER,
    base_defense INTEGER,
    base_stamina INTEGER
);

-- Sprites scraped from Bulbapedia; id refers to pokemon.id but is not enforced
CREATE TABLE IF NOT EXISTS pokemon_images (
    id        INTEGER PRIMARY KEY,
    name      TEXT NOT NULL,
    image_url TEXT,
    image     BLOB NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Ingest run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS ingest_runs (
    id          TEXT PRIMARY KEY,
    source      TEXT NOT NULL,
    table_name  TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_ingest_runs_source ON ingest_runs(source);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
