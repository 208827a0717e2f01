use rusqlite_migration::{M, Migrations};

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "CREATE TABLE snapshots (
            catalog           TEXT NOT NULL,
            product_id        TEXT NOT NULL,
            competitors_hash  TEXT NOT NULL,
            competitors_json  TEXT NOT NULL DEFAULT '[]',
            last_checked      TEXT NOT NULL,
            last_changed      TEXT NOT NULL,
            PRIMARY KEY (catalog, product_id)
        );

        CREATE TABLE run_history (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            catalog           TEXT NOT NULL,
            recorded_at       TEXT NOT NULL,
            checked           INTEGER NOT NULL,
            updated           INTEGER NOT NULL,
            added             INTEGER NOT NULL,
            removed           INTEGER NOT NULL,
            skipped           INTEGER NOT NULL DEFAULT 0,
            failed            INTEGER NOT NULL DEFAULT 0,
            pages_fetched     INTEGER NOT NULL DEFAULT 0,
            pages_skipped     INTEGER NOT NULL DEFAULT 0,
            duration_seconds  REAL NOT NULL
        );

        CREATE INDEX idx_snapshots_last_changed ON snapshots(catalog, last_changed);
        CREATE INDEX idx_run_history_catalog ON run_history(catalog, id);",
    )])
}
