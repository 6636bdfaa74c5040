//! SQLite schema for the derived knowledge graph.
//!
//! - `nodes` holds one row per graph node; `natural_key` is the business key
//!   (region name, severity name, patient record id) and is indexed together
//!   with `label` so merges never scan
//! - `relationships` holds directed, typed edges; deleting a node cascades
//! - `graph_meta` records the schema version and the last rebuild
//!
//! Both identity columns use `AUTOINCREMENT`, so a store id is never reused
//! after a wipe and cannot be relied on across rebuilds.

use rusqlite::{Connection, types::Type};

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 1;

/// Node/relationship tables plus graph metadata.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS nodes (
    node_id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL CHECK (length(trim(label)) > 0),
    natural_key TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS relationships (
    rel_id INTEGER PRIMARY KEY AUTOINCREMENT,
    rel_type TEXT NOT NULL CHECK (length(trim(rel_type)) > 0),
    source_id INTEGER NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    target_id INTEGER NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    properties TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_nodes_label_key
    ON nodes(label, natural_key);

CREATE INDEX IF NOT EXISTS idx_relationships_source_type_target
    ON relationships(source_id, rel_type, target_id);

CREATE INDEX IF NOT EXISTS idx_relationships_target
    ON relationships(target_id);

CREATE TABLE IF NOT EXISTS graph_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_rebuild_at_us INTEGER,
    last_rebuild_patients INTEGER
);

INSERT OR IGNORE INTO graph_meta (id, schema_version) VALUES (1, 0);
";

/// Indexes every initialized store must carry.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_nodes_label_key",
    "idx_relationships_source_type_target",
    "idx_relationships_target",
];

/// Read `PRAGMA user_version`.
///
/// # Errors
///
/// Returns an error if the query fails or the value is negative.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Create the schema unless `user_version` already records it.
///
/// # Errors
///
/// Returns an error if the DDL or the version stamp fails.
pub fn ensure_schema(conn: &mut Connection) -> rusqlite::Result<u32> {
    let current = schema_version(conn)?;
    if current >= SCHEMA_VERSION {
        return Ok(current);
    }

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    tx.pragma_update(None, "user_version", i64::from(SCHEMA_VERSION))?;
    tx.execute(
        "UPDATE graph_meta SET schema_version = ?1 WHERE id = 1",
        [i64::from(SCHEMA_VERSION)],
    )?;
    tx.commit()?;
    Ok(SCHEMA_VERSION)
}
