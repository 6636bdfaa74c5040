//! A scoped connection to the graph store.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::GraphError;

use super::statement::{NodePattern, Statement};
use super::value::{
    GraphValue, Node, PropertyMap, Record, Relationship, StoreId, decode_properties,
    encode_properties,
};

/// Rows fetched per round trip while a [`RecordStream`] is consumed.
const PAGE_SIZE: usize = 64;

/// Write effects of a single statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub nodes_created: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
}

/// Aggregate view of the stored graph, used for health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub schema_version: u32,
    pub nodes_by_label: BTreeMap<String, usize>,
    pub relationships_by_type: BTreeMap<String, usize>,
    pub last_rebuild_at: Option<DateTime<Utc>>,
    pub last_rebuild_patients: Option<usize>,
}

impl GraphStats {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes_by_label.values().sum()
    }

    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships_by_type.values().sum()
    }

    #[must_use]
    pub fn nodes_with_label(&self, label: &str) -> usize {
        self.nodes_by_label.get(label).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn relationships_of_type(&self, rel_type: &str) -> usize {
        self.relationships_by_type.get(rel_type).copied().unwrap_or(0)
    }
}

/// One open connection. Statements run strictly in call order; each write
/// commits on its own, so concurrent readers may observe partial progress.
#[derive(Debug)]
pub struct GraphSession {
    conn: Connection,
}

impl GraphSession {
    pub(crate) const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Execute one statement.
    ///
    /// Writes complete before this returns and yield an empty stream carrying
    /// their [`Counters`]. Reads return a lazy stream that pages through the
    /// store as it is iterated.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OperationFailure`] if the store rejects the write.
    pub fn run(&self, statement: &Statement) -> Result<RecordStream<'_>, GraphError> {
        tracing::trace!(operation = statement.operation(), "run statement");
        let wrap = |source| GraphError::operation(statement.operation(), source);

        match statement {
            Statement::DetachDeleteAll => {
                let tx = self.conn.unchecked_transaction().map_err(wrap)?;
                let relationships_deleted =
                    tx.execute("DELETE FROM relationships", []).map_err(wrap)?;
                let nodes_deleted = tx.execute("DELETE FROM nodes", []).map_err(wrap)?;
                // The last-rebuild stamp describes the wiped graph, not what follows.
                tx.execute(
                    "UPDATE graph_meta
                     SET last_rebuild_at_us = NULL, last_rebuild_patients = NULL
                     WHERE id = 1",
                    [],
                )
                .map_err(wrap)?;
                tx.commit().map_err(wrap)?;
                Ok(RecordStream::written(Counters {
                    nodes_deleted,
                    relationships_deleted,
                    ..Counters::default()
                }))
            }
            Statement::MergeNode {
                pattern,
                properties,
            } => {
                let nodes_created = self
                    .conn
                    .execute(
                        "INSERT INTO nodes (label, natural_key, properties)
                         SELECT ?1, ?2, ?3
                         WHERE NOT EXISTS (
                             SELECT 1 FROM nodes WHERE label = ?1 AND natural_key = ?2
                         )",
                        params![pattern.label, pattern.natural_key, encode_properties(properties)],
                    )
                    .map_err(wrap)?;
                Ok(RecordStream::written(Counters {
                    nodes_created,
                    ..Counters::default()
                }))
            }
            Statement::CreateNode {
                pattern,
                properties,
            } => {
                let nodes_created = self
                    .conn
                    .execute(
                        "INSERT INTO nodes (label, natural_key, properties) VALUES (?1, ?2, ?3)",
                        params![pattern.label, pattern.natural_key, encode_properties(properties)],
                    )
                    .map_err(wrap)?;
                Ok(RecordStream::written(Counters {
                    nodes_created,
                    ..Counters::default()
                }))
            }
            Statement::MergeRelationship {
                source,
                rel_type,
                target,
            } => {
                let relationships_created = self
                    .merge_relationship(source, rel_type, target)
                    .map_err(wrap)?;
                Ok(RecordStream::written(Counters {
                    relationships_created,
                    ..Counters::default()
                }))
            }
            Statement::MatchTriples { limit } => {
                Ok(RecordStream::scan(&self.conn, Scan::Triples, *limit))
            }
            Statement::MatchNodes { label, limit } => Ok(RecordStream::scan(
                &self.conn,
                Scan::Nodes {
                    label: label.clone(),
                },
                *limit,
            )),
        }
    }

    fn merge_relationship(
        &self,
        source: &NodePattern,
        rel_type: &str,
        target: &NodePattern,
    ) -> rusqlite::Result<usize> {
        self.conn.execute(
            "INSERT INTO relationships (rel_type, source_id, target_id, properties)
             SELECT ?1, s.node_id, t.node_id, '{}'
             FROM nodes s, nodes t
             WHERE s.label = ?2 AND s.natural_key = ?3
               AND t.label = ?4 AND t.natural_key = ?5
               AND NOT EXISTS (
                   SELECT 1 FROM relationships r
                   WHERE r.source_id = s.node_id
                     AND r.rel_type = ?1
                     AND r.target_id = t.node_id
               )",
            params![
                rel_type,
                source.label,
                source.natural_key,
                target.label,
                target.natural_key
            ],
        )
    }

    /// Stamp the graph metadata after a completed rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OperationFailure`] if the update fails.
    pub fn record_rebuild(&self, at: DateTime<Utc>, patients: usize) -> Result<(), GraphError> {
        self.conn
            .execute(
                "UPDATE graph_meta
                 SET last_rebuild_at_us = ?1, last_rebuild_patients = ?2
                 WHERE id = 1",
                params![
                    at.timestamp_micros(),
                    i64::try_from(patients).unwrap_or(i64::MAX)
                ],
            )
            .map_err(|source| GraphError::operation("record_rebuild", source))?;
        Ok(())
    }

    /// Count nodes per label and relationships per type.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OperationFailure`] if any query fails.
    pub fn stats(&self) -> Result<GraphStats, GraphError> {
        let wrap = |source| GraphError::operation("stats", source);

        let nodes_by_label = grouped_counts(
            &self.conn,
            "SELECT label, COUNT(*) FROM nodes GROUP BY label ORDER BY label",
        )
        .map_err(wrap)?;
        let relationships_by_type = grouped_counts(
            &self.conn,
            "SELECT rel_type, COUNT(*) FROM relationships GROUP BY rel_type ORDER BY rel_type",
        )
        .map_err(wrap)?;

        let meta: Option<(i64, Option<i64>, Option<i64>)> = self
            .conn
            .query_row(
                "SELECT schema_version, last_rebuild_at_us, last_rebuild_patients
                 FROM graph_meta WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(wrap)?;
        let (schema_version, at_us, patients) = meta.unwrap_or((0, None, None));

        Ok(GraphStats {
            schema_version: u32::try_from(schema_version).unwrap_or(0),
            nodes_by_label,
            relationships_by_type,
            last_rebuild_at: at_us.and_then(DateTime::<Utc>::from_timestamp_micros),
            last_rebuild_patients: patients.and_then(|n| usize::try_from(n).ok()),
        })
    }

    /// Close the underlying connection, logging (not failing) on error.
    pub fn close(self) {
        if let Err((_, err)) = self.conn.close() {
            tracing::warn!("graph session close failed: {err}");
        }
    }

    #[cfg(test)]
    pub(crate) const fn conn_for_tests(&self) -> &Connection {
        &self.conn
    }
}

fn grouped_counts(conn: &Connection, sql: &str) -> rusqlite::Result<BTreeMap<String, usize>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        let key: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((key, usize::try_from(count).unwrap_or(0)))
    })?;
    rows.collect()
}

#[derive(Debug, Clone)]
enum Scan {
    Triples,
    Nodes { label: Option<String> },
}

/// Lazily paged query results.
///
/// Each page is a separate read, so a stream consumed while a rebuild runs
/// can mix pages from before and after the wipe.
#[derive(Debug)]
pub struct RecordStream<'s> {
    conn: Option<&'s Connection>,
    scan: Scan,
    counters: Counters,
    cursor: i64,
    remaining: usize,
    buffer: VecDeque<Record>,
    exhausted: bool,
}

impl<'s> RecordStream<'s> {
    const fn written(counters: Counters) -> Self {
        Self {
            conn: None,
            scan: Scan::Triples,
            counters,
            cursor: 0,
            remaining: 0,
            buffer: VecDeque::new(),
            exhausted: true,
        }
    }

    const fn scan(conn: &'s Connection, scan: Scan, limit: usize) -> Self {
        Self {
            conn: Some(conn),
            scan,
            counters: Counters {
                nodes_created: 0,
                nodes_deleted: 0,
                relationships_created: 0,
                relationships_deleted: 0,
            },
            cursor: 0,
            remaining: limit,
            buffer: VecDeque::new(),
            exhausted: limit == 0,
        }
    }

    /// Write effects of the statement that produced this stream.
    #[must_use]
    pub const fn counters(&self) -> Counters {
        self.counters
    }

    fn fetch_page(&mut self, conn: &Connection) -> Result<(), GraphError> {
        let page = self.remaining.min(PAGE_SIZE);
        let fetched = match &self.scan {
            Scan::Triples => fetch_triples(conn, self.cursor, page)?,
            Scan::Nodes { label } => fetch_nodes(conn, label.as_deref(), self.cursor, page)?,
        };

        if fetched.len() < page {
            self.exhausted = true;
        }
        for (cursor, record) in fetched {
            self.cursor = cursor;
            self.remaining -= 1;
            self.buffer.push_back(record);
        }
        if self.remaining == 0 {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for RecordStream<'_> {
    type Item = Result<Record, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.buffer.pop_front() {
            return Some(Ok(record));
        }
        if self.exhausted {
            return None;
        }
        let conn = self.conn?;
        if let Err(err) = self.fetch_page(conn) {
            self.exhausted = true;
            return Some(Err(err));
        }
        self.buffer.pop_front().map(Ok)
    }
}

struct RawNode {
    id: i64,
    label: String,
    properties: String,
}

impl RawNode {
    fn decode(self) -> Result<Node, GraphError> {
        let properties = decode_props("node properties", self.id, &self.properties)?;
        Ok(Node {
            store_id: StoreId::new(self.id),
            labels: vec![self.label],
            properties,
        })
    }
}

struct RawTriple {
    rel_id: i64,
    rel_type: String,
    rel_properties: String,
    source: RawNode,
    target: RawNode,
}

fn decode_props(what: &'static str, store_id: i64, raw: &str) -> Result<PropertyMap, GraphError> {
    decode_properties(raw).map_err(|source| GraphError::CorruptValue {
        what,
        store_id,
        source,
    })
}

fn page_limit(page: usize) -> i64 {
    i64::try_from(page).unwrap_or(i64::MAX)
}

fn fetch_triples(
    conn: &Connection,
    after: i64,
    page: usize,
) -> Result<Vec<(i64, Record)>, GraphError> {
    let wrap = |source| GraphError::operation("match_triples", source);
    let mut stmt = conn
        .prepare_cached(
            "SELECT r.rel_id, r.rel_type, r.properties,
                    s.node_id, s.label, s.properties,
                    t.node_id, t.label, t.properties
             FROM relationships r
             JOIN nodes s ON s.node_id = r.source_id
             JOIN nodes t ON t.node_id = r.target_id
             WHERE r.rel_id > ?1
             ORDER BY r.rel_id
             LIMIT ?2",
        )
        .map_err(wrap)?;

    let raw = stmt
        .query_map(params![after, page_limit(page)], |row| {
            Ok(RawTriple {
                rel_id: row.get(0)?,
                rel_type: row.get(1)?,
                rel_properties: row.get(2)?,
                source: RawNode {
                    id: row.get(3)?,
                    label: row.get(4)?,
                    properties: row.get(5)?,
                },
                target: RawNode {
                    id: row.get(6)?,
                    label: row.get(7)?,
                    properties: row.get(8)?,
                },
            })
        })
        .map_err(wrap)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(wrap)?;

    raw.into_iter()
        .map(|triple| {
            let relationship = Relationship {
                store_id: StoreId::new(triple.rel_id),
                rel_type: triple.rel_type,
                properties: decode_props(
                    "relationship properties",
                    triple.rel_id,
                    &triple.rel_properties,
                )?,
                source_id: StoreId::new(triple.source.id),
                target_id: StoreId::new(triple.target.id),
            };
            let record = Record::default()
                .with("n", GraphValue::Node(triple.source.decode()?))
                .with("r", GraphValue::Relationship(relationship))
                .with("m", GraphValue::Node(triple.target.decode()?));
            Ok((triple.rel_id, record))
        })
        .collect()
}

fn fetch_nodes(
    conn: &Connection,
    label: Option<&str>,
    after: i64,
    page: usize,
) -> Result<Vec<(i64, Record)>, GraphError> {
    let wrap = |source| GraphError::operation("match_nodes", source);
    let mut stmt = conn
        .prepare_cached(
            "SELECT node_id, label, properties
             FROM nodes
             WHERE node_id > ?1 AND (?2 IS NULL OR label = ?2)
             ORDER BY node_id
             LIMIT ?3",
        )
        .map_err(wrap)?;

    let raw = stmt
        .query_map(params![after, label, page_limit(page)], |row| {
            Ok(RawNode {
                id: row.get(0)?,
                label: row.get(1)?,
                properties: row.get(2)?,
            })
        })
        .map_err(wrap)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(wrap)?;

    raw.into_iter()
        .map(|node| {
            let id = node.id;
            Ok((id, Record::default().with("n", GraphValue::Node(node.decode()?))))
        })
        .collect()
}
