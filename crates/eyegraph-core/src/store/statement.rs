//! Declarative statements understood by a graph session.

use super::value::PropertyMap;

/// Identifies a node by label and natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePattern {
    pub label: String,
    pub natural_key: String,
}

impl NodePattern {
    #[must_use]
    pub fn new(label: impl Into<String>, natural_key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            natural_key: natural_key.into(),
        }
    }
}

/// A single unit of work executed by [`GraphSession::run`].
///
/// [`GraphSession::run`]: super::GraphSession::run
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Delete every relationship and node.
    DetachDeleteAll,
    /// Create the node unless one with the same label and natural key exists.
    MergeNode {
        pattern: NodePattern,
        properties: PropertyMap,
    },
    /// Create the node unconditionally.
    CreateNode {
        pattern: NodePattern,
        properties: PropertyMap,
    },
    /// Link every node matching `source` to every node matching `target`
    /// unless an edge of `rel_type` already joins them. Creates nothing when
    /// either side matches no node.
    MergeRelationship {
        source: NodePattern,
        rel_type: String,
        target: NodePattern,
    },
    /// Up to `limit` `(n, r, m)` triples ordered by relationship identity.
    MatchTriples { limit: usize },
    /// Up to `limit` nodes (field `n`), optionally restricted to one label.
    MatchNodes { label: Option<String>, limit: usize },
}

impl Statement {
    /// Name used in logs and error reports.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::DetachDeleteAll => "detach_delete_all",
            Self::MergeNode { .. } => "merge_node",
            Self::CreateNode { .. } => "create_node",
            Self::MergeRelationship { .. } => "merge_relationship",
            Self::MatchTriples { .. } => "match_triples",
            Self::MatchNodes { .. } => "match_nodes",
        }
    }
}
