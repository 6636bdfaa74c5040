//! Node/link export of the graph for force-directed chart front ends.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::GraphError;
use crate::rebuild::{DISEASE_LEVEL_LABEL, PATIENT_LABEL, REGION_LABEL, UNKNOWN_NAME};
use crate::store::{GraphStore, Node, Statement, StoreId};

/// Default cap on relationship triples read per export.
pub const DEFAULT_LINK_LIMIT: usize = 300;

/// Legend entries, indexed by [`VisNode::category`].
const CATEGORY_LEGEND: [&str; 3] = [PATIENT_LABEL, REGION_LABEL, DISEASE_LEVEL_LABEL];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisNode {
    /// Store identity, only meaningful within this payload.
    pub id: String,
    pub name: String,
    pub category: u8,
    /// Primary label, shown on hover.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisLink {
    pub source: String,
    pub target: String,
    /// Relationship type.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: String,
}

/// Visualization payload: `{"nodes": [...], "links": [...], "categories": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisualizationPayload {
    pub nodes: Vec<VisNode>,
    pub links: Vec<VisLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
}

impl VisualizationPayload {
    /// Payload returned when the store cannot be reached.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    fn with_legend() -> Self {
        Self {
            categories: CATEGORY_LEGEND
                .iter()
                .map(|name| Category {
                    name: (*name).to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }
}

/// Category index for a node's primary label.
#[must_use]
pub fn category_for(label: Option<&str>) -> u8 {
    match label {
        Some(REGION_LABEL) => 1,
        Some(DISEASE_LEVEL_LABEL) => 2,
        _ => 0,
    }
}

/// Reads a bounded slice of the graph and renders it as a [`VisualizationPayload`].
#[derive(Debug)]
pub struct GraphQueryExporter<'a> {
    store: &'a GraphStore,
    link_limit: usize,
}

impl<'a> GraphQueryExporter<'a> {
    #[must_use]
    pub const fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            link_limit: DEFAULT_LINK_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_link_limit(mut self, link_limit: usize) -> Self {
        self.link_limit = link_limit;
        self
    }

    /// Export up to `link_limit` relationships and their endpoint nodes.
    ///
    /// Nodes are deduplicated by store identity in first-seen order, so every
    /// link's endpoints appear in `nodes`. Reads are not isolated from a
    /// concurrent rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OperationFailure`] or [`GraphError::CorruptValue`]
    /// if reading fails partway. An unavailable store is not an error: the
    /// result is [`VisualizationPayload::empty`].
    pub fn get_visualization(&self) -> Result<VisualizationPayload, GraphError> {
        let session = match self.store.session() {
            Ok(session) => session,
            Err(err) if err.is_unavailable() => {
                tracing::warn!(error = %err, "graph store unavailable, exporting empty graph");
                return Ok(VisualizationPayload::empty());
            }
            Err(err) => return Err(err),
        };

        let mut payload = VisualizationPayload::with_legend();
        let mut seen: HashSet<StoreId> = HashSet::new();

        for record in session.run(&Statement::MatchTriples {
            limit: self.link_limit,
        })? {
            let record = record?;
            let (Some(source), Some(rel), Some(target)) =
                (record.node("n"), record.relationship("r"), record.node("m"))
            else {
                continue;
            };

            for node in [source, target] {
                if seen.insert(node.store_id) {
                    payload.nodes.push(vis_node(node));
                }
            }
            payload.links.push(VisLink {
                source: source.store_id.to_string(),
                target: target.store_id.to_string(),
                name: rel.rel_type.clone(),
            });
        }

        tracing::debug!(
            nodes = payload.nodes.len(),
            links = payload.links.len(),
            "graph exported"
        );
        Ok(payload)
    }
}

fn vis_node(node: &Node) -> VisNode {
    let label = node.primary_label();
    VisNode {
        id: node.store_id.to_string(),
        name: node.text("name").unwrap_or(UNKNOWN_NAME).to_string(),
        category: category_for(label),
        value: label.unwrap_or(UNKNOWN_NAME).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiagnosisRecord, PatientRecord};
    use crate::rebuild::GraphRebuildEngine;
    use crate::source::MemorySource;
    use crate::store::PropertyMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn connected_store() -> (TempDir, GraphStore) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = GraphStore::new(dir.path().join("graph.db"), Duration::from_secs(5));
        store.connect().expect("connect store");
        (dir, store)
    }

    fn rebuild(store: &GraphStore, source: &MemorySource) {
        GraphRebuildEngine::new(store, source)
            .build_full_graph()
            .expect("rebuild");
    }

    #[test]
    fn single_patient_exports_two_nodes_and_one_link() {
        let (_dir, store) = connected_store();
        rebuild(
            &store,
            &MemorySource::new(
                vec![PatientRecord::new("P1").with_name("Zhang").with_location("Kunming")],
                vec![],
            ),
        );

        let payload = GraphQueryExporter::new(&store)
            .get_visualization()
            .expect("export");

        assert_eq!(payload.nodes.len(), 2);
        assert_eq!(payload.links.len(), 1);
        let categories: Vec<u8> = payload.nodes.iter().map(|n| n.category).collect();
        assert_eq!(categories, vec![0, 1]);
        assert_eq!(payload.nodes[0].name, "Zhang");
        assert_eq!(payload.nodes[0].value, "Patient");
        assert_eq!(payload.nodes[1].name, "Kunming");
        assert_eq!(payload.links[0].name, "LIVES_IN");
        assert_eq!(payload.links[0].source, payload.nodes[0].id);
        assert_eq!(payload.links[0].target, payload.nodes[1].id);

        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            json["categories"],
            serde_json::json!([{"name": "Patient"}, {"name": "Region"}, {"name": "DiseaseLevel"}])
        );
    }

    #[test]
    fn shared_nodes_are_deduplicated() {
        let (_dir, store) = connected_store();
        rebuild(
            &store,
            &MemorySource::new(
                vec![
                    PatientRecord::new("P1").with_location("Dali"),
                    PatientRecord::new("P2").with_location("Dali"),
                ],
                vec![
                    DiagnosisRecord::new("P1").with_severity("Severe"),
                    DiagnosisRecord::new("P2").with_severity("Severe"),
                ],
            ),
        );

        let payload = GraphQueryExporter::new(&store)
            .get_visualization()
            .expect("export");

        // 2 patients + Dali + Severe
        assert_eq!(payload.nodes.len(), 4);
        assert_eq!(payload.links.len(), 4);
        let level = payload
            .nodes
            .iter()
            .find(|n| n.value == "DiseaseLevel")
            .expect("level node");
        assert_eq!(level.category, 2);
        assert_eq!(level.name, "Severe");
    }

    #[test]
    fn link_limit_bounds_export() {
        let (_dir, store) = connected_store();
        rebuild(
            &store,
            &MemorySource::new(
                (0..20).map(|i| PatientRecord::new(format!("P{i}"))).collect(),
                vec![],
            ),
        );

        let payload = GraphQueryExporter::new(&store)
            .with_link_limit(5)
            .get_visualization()
            .expect("export");
        assert_eq!(payload.links.len(), 5);
        assert!(payload.nodes.len() <= 10);
    }

    #[test]
    fn unavailable_store_exports_empty_payload() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = GraphStore::new(dir.path().join("graph.db"), Duration::from_secs(1));

        let payload = GraphQueryExporter::new(&store)
            .get_visualization()
            .expect("empty payload, not Err");
        assert_eq!(
            serde_json::to_string(&payload).expect("serialize"),
            r#"{"nodes":[],"links":[]}"#
        );
    }

    #[test]
    fn nodes_without_name_or_label_render_as_unknown() {
        let node = Node {
            store_id: StoreId::new(9),
            labels: Vec::new(),
            properties: PropertyMap::new(),
        };
        let vis = vis_node(&node);
        assert_eq!(vis.id, "9");
        assert_eq!(vis.name, "Unknown");
        assert_eq!(vis.value, "Unknown");
        assert_eq!(vis.category, 0);
    }

    #[test]
    fn category_mapping() {
        assert_eq!(category_for(Some("Patient")), 0);
        assert_eq!(category_for(Some("Region")), 1);
        assert_eq!(category_for(Some("DiseaseLevel")), 2);
        assert_eq!(category_for(Some("Clinic")), 0);
        assert_eq!(category_for(None), 0);
    }
}
