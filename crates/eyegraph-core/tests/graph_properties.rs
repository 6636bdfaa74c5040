//! Property tests for rebuild/export invariants over generated record sets.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use eyegraph_core::model::{PatientRecord, Region, Severity};
use eyegraph_core::rebuild::{DISEASE_LEVEL_LABEL, HAS_DISEASE, LIVES_IN, PATIENT_LABEL, REGION_LABEL};
use eyegraph_core::store::{Record, Statement};
use eyegraph_core::{GraphQueryExporter, GraphRebuildEngine, GraphStore, MemorySource};
use proptest::prelude::*;
use tempfile::TempDir;

use generators::arb_records;

fn connected_store() -> (TempDir, GraphStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = GraphStore::new(dir.path().join("graph.db"), Duration::from_secs(5));
    store.connect().expect("connect store");
    (dir, store)
}

fn all_triples(store: &GraphStore) -> Vec<Record> {
    store
        .session()
        .expect("session")
        .run(&Statement::MatchTriples { limit: usize::MAX })
        .expect("match")
        .collect::<Result<_, _>>()
        .expect("records")
}

/// `(patient id, rel type) -> target names`
fn edges(store: &GraphStore) -> HashMap<(String, String), Vec<String>> {
    let mut map: HashMap<(String, String), Vec<String>> = HashMap::new();
    for record in all_triples(store) {
        let n = record.node("n").expect("n");
        let r = record.relationship("r").expect("r");
        let m = record.node("m").expect("m");
        let key = (
            n.text("id").expect("patient id").to_string(),
            r.rel_type.clone(),
        );
        map.entry(key)
            .or_default()
            .push(m.text("name").expect("target name").to_string());
    }
    map
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn rebuild_maps_every_patient_exactly_once((patients, diagnoses) in arb_records(12)) {
        let (_dir, store) = connected_store();
        let source = MemorySource::new(patients.clone(), diagnoses.clone());

        let outcome = GraphRebuildEngine::new(&store, &source)
            .build_full_graph()
            .expect("rebuild");
        let report = outcome.report().expect("success");
        prop_assert_eq!(report.nodes_created, patients.len());

        let stats = store.session().expect("session").stats().expect("stats");
        prop_assert_eq!(stats.nodes_with_label(REGION_LABEL), Region::ALL.len());
        prop_assert_eq!(stats.nodes_with_label(DISEASE_LEVEL_LABEL), Severity::ALL.len());
        prop_assert_eq!(stats.nodes_with_label(PATIENT_LABEL), patients.len());

        let edges = edges(&store);
        let mut first_severity: HashMap<&str, Option<&str>> = HashMap::new();
        for d in &diagnoses {
            first_severity.entry(d.patient_id.as_str()).or_insert(d.severity());
        }

        for patient in &patients {
            let region = Region::resolve(patient.location.as_deref()).value();
            prop_assert_eq!(
                edges.get(&(patient.id.clone(), LIVES_IN.to_string())),
                Some(&vec![region.name().to_string()])
            );

            let disease = edges.get(&(patient.id.clone(), HAS_DISEASE.to_string()));
            match first_severity.get(patient.id.as_str()) {
                Some(raw) => {
                    let level = Severity::resolve(*raw).value();
                    prop_assert_eq!(disease, Some(&vec![level.name().to_string()]));
                }
                None => prop_assert!(disease.is_none()),
            }
        }
    }

    #[test]
    fn repeated_rebuilds_converge((patients, diagnoses) in arb_records(8)) {
        let (_dir, store) = connected_store();
        let source = MemorySource::new(patients, diagnoses);
        let engine = GraphRebuildEngine::new(&store, &source);

        engine.build_full_graph().expect("first rebuild");
        let first = store.session().expect("session").stats().expect("stats");
        engine.build_full_graph().expect("second rebuild");
        let second = store.session().expect("session").stats().expect("stats");

        prop_assert_eq!(first.nodes_by_label, second.nodes_by_label);
        prop_assert_eq!(first.relationships_by_type, second.relationships_by_type);
    }

    #[test]
    fn export_links_reference_exported_nodes(
        (patients, diagnoses) in arb_records(12),
        limit in 0_usize..40,
    ) {
        let (_dir, store) = connected_store();
        let source = MemorySource::new(patients, diagnoses);
        GraphRebuildEngine::new(&store, &source)
            .build_full_graph()
            .expect("rebuild");

        let payload = GraphQueryExporter::new(&store)
            .with_link_limit(limit)
            .get_visualization()
            .expect("export");

        prop_assert!(payload.links.len() <= limit);
        let ids: HashSet<&str> = payload.nodes.iter().map(|n| n.id.as_str()).collect();
        prop_assert_eq!(ids.len(), payload.nodes.len());
        prop_assert!(payload.nodes.len() <= 2 * payload.links.len());
        for link in &payload.links {
            prop_assert!(ids.contains(link.source.as_str()));
            prop_assert!(ids.contains(link.target.as_str()));
        }
    }
}

#[test]
fn removed_patient_leaves_no_trace() {
    let (_dir, store) = connected_store();
    let mut source = MemorySource::new(
        vec![
            PatientRecord::new("keep").with_location("Lijiang"),
            PatientRecord::new("drop").with_location("Baoshan"),
        ],
        vec![],
    );
    GraphRebuildEngine::new(&store, &source)
        .build_full_graph()
        .expect("rebuild");
    source.remove_patient("drop");
    GraphRebuildEngine::new(&store, &source)
        .build_full_graph()
        .expect("rebuild");

    let edges = edges(&store);
    assert!(edges.keys().all(|(id, _)| id == "keep"));
    assert_eq!(edges.len(), 1);
}
