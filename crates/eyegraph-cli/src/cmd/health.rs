//! `eyegraph health`: record source and graph store checks.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use clap::Args;
use eyegraph_core::config::GraphConfig;
use eyegraph_core::store::GraphStats;
use eyegraph_core::{JsonDirSource, RecordSource};
use serde::Serialize;

use crate::output::{OutputMode, kv, render, section};

/// Arguments for `eyegraph health`.
#[derive(Args, Debug, Default)]
pub struct HealthArgs {}

#[derive(Debug, Serialize)]
struct HealthOutput {
    status: &'static str,
    records: ComponentStatus,
    graph: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<GraphSummary>,
}

#[derive(Debug, Serialize)]
struct ComponentStatus {
    ok: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
struct GraphSummary {
    schema_version: u32,
    nodes: BTreeMap<String, usize>,
    relationships: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_rebuild_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_rebuild_patients: Option<usize>,
}

impl From<GraphStats> for GraphSummary {
    fn from(stats: GraphStats) -> Self {
        Self {
            schema_version: stats.schema_version,
            nodes: stats.nodes_by_label,
            relationships: stats.relationships_by_type,
            last_rebuild_at: stats.last_rebuild_at,
            last_rebuild_patients: stats.last_rebuild_patients,
        }
    }
}

/// Execute `eyegraph health`. Always exits zero; `status` reports `ok` or
/// `degraded`.
///
/// # Errors
///
/// Returns an error only if writing the report fails.
pub fn run_health(
    _args: &HealthArgs,
    output: OutputMode,
    config: &GraphConfig,
) -> anyhow::Result<()> {
    let records = check_records(config);
    let (graph, stats) = check_graph(config);

    let payload = HealthOutput {
        status: if records.ok && graph.ok { "ok" } else { "degraded" },
        records,
        graph,
        stats,
    };

    render(output, &payload, render_health_human)
}

fn check_records(config: &GraphConfig) -> ComponentStatus {
    let source = JsonDirSource::new(&config.records.dir);
    let listed = source
        .list_patients(config.records.patient_limit)
        .and_then(|patients| {
            source
                .list_diagnoses(config.records.diagnosis_limit)
                .map(|diagnoses| (patients.len(), diagnoses.len()))
        });
    match listed {
        Ok((patients, diagnoses)) => ComponentStatus {
            ok: true,
            detail: format!("{patients} patients, {diagnoses} diagnoses"),
        },
        Err(err) => ComponentStatus {
            ok: false,
            detail: format!("{}: {err}", err.code()),
        },
    }
}

/// The store file is not created here: a missing file is reported as such.
fn check_graph(config: &GraphConfig) -> (ComponentStatus, Option<GraphSummary>) {
    if !config.graph.path.exists() {
        return (
            ComponentStatus {
                ok: false,
                detail: format!(
                    "{} not found; run `eyegraph build`",
                    config.graph.path.display()
                ),
            },
            None,
        );
    }

    let store = super::open_store(config);
    let stats = store.session().and_then(|session| session.stats());
    store.close();
    match stats {
        Ok(stats) => (
            ComponentStatus {
                ok: true,
                detail: config.graph.path.display().to_string(),
            },
            Some(GraphSummary::from(stats)),
        ),
        Err(err) => (
            ComponentStatus {
                ok: false,
                detail: format!("{}: {err}", err.code()),
            },
            None,
        ),
    }
}

fn render_health_human(report: &HealthOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let mark = |ok: bool| if ok { "✓" } else { "⚠" };

    section(w, &format!("eyegraph health: {}", report.status))?;
    kv(
        w,
        "records",
        format!("{} {}", mark(report.records.ok), report.records.detail),
    )?;
    kv(
        w,
        "graph",
        format!("{} {}", mark(report.graph.ok), report.graph.detail),
    )?;

    let Some(stats) = &report.stats else {
        return Ok(());
    };
    kv(w, "schema version", stats.schema_version.to_string())?;
    for (label, count) in &stats.nodes {
        kv(w, &format!("nodes[{label}]"), count.to_string())?;
    }
    for (rel_type, count) in &stats.relationships {
        kv(w, &format!("edges[{rel_type}]"), count.to_string())?;
    }
    match (stats.last_rebuild_at, stats.last_rebuild_patients) {
        (Some(at), Some(patients)) => kv(
            w,
            "last rebuild",
            format!("{} ({patients} patients)", at.to_rfc3339()),
        ),
        _ => kv(w, "last rebuild", "never"),
    }
}
