//! `eyegraph build`: wipe and rebuild the knowledge graph.

use std::io::Write;

use clap::Args;
use eyegraph_core::config::GraphConfig;
use eyegraph_core::{GraphRebuildEngine, JsonDirSource, RebuildOutcome, RebuildReport};

use crate::output::{CliError, OutputMode, kv, render, render_error, section};

/// Arguments for `eyegraph build`.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Skip the rebuild write lock.
    #[arg(long)]
    pub no_lock: bool,
}

/// Execute `eyegraph build`.
///
/// # Errors
///
/// Returns an error if the records cannot be read, a store write fails, or
/// the store is unavailable (after printing the error outcome).
pub fn run_build(args: &BuildArgs, output: OutputMode, config: &GraphConfig) -> anyhow::Result<()> {
    let mut config = config.clone();
    if args.no_lock {
        config.rebuild.write_lock = false;
    }

    let store = super::open_store(&config);
    let source = JsonDirSource::new(&config.records.dir);
    let engine = GraphRebuildEngine::from_config(&store, &source, &config);

    let outcome = match engine.build_full_graph() {
        Ok(outcome) => outcome,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
    };

    render(output, &outcome, render_outcome_human)?;
    store.close();

    match outcome {
        RebuildOutcome::Success(_) => Ok(()),
        RebuildOutcome::Error { message } => anyhow::bail!("graph rebuild failed: {message}"),
    }
}

fn render_outcome_human(outcome: &RebuildOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    match outcome {
        RebuildOutcome::Success(report) => render_report_human(report, w),
        RebuildOutcome::Error { message } => writeln!(w, "build: error: {message}"),
    }
}

fn render_report_human(report: &RebuildReport, w: &mut dyn Write) -> std::io::Result<()> {
    section(w, "Graph rebuilt")?;
    kv(w, "patients", report.nodes_created.to_string())?;
    kv(w, "diagnoses linked", report.diagnoses_linked.to_string())?;
    kv(w, "region fallbacks", report.region_fallbacks.to_string())?;
    kv(w, "severity fallbacks", report.severity_fallbacks.to_string())?;
    kv(w, "elapsed", format!("{}ms", report.elapsed.as_millis()))
}
