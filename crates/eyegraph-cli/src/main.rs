#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use eyegraph_core::config::{GraphConfig, load_config, load_config_file};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "eyegraph: dry-eye patient knowledge graph",
    long_about = None
)]
struct Cli {
    /// Enable debug logging (ignored when `EYEGRAPH_LOG` is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of `.eyegraph/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding `patients.json` and `diagnosis.json`.
    #[arg(long, global = true, value_name = "DIR")]
    records: Option<PathBuf>,

    /// Graph store file.
    #[arg(long, global = true, value_name = "PATH")]
    graph: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    /// Load config and apply path overrides. Relative paths resolve against
    /// `project_root`.
    fn resolve_config(&self, project_root: &Path) -> anyhow::Result<GraphConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => load_config(project_root)?,
        };
        if let Some(records) = &self.records {
            config.records.dir.clone_from(records);
        }
        if let Some(graph) = &self.graph {
            config.graph.path.clone_from(graph);
        }
        Ok(config.rooted_at(project_root))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Wipe and rebuild the knowledge graph from patient records",
        after_help = "EXAMPLES:\n    # Rebuild from ./data\n    eyegraph build\n\n    # Emit the outcome payload\n    eyegraph build --json"
    )]
    Build(cmd::build::BuildArgs),

    #[command(
        about = "Export graph nodes and links as JSON",
        after_help = "EXAMPLES:\n    # Compact payload for a chart front end\n    eyegraph visualize > graph.json\n\n    # Indented, at most 50 links\n    eyegraph visualize --pretty --limit 50"
    )]
    Visualize(cmd::visualize::VisualizeArgs),

    #[command(about = "Check record source and graph store")]
    Health(cmd::health::HealthArgs),
}

/// Default filter when `EYEGRAPH_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose || env::var("DEBUG").is_ok() {
        "eyegraph=debug,eyegraph_core=debug,info"
    } else {
        "eyegraph=info,eyegraph_core=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("EYEGRAPH_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let format = env::var("EYEGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "starting");

    let project_root = env::current_dir()?;
    let output = cli.output_mode();
    let config = match cli.resolve_config(&project_root) {
        Ok(config) => config,
        Err(err) => {
            render_error(output, &CliError::config(&err))?;
            return Err(err);
        }
    };

    match cli.command {
        Commands::Build(ref args) => cmd::build::run_build(args, output, &config),
        Commands::Visualize(ref args) => cmd::visualize::run_visualize(args, &config),
        Commands::Health(ref args) => cmd::health::run_health(args, output, &config),
    }
}
