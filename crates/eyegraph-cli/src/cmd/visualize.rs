//! `eyegraph visualize`: print the node/link payload.

use std::io::{self, Write};

use clap::Args;
use eyegraph_core::GraphQueryExporter;
use eyegraph_core::config::GraphConfig;

use crate::output::{CliError, OutputMode, render_error, write_json};

/// Arguments for `eyegraph visualize`.
#[derive(Args, Debug, Default)]
pub struct VisualizeArgs {
    /// Indent the JSON payload.
    #[arg(long)]
    pub pretty: bool,

    /// Maximum number of links to export (default: `[export] link_limit`).
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `eyegraph visualize`. Output is always JSON.
///
/// # Errors
///
/// Returns an error if reading the graph fails partway.
pub fn run_visualize(args: &VisualizeArgs, config: &GraphConfig) -> anyhow::Result<()> {
    let store = super::open_existing_store(config);
    let exporter = GraphQueryExporter::new(&store)
        .with_link_limit(args.limit.unwrap_or(config.export.link_limit));

    let payload = match exporter.get_visualization() {
        Ok(payload) => payload,
        Err(err) => {
            render_error(OutputMode::Json, &CliError::from(&err))?;
            return Err(err.into());
        }
    };
    store.close();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_json(&mut out, &payload, args.pretty)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visualize_args_default() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: VisualizeArgs,
        }

        let parsed = Wrapper::parse_from(["test"]);
        assert!(!parsed.args.pretty);
        assert!(parsed.args.limit.is_none());
    }
}
