pub mod build;
pub mod health;
pub mod visualize;

use eyegraph_core::GraphStore;
use eyegraph_core::config::GraphConfig;

/// Open the configured store. A failed connect is logged, not returned: the
/// handle stays disconnected and the core operations report it themselves.
pub fn open_store(config: &GraphConfig) -> GraphStore {
    let store = GraphStore::from_config(&config.graph);
    if let Err(err) = store.connect() {
        tracing::warn!(code = %err.code(), "graph store connect failed: {err}");
    }
    store
}

/// Like [`open_store`], but a missing store file is left uncreated and the
/// handle stays disconnected. Used by commands that only read.
pub fn open_existing_store(config: &GraphConfig) -> GraphStore {
    if config.graph.path.exists() {
        return open_store(config);
    }
    tracing::warn!(
        path = %config.graph.path.display(),
        "graph store not found; run `eyegraph build`"
    );
    GraphStore::from_config(&config.graph)
}
