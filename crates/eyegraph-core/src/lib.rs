//! eyegraph-core library.
//!
//! Derives a patient/region/severity knowledge graph from the primary record
//! store and exports it as a node/link payload.
//!
//! # Conventions
//!
//! - **Errors**: Library operations return [`error::GraphError`]; config
//!   loading uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod export;
pub mod lock;
pub mod model;
pub mod rebuild;
pub mod source;
pub mod store;

pub use error::{ErrorCode, GraphError, SourceError};
pub use export::{GraphQueryExporter, VisualizationPayload};
pub use rebuild::{GraphRebuildEngine, RebuildOutcome, RebuildReport};
pub use source::{JsonDirSource, MemorySource, RecordSource};
pub use store::{GraphSession, GraphStore};
