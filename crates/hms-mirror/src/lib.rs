//! # hms-mirror
//!
//! Hive metastore migration planner.
//!
//! Given the table metadata of a source (LEFT) and target (RIGHT) cluster,
//! this library decides per table how it should be migrated and produces the
//! HiveQL that does it:
//!
//! - **Strategies** for schema-only, linked, shared-storage, SQL, export/import,
//!   hybrid, storage migration, dump and in-place ACID downgrade
//! - **Schema translation** of captured `SHOW CREATE TABLE` output
//! - **Location translation** with per-database overrides, a global location
//!   map and distcp planning
//! - **Parallel planning** with a configurable worker pool
//! - **Resume capability** via signed JSON state files
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hms_mirror::{Config, Orchestrator, SnapshotFetcher};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> hms_mirror::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let fetcher = Arc::new(SnapshotFetcher::load("metadata.yaml")?);
//!     let result = Orchestrator::new(config, fetcher)
//!         .with_output_dir("out".into())
//!         .run(CancellationToken::new())
//!         .await?;
//!     println!("Planned {} tables", result.tables_total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod sql;
pub mod state;
pub mod strategy;
pub mod translator;

// Re-exports for convenient access
pub use crate::core::{
    DataStrategy, DatabaseMirror, Environment, MetadataFetcher, PhaseState, Statement,
    StatementExecutor, TableDefinition, TableMirror,
};
pub use config::{Config, TableFilter};
pub use drivers::{MemoryExecutor, MetadataSnapshot, ScriptExecutor, SnapshotFetcher};
pub use error::{MirrorError, Result};
pub use orchestrator::{MirrorResult, Orchestrator};
pub use state::{RunState, RunStatus};
