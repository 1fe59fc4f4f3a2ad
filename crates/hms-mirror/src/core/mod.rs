//! Core planning model.
//!
//! - [`environment`]: role tags and the strategy/disposition/phase enums
//! - [`ddl`]: helpers over captured `SHOW CREATE TABLE` lines
//! - [`table`]: one environment's projection of a table
//! - [`mirror`]: the per-table migration unit
//! - [`database`]: the per-database record and database SQL
//! - [`copy_spec`]: transformation intent handed to the schema builder
//! - [`traits`]: metadata and execution collaborators

pub mod copy_spec;
pub mod database;
pub mod ddl;
pub mod environment;
pub mod mirror;
pub mod table;
pub mod traits;

// Re-export commonly used types for convenience
pub use copy_spec::CopySpec;
pub use database::DatabaseMirror;
pub use environment::{CreateStrategy, DataStrategy, Environment, PhaseState};
pub use mirror::{Marker, TableMirror};
pub use table::{Statement, TableDefinition};
pub use traits::{MetadataFetcher, StatementExecutor};
