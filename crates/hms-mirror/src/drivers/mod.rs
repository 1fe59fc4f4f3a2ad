//! Bundled collaborator implementations.
//!
//! - [`snapshot`]: metadata fetcher reading a YAML snapshot of both clusters
//! - [`script`]: executor that writes statements to per-environment script files
//! - [`memory`]: executor that records statements in memory
//!
//! Live cluster connectivity plugs in by implementing
//! [`MetadataFetcher`](crate::core::MetadataFetcher) and
//! [`StatementExecutor`](crate::core::StatementExecutor).

pub mod memory;
pub mod script;
pub mod snapshot;

pub use memory::MemoryExecutor;
pub use script::ScriptExecutor;
pub use snapshot::{MetadataSnapshot, SnapshotFetcher};
