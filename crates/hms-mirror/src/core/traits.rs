//! Collaborator traits consumed by the planner.
//!
//! - [`MetadataFetcher`]: reads database and table metadata from a cluster
//! - [`StatementExecutor`]: runs planned statements against a cluster
//!
//! Planning itself never awaits; these are the only suspension points of a run.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

use super::{Environment, Statement};

/// Read metadata from the LEFT or RIGHT cluster.
///
/// An `Err` from any method means "could not fetch". Callers decide whether
/// that is absence or a transient failure by matching the error text against
/// the configured transient patterns.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// `DESCRIBE DATABASE EXTENDED` as a key/value map (`location`, `managedlocation`, `comment`, `owner`).
    async fn describe_database(
        &self,
        environment: Environment,
        database: &str,
    ) -> Result<BTreeMap<String, String>>;

    /// Table and view names in a database.
    async fn list_tables(&self, environment: Environment, database: &str) -> Result<Vec<String>>;

    /// `SHOW CREATE TABLE` output, one element per line.
    async fn get_create_statement(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<Vec<String>>;

    /// Partition specs in `k=v/k2=v2` form, ordered.
    async fn list_partitions(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<Vec<String>>;

    /// Table owner, when the source exposes it.
    async fn table_owner(
        &self,
        _environment: Environment,
        _database: &str,
        _table: &str,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Run statements against a cluster.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute one statement. Statements arrive in plan order per table.
    async fn execute(&self, environment: Environment, statement: &Statement) -> Result<()>;

    /// Flush any buffered output.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Short name used in logs.
    fn name(&self) -> &str;
}
