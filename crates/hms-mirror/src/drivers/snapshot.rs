//! Metadata fetcher backed by a YAML snapshot of both clusters.
//!
//! ```yaml
//! left:
//!   databases:
//!     sales:
//!       properties:
//!         location: hdfs://LEFT/warehouse/tablespace/external/hive/sales.db
//!       tables:
//!         orders:
//!           owner: etl
//!           partitions: [dt=2024-01-01]
//!           ddl: |
//!             CREATE EXTERNAL TABLE `orders`(
//!             ...
//! right:
//!   unavailable: Could not open client transport
//! ```
//!
//! `unavailable` makes every call for that cluster fail with the given message,
//! which is how an unreachable metastore looks to the planner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::{Environment, MetadataFetcher};
use crate::error::{MirrorError, Result};

/// Captured metadata of the LEFT and RIGHT clusters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    #[serde(default)]
    pub left: ClusterSnapshot,

    #[serde(default)]
    pub right: ClusterSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Failure message returned for every call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,

    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    /// `describe_database` key/values.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default)]
    pub tables: BTreeMap<String, TableSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// `SHOW CREATE TABLE` text.
    pub ddl: String,

    #[serde(default)]
    pub partitions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl MetadataSnapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    fn cluster(&self, environment: Environment) -> Result<&ClusterSnapshot> {
        let cluster = match environment {
            Environment::Left => &self.left,
            Environment::Right => &self.right,
            other => {
                return Err(MirrorError::Invariant(format!(
                    "{} is not a cluster and has no metadata",
                    other
                )))
            }
        };
        match &cluster.unavailable {
            Some(message) => Err(MirrorError::metadata(environment.to_string(), message.clone())),
            None => Ok(cluster),
        }
    }
}

/// [`MetadataFetcher`] over a [`MetadataSnapshot`].
pub struct SnapshotFetcher {
    snapshot: MetadataSnapshot,
}

impl SnapshotFetcher {
    pub fn new(snapshot: MetadataSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(MetadataSnapshot::load(path)?))
    }

    fn database(&self, environment: Environment, database: &str) -> Result<&DatabaseSnapshot> {
        self.snapshot
            .cluster(environment)?
            .databases
            .get(database)
            .ok_or_else(|| {
                MirrorError::metadata(
                    database,
                    format!("Database {} does not exist on {}", database, environment),
                )
            })
    }

    fn table(&self, environment: Environment, database: &str, table: &str) -> Result<&TableSnapshot> {
        self.database(environment, database)?
            .tables
            .get(table)
            .ok_or_else(|| {
                MirrorError::metadata(
                    format!("{}.{}", database, table),
                    format!("Table not found on {}", environment),
                )
            })
    }
}

#[async_trait]
impl MetadataFetcher for SnapshotFetcher {
    async fn describe_database(
        &self,
        environment: Environment,
        database: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self.database(environment, database)?.properties.clone())
    }

    async fn list_tables(&self, environment: Environment, database: &str) -> Result<Vec<String>> {
        Ok(self
            .database(environment, database)?
            .tables
            .keys()
            .cloned()
            .collect())
    }

    async fn get_create_statement(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<Vec<String>> {
        let ddl = &self.table(environment, database, table)?.ddl;
        Ok(ddl
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim_end().to_string())
            .collect())
    }

    async fn list_partitions(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<Vec<String>> {
        Ok(self.table(environment, database, table)?.partitions.clone())
    }

    async fn table_owner(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<Option<String>> {
        Ok(self.table(environment, database, table)?.owner.clone())
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
left:
  databases:
    sales:
      properties:
        location: hdfs://LEFT/warehouse/tablespace/external/hive/sales.db
      tables:
        orders:
          owner: etl
          partitions: [dt=1, dt=2]
          ddl: |
            CREATE EXTERNAL TABLE `orders`(
              `id` string)
            PARTITIONED BY (
              `dt` string)
            LOCATION
              'hdfs://LEFT/warehouse/tablespace/external/hive/sales.db/orders'
right:
  unavailable: Could not open client transport with JDBC Uri
"#;

    fn fetcher() -> SnapshotFetcher {
        SnapshotFetcher::new(MetadataSnapshot::from_yaml(SNAPSHOT).unwrap())
    }

    #[tokio::test]
    async fn test_reads_left_metadata() {
        let fetcher = fetcher();
        let props = fetcher.describe_database(Environment::Left, "sales").await.unwrap();
        assert_eq!(
            props["location"],
            "hdfs://LEFT/warehouse/tablespace/external/hive/sales.db"
        );
        assert_eq!(
            fetcher.list_tables(Environment::Left, "sales").await.unwrap(),
            vec!["orders".to_string()]
        );

        let ddl = fetcher
            .get_create_statement(Environment::Left, "sales", "orders")
            .await
            .unwrap();
        assert_eq!(ddl.len(), 6);
        assert_eq!(ddl[0], "CREATE EXTERNAL TABLE `orders`(");
        assert_eq!(ddl[1], "  `id` string)");

        let partitions = fetcher
            .list_partitions(Environment::Left, "sales", "orders")
            .await
            .unwrap();
        assert_eq!(partitions, vec!["dt=1", "dt=2"]);
        let owner = fetcher.table_owner(Environment::Left, "sales", "orders").await.unwrap();
        assert_eq!(owner.as_deref(), Some("etl"));
    }

    #[tokio::test]
    async fn test_missing_objects_fail() {
        let fetcher = fetcher();
        assert!(fetcher.describe_database(Environment::Left, "hr").await.is_err());
        assert!(fetcher
            .get_create_statement(Environment::Left, "sales", "missing")
            .await
            .is_err());
        assert!(fetcher.list_tables(Environment::Shadow, "sales").await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_cluster() {
        let fetcher = fetcher();
        let err = fetcher
            .describe_database(Environment::Right, "sales")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Could not open client transport"));
    }
}
