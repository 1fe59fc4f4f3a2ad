//! One environment's projection of a table.

use super::ddl;
use super::CreateStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A described SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub description: String,
    pub sql: String,
}

impl Statement {
    pub fn new(description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sql: sql.into(),
        }
    }
}

/// Per-environment table record.
///
/// `definition` is only meaningful once `exists` has been established.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name in this environment.
    pub name: String,

    /// Whether the object exists in this environment.
    #[serde(default)]
    pub exists: bool,

    /// Disposition decided by the resolver.
    #[serde(default)]
    pub create_strategy: CreateStrategy,

    /// Raw `SHOW CREATE TABLE` lines.
    #[serde(default)]
    pub definition: Vec<String>,

    /// Table owner, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Partition specs, e.g. `dt=2020-01-01`.
    #[serde(default)]
    pub partitions: Vec<String>,

    /// Properties to merge into the definition after transformation.
    #[serde(default)]
    pub add_properties: BTreeMap<String, String>,

    /// Human-readable warnings explaining decisions.
    #[serde(default)]
    pub issues: Vec<String>,

    /// Actions taken against this table.
    #[serde(default)]
    pub actions: Vec<String>,

    /// Primary statements, in order.
    #[serde(default)]
    pub sql: Vec<Statement>,

    /// Statements to run after the data has been verified.
    #[serde(default)]
    pub cleanup_sql: Vec<Statement>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// An existing table with a captured definition.
    pub fn existing(name: impl Into<String>, definition: Vec<String>) -> Self {
        Self {
            name: name.into(),
            exists: true,
            definition,
            ..Default::default()
        }
    }

    /// Whether a definition has been built or captured.
    pub fn is_defined(&self) -> bool {
        !self.definition.is_empty()
    }

    pub fn add_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    pub fn add_action(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    pub fn add_sql(&mut self, description: impl Into<String>, sql: impl Into<String>) {
        self.sql.push(Statement::new(description, sql));
    }

    pub fn add_cleanup_sql(&mut self, description: impl Into<String>, sql: impl Into<String>) {
        self.cleanup_sql.push(Statement::new(description, sql));
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.add_properties.insert(key.into(), value.into());
    }

    pub fn is_partitioned(&self) -> bool {
        ddl::is_partitioned(&self.definition)
    }

    pub fn is_acid(&self) -> bool {
        ddl::is_acid(&self.definition)
    }

    pub fn is_managed(&self) -> bool {
        ddl::is_managed(&self.definition)
    }

    pub fn is_external(&self) -> bool {
        ddl::is_external(&self.definition)
    }

    pub fn is_external_purge(&self) -> bool {
        ddl::is_external_purge(&self.definition)
    }

    pub fn is_view(&self) -> bool {
        ddl::is_view(&self.definition)
    }

    pub fn is_native(&self) -> bool {
        ddl::is_native(&self.definition)
    }

    pub fn location(&self) -> Option<String> {
        ddl::get_location(&self.definition)
    }

    pub fn property(&self, key: &str) -> Option<String> {
        ddl::get_property(&self.definition, key)
    }

    pub fn has_property(&self, key: &str) -> bool {
        ddl::has_property(&self.definition, key)
    }

    pub fn partition_elements(&self) -> String {
        ddl::partition_elements(&self.definition).unwrap_or_default()
    }

    pub fn create_statement(&self, create_if_not_exists: bool) -> String {
        ddl::create_statement(&self.definition, create_if_not_exists)
    }

    /// Forget previously planned statements before replanning.
    pub fn clear_plan(&mut self) {
        self.sql.clear();
        self.cleanup_sql.clear();
    }
}
