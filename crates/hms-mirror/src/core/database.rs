//! Database-level record and database SQL.

use super::{DataStrategy, Environment, Statement, TableMirror};
use crate::config::Config;
use crate::sql;
use crate::translator::{reduce_url_by, LocationTranslation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys of the map returned by `describe_database`.
pub mod db_props {
    pub const LOCATION: &str = "location";
    pub const MANAGED_LOCATION: &str = "managedlocation";
    pub const COMMENT: &str = "comment";
    pub const OWNER: &str = "owner";
}

/// Default managed warehouse of Hive 3 clusters.
const DEFAULT_MANAGED_BASE_DIR: &str = "/warehouse/tablespace/managed/hive";

/// One database in the run: its definition per environment, its SQL and its tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseMirror {
    /// Source database name.
    pub name: String,

    /// Target database name.
    pub resolved_name: String,

    /// `describe_database` output per environment.
    #[serde(default)]
    pub properties: BTreeMap<Environment, BTreeMap<String, String>>,

    #[serde(default)]
    pub issues: BTreeMap<Environment, Vec<String>>,

    /// Database statements, run before any table statements.
    #[serde(default)]
    pub sql: BTreeMap<Environment, Vec<Statement>>,

    /// Migration units keyed by source table name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableMirror>,

    /// Tables skipped before planning, with the reason.
    #[serde(default)]
    pub filtered_out: BTreeMap<String, String>,
}

impl DatabaseMirror {
    pub fn new(name: impl Into<String>, resolved_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved_name: resolved_name.into(),
            ..Default::default()
        }
    }

    /// Unit for `table`, created on first use.
    pub fn add_table(&mut self, table: &str) -> &mut TableMirror {
        let (name, resolved) = (self.name.clone(), self.resolved_name.clone());
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| TableMirror::new(name, resolved, table))
    }

    pub fn property(&self, environment: Environment, key: &str) -> Option<&str> {
        self.properties
            .get(&environment)
            .and_then(|p| p.get(key))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn add_issue(&mut self, environment: Environment, issue: impl Into<String>) {
        self.issues.entry(environment).or_default().push(issue.into());
    }

    fn add_sql(&mut self, environment: Environment, description: &str, statement: String) {
        self.sql
            .entry(environment)
            .or_default()
            .push(Statement::new(description, statement));
    }

    pub fn statements(&self, environment: Environment) -> &[Statement] {
        self.sql.get(&environment).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_issues(&self) -> bool {
        self.issues.values().any(|i| !i.is_empty()) || self.tables.values().any(|t| t.has_issues())
    }

    /// Every location translation recorded by this database's units.
    pub fn translations(&self) -> Vec<LocationTranslation> {
        self.tables
            .values()
            .flat_map(|t| t.translations.iter().cloned())
            .collect()
    }

    /// Plan the database statements for the configured strategy.
    pub fn build_statements(&mut self, config: &Config) {
        self.sql.clear();
        if config.migrate_acid.is_downgrade_in_place() {
            return;
        }
        match config.data_strategy {
            DataStrategy::AcidDowngradeInPlace => {}
            DataStrategy::Dump => self.build_dump(config),
            DataStrategy::StorageMigration => self.build_storage_migration(config),
            DataStrategy::Linked | DataStrategy::Common => self.build_shared_storage(),
            DataStrategy::SchemaOnly
            | DataStrategy::Sql
            | DataStrategy::ExportImport
            | DataStrategy::Hybrid
            | DataStrategy::Intermediate => self.build_translated(config),
        }
    }

    fn create_database_text(&self, location: Option<&str>, managed: Option<&str>) -> String {
        let mut text = sql::create_database(&self.resolved_name);
        if let Some(comment) = self.property(Environment::Left, db_props::COMMENT) {
            text.push_str(&format!("\nCOMMENT \"{}\"", comment));
        }
        if let Some(location) = location {
            text.push_str(&format!("\nLOCATION \"{}\"", location));
        }
        if let Some(managed) = managed {
            text.push_str(&format!("\nMANAGEDLOCATION \"{}\"", managed));
        }
        text
    }

    fn build_dump(&mut self, config: &Config) {
        let location = self
            .property(Environment::Left, db_props::LOCATION)
            .map(str::to_string);
        let managed = if config.clusters.left.legacy_hive {
            None
        } else {
            self.property(Environment::Left, db_props::MANAGED_LOCATION)
                .map(str::to_string)
        };
        let text = self.create_database_text(location.as_deref(), managed.as_deref());
        self.add_sql(Environment::Left, sql::CREATE_DB_DESC, text);
    }

    /// Database locations tables are expected to land under, as planned by [`build_statements`](Self::build_statements).
    pub fn target_locations(&self, config: &Config) -> (Option<String>, Option<String>) {
        if config.data_strategy != DataStrategy::StorageMigration {
            let location = self.property(Environment::Right, db_props::LOCATION);
            let managed = self.property(Environment::Right, db_props::MANAGED_LOCATION);
            return (location.map(str::to_string), managed.map(str::to_string));
        }
        let common = config
            .transfer
            .common_storage
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/');
        let under = |dir: &Option<String>| {
            dir.as_ref()
                .map(|d| format!("{}{}/{}.db", common, d, self.name))
        };
        let warehouse = &config.transfer.warehouse;
        (
            under(&warehouse.external_directory),
            under(&warehouse.managed_directory),
        )
    }

    fn build_storage_migration(&mut self, config: &Config) {
        let common = config
            .transfer
            .common_storage
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/');
        let warehouse = &config.transfer.warehouse;
        if let Some(dir) = &warehouse.external_directory {
            let location = format!("{}{}/{}.db", common, dir, self.name);
            let stmt = sql::alter_db_location(&self.name, &location);
            self.add_sql(Environment::Left, sql::ALTER_DB_LOCATION_DESC, stmt);
        }
        if let Some(dir) = &warehouse.managed_directory {
            let location = format!("{}{}/{}.db", common, dir, self.name);
            let stmt = sql::alter_db_managed_location(&self.name, &location);
            self.add_sql(Environment::Left, sql::ALTER_DB_MNGD_LOCATION_DESC, stmt);
        }
        let issue = format!(
            "This process, when 'executed' will leave the original tables intact in their renamed version.  \
             They are NOT automatically cleaned up.  Run the produced '{}_LEFT_CleanUp_execute.sql' file to \
             permanently remove them.  Managed and External/Purge table data will be removed when dropping \
             these tables.  External non-purge table data will remain in storage.",
            self.name
        );
        self.add_issue(Environment::Left, issue);
    }

    /// LINKED and COMMON: the target database points at the source's storage.
    fn build_shared_storage(&mut self) {
        let location = self
            .property(Environment::Left, db_props::LOCATION)
            .map(str::to_string);
        let managed = self
            .property(Environment::Left, db_props::MANAGED_LOCATION)
            .map(str::to_string);
        let text = self.create_database_text(location.as_deref(), managed.as_deref());
        self.add_sql(Environment::Right, sql::CREATE_DB_DESC, text);
    }

    fn build_translated(&mut self, config: &Config) {
        let left_ns = config.clusters.left.namespace().to_string();
        let right_ns = config.clusters.right.namespace().to_string();
        let base = config
            .transfer
            .common_storage
            .as_deref()
            .map(|c| c.trim_end_matches('/').to_string())
            .unwrap_or_else(|| right_ns.clone());
        let warehouse = &config.transfer.warehouse;

        let mut location = self
            .property(Environment::Left, db_props::LOCATION)
            .map(str::to_string);
        if let Some(dir) = &warehouse.external_directory {
            location = Some(format!("{}{}/{}.db", base, dir, self.name));
        }

        let mut managed = if config.clusters.left.legacy_hive {
            None
        } else {
            self.property(Environment::Left, db_props::MANAGED_LOCATION)
                .map(str::to_string)
        };
        if let Some(dir) = &warehouse.managed_directory {
            if !config.clusters.right.legacy_hive {
                managed = Some(format!("{}{}/{}.db", base, dir, self.name));
            }
        }

        if let Some(loc) = location.take() {
            let loc = replace_namespace(&loc, &left_ns, &right_ns);
            let relative = loc.strip_prefix(right_ns.as_str()).unwrap_or(&loc);
            if !config.clusters.left.legacy_hive && relative.starts_with(DEFAULT_MANAGED_BASE_DIR) {
                self.add_issue(
                    Environment::Right,
                    "The LEFT's DB 'LOCATION' element was defined as the default 'managed' location in \
                     later versions of Hive3.  We've adjusted the DB to set the MANAGEDLOCATION setting \
                     instead, to avoid future conflicts. If your target environment is HDP3, this setting \
                     will FAIL since the MANAGEDLOCATION property for a Database doesn't exist. Fix the \
                     source DB's location element to avoid this translation.",
                );
                managed = Some(loc);
            } else {
                location = Some(loc);
            }
        }
        managed = managed.map(|m| replace_namespace(&m, &left_ns, &right_ns));

        if self.resolved_name != self.name {
            let rebase = |url: String| format!("{}/{}.db", reduce_url_by(&url, 1), self.resolved_name);
            location = location.map(&rebase);
            managed = managed.map(&rebase);
        }

        if let Some(overrides) = config.translator.databases.get(&self.name) {
            if let Some(loc) = &overrides.location {
                location = Some(loc.clone());
            }
            if let Some(loc) = &overrides.managed_location {
                managed = Some(loc.clone());
            }
        }
        if config.clusters.right.legacy_hive {
            managed = None;
        }

        let right = self.properties.entry(Environment::Right).or_default();
        right.remove(db_props::LOCATION);
        right.remove(db_props::MANAGED_LOCATION);
        if let Some(loc) = &location {
            right.insert(db_props::LOCATION.to_string(), loc.clone());
        }
        if let Some(loc) = &managed {
            right.insert(db_props::MANAGED_LOCATION.to_string(), loc.clone());
        }

        let create = self.create_database_text(None, None);
        self.add_sql(Environment::Right, sql::CREATE_DB_DESC, create);
        if let Some(loc) = location {
            let stmt = sql::alter_db_location(&self.resolved_name, &loc);
            self.add_sql(Environment::Right, sql::ALTER_DB_LOCATION_DESC, stmt);
        }
        if let Some(loc) = managed {
            let stmt = sql::alter_db_managed_location(&self.resolved_name, &loc);
            self.add_sql(Environment::Right, sql::ALTER_DB_MNGD_LOCATION_DESC, stmt);
        }
    }
}

fn replace_namespace(url: &str, from: &str, to: &str) -> String {
    if !from.is_empty() && url.starts_with(from) {
        format!("{}{}", to, &url[from.len()..])
    } else {
        url.to_string()
    }
}
