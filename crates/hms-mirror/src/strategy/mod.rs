//! Per-table strategy resolution.
//!
//! Each [`DataStrategy`] has a [`Resolver`] that decides the disposition of the
//! target, asks [`build_table_schema`](crate::schema::build_table_schema) for
//! the definitions it needs and emits the statements that realize them.
//! [`plan_table`] picks the resolver for a unit (HYBRID, SQL and ACID tables
//! may be routed to another one) and runs it.
//!
//! Planning is synchronous and only touches the unit it is given.

mod acid_in_place;
mod common;
mod dump;
mod export_import;
mod hybrid;
mod intermediate;
mod linked;
mod schema_only;
mod sql;
mod storage_migration;

use crate::config::{Config, DataFlow};
use crate::core::ddl::props;
use crate::core::{CreateStrategy, DataStrategy, Environment, TableDefinition, TableMirror};
use crate::error::Result;
use crate::sql as stmt;
use crate::translator::LocationTranslation;
use regex::Regex;
use tracing::{debug, info};

pub const SCHEMA_EXISTS_NO_ACTION: &str = "Schema exists already and matches. No action necessary";
pub const SCHEMA_EXISTS_NO_ACTION_DATA: &str =
    "Schema exists already. Drop it and try again or add `--sync` to OVERWRITE current tables data.";
pub const SCHEMA_WILL_BE_CREATED: &str = "Schema will be created";
pub const SCHEMA_EXISTS_LEAVE: &str = "Schema exists already, no action. If you wish to rebuild the schema, drop \
     it first and try again. <b>Any following messages MAY be irrelevant about schema adjustments.</b>";
pub const CINE_WITH_EXIST: &str = "Schema exists already.  But you've specified 'createIfNotExist', which will \
     attempt to create and softly fail and continue with the remainder sql statements for the table.";
pub const SQL_SYNC_WO_CINE: &str =
    "Sync NOT supported with the SQL strategy without the `-cine|create-if-not-exist` flag.";
pub const SQL_SYNC_W_CINE: &str = "The schema already exists and you've asked for 'sync'.  The target tables \
     schema will remain in place and the tables data will be overwritten via SQL. NOTE: If the table is \
     partitioned and source partitions are deleted, those will NOT be removed through this process and may lead \
     to data inconsistencies.  If this is an issue, you should 'drop' the target table and restart the process \
     to get a clean bootstrap of the data.";
pub const SCHEMA_EXISTS_SYNC_ACID: &str = "Schema already exists.  You've specified '--sync', the target table \
     will be dropped and re-created.  The data will be overwritten.";
pub const EXPORT_IMPORT_SYNC: &str = "Schema EXISTS in target.  Table will be 'dropped' before IMPORT attempt.  \
     If the table isn't ACID or EXTERNAL/PURGE, existing data may prevent the RE-CREATION of the table when \
     script is executed.";
pub const ACID_NOT_ON: &str = "This is an ACID table.  Turn on ACID migration `-ma|--migrate-acid`.";
pub const NON_LEGACY_TO_LEGACY: &str = "Don't support Non-Legacy to Legacy conversions.";

const PROTOCOL_NAMESPACE: &str = r"^[a-zA-Z][a-zA-Z0-9+.\-]*://[^/]*";

/// Run-wide values that planning needs but must not compute itself.
///
/// Fixing these per run keeps two plans over the same metadata identical.
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    /// Directory-safe run identifier used for intermediate and export paths.
    pub run_marker: String,
    /// Stamp written into the metadata-stage table property.
    pub stage_timestamp: String,
    /// Resolved RIGHT database location, when the database plan set one.
    pub target_location: Option<String>,
    /// Resolved RIGHT database managed location.
    pub target_managed_location: Option<String>,
}

impl PlanContext {
    pub fn new(run_marker: impl Into<String>, stage_timestamp: impl Into<String>) -> Self {
        Self {
            run_marker: run_marker.into(),
            stage_timestamp: stage_timestamp.into(),
            ..Default::default()
        }
    }

    /// Context for one database, carrying its planned RIGHT locations.
    pub fn for_database(&self, location: Option<&str>, managed_location: Option<&str>) -> Self {
        Self {
            target_location: location.map(str::to_string),
            target_managed_location: managed_location.map(str::to_string),
            ..self.clone()
        }
    }
}

/// Plans one strategy for a unit.
///
/// `build_definitions` returning `Ok(false)` means the unit stops there: the
/// reason has been recorded as an issue and no statements are emitted.
pub trait Resolver: Send + Sync {
    fn strategy(&self) -> DataStrategy;

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool>;

    fn build_sql(&self, config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool>;

    /// Whether the AVRO schema url is checked between definitions and SQL.
    fn checks_avro(&self, _unit: &TableMirror) -> bool {
        false
    }
}

pub fn resolver(strategy: DataStrategy) -> &'static dyn Resolver {
    match strategy {
        DataStrategy::SchemaOnly => &schema_only::SchemaOnly,
        DataStrategy::Linked => &linked::Linked,
        DataStrategy::Common => &common::Common,
        DataStrategy::Sql => &sql::Sql,
        DataStrategy::ExportImport => &export_import::ExportImport,
        DataStrategy::Hybrid => &hybrid::Hybrid,
        DataStrategy::Intermediate => &intermediate::Intermediate,
        DataStrategy::StorageMigration => &storage_migration::StorageMigration,
        DataStrategy::Dump => &dump::Dump,
        DataStrategy::AcidDowngradeInPlace => &acid_in_place::AcidDowngradeInPlace,
    }
}

/// Why a captured LEFT table is left out of the run, if it is.
pub fn exclusion_reason(config: &Config, left: &TableDefinition) -> Option<String> {
    let dump = config.data_strategy == DataStrategy::Dump;
    if let Some(flag) = left.property(props::STORAGE_MIGRATED) {
        return Some(format!(
            "The table has already gone through the STORAGE_MIGRATION process on {} If this isn't correct, \
             remove the TBLPROPERTY '{}' from the table and try again.",
            flag,
            props::STORAGE_MIGRATED
        ));
    }
    if config.migrate_view.on && !dump {
        return (!left.is_view()).then(|| "VIEW's only processing selected.".to_string());
    }
    if left.is_acid() {
        if !config.migrate_acid.on {
            return Some("ACID table and ACID processing not selected (-ma|-mao).".to_string());
        }
    } else if left.is_native() {
        if config.migrate_acid.only {
            return Some("Non-ACID table and ACID only processing selected `-mao`".to_string());
        }
    } else if left.is_view() {
        if !dump {
            return Some("This is a VIEW and VIEW processing wasn't selected.".to_string());
        }
    } else if !config.migrate_non_native {
        return Some(
            "This is a Non-Native hive table and non-native process wasn't selected.".to_string(),
        );
    }
    None
}

/// Strategy that actually handles `unit` under the configured one.
pub fn route(config: &Config, unit: &mut TableMirror) -> DataStrategy {
    let acid = unit
        .table(Environment::Left)
        .map(TableDefinition::is_acid)
        .unwrap_or(false);
    let bridged =
        config.transfer.intermediate_storage.is_some() || config.transfer.common_storage.is_some();

    match config.data_strategy {
        DataStrategy::Sql | DataStrategy::ExportImport | DataStrategy::Hybrid
            if acid && config.migrate_acid.is_downgrade_in_place() =>
        {
            DataStrategy::AcidDowngradeInPlace
        }
        DataStrategy::Sql if bridged || acid => DataStrategy::Intermediate,
        DataStrategy::Hybrid => hybrid::route(config, unit),
        other => other,
    }
}

/// Resolve and plan one unit. Returns whether planning completed.
pub fn plan_table(config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
    let strategy = route(config, unit);
    unit.strategy = strategy;
    unit.add_step("TRANSFER", Some(strategy.to_string()));
    if strategy != config.data_strategy {
        debug!(
            "{}: {} routed to {}",
            unit.qualified_name(),
            config.data_strategy,
            strategy
        );
    }

    let resolver = resolver(strategy);
    unit.next_phase("Building definitions");
    if !resolver.build_definitions(config, ctx, unit)? {
        info!("{}: no definitions built", unit.qualified_name());
        return Ok(false);
    }
    if resolver.checks_avro(unit) {
        avro_check(config, unit)?;
    }
    unit.next_phase("Building SQL");
    if !resolver.build_sql(config, ctx, unit)? {
        return Ok(false);
    }
    if config.is_distcp() && !record_distcp(config, ctx, unit) {
        return Ok(false);
    }
    Ok(true)
}

/// Sync-mode disposition shared by SCHEMA_ONLY, LINKED and COMMON.
///
/// Returns `false` when the RIGHT table must be left alone and nothing should
/// be built. In read-only mode destructive dispositions degrade to LEAVE.
pub(crate) fn sync_disposition(config: &Config, unit: &mut TableMirror, matched_issue: &str) -> bool {
    let left_exists = unit.table(Environment::Left).map(|t| t.exists).unwrap_or(false);
    let right_exists = unit.table(Environment::Right).map(|t| t.exists).unwrap_or(false);
    let equal = unit.schemas_equal(Environment::Left, Environment::Right);
    let right = unit.table_mut(Environment::Right);

    match (left_exists, right_exists) {
        (false, true) => {
            right.add_issue("Schema doesn't exist in 'source'.  Will be DROPPED.");
            right.create_strategy = CreateStrategy::Drop;
        }
        (true, false) => {
            right.add_issue("Schema missing, will be CREATED");
            right.create_strategy = CreateStrategy::Create;
        }
        (true, true) if equal => {
            right.add_issue(matched_issue);
            right.create_strategy = CreateStrategy::Leave;
        }
        (true, true) => {
            if right.is_external_purge() {
                right.add_issue(
                    "Schema exists AND DOESN'T match.  But the 'RIGHT' table is has a PURGE option set. We can NOT \
                     safely replace the table without compromising the data. No action will be taken.",
                );
                right.create_strategy = CreateStrategy::Leave;
                return false;
            }
            right.add_issue("Schema exists AND DOESN'T match.  It will be REPLACED (DROPPED and RECREATED).");
            right.create_strategy = CreateStrategy::Replace;
        }
        (false, false) => {
            right.create_strategy = CreateStrategy::Nothing;
            return false;
        }
    }

    if config.read_only && right.create_strategy.is_destructive() {
        right.add_issue(format!(
            "Read-Only mode is set.  The {} of the RIGHT table was downgraded to LEAVE.",
            right.create_strategy
        ));
        right.create_strategy = CreateStrategy::Leave;
        return false;
    }
    true
}

/// Statements for a RIGHT table planned by SCHEMA_ONLY, LINKED or COMMON.
pub(crate) fn target_sql(config: &Config, unit: &mut TableMirror) -> Result<bool> {
    let database = unit.resolved_database.clone();
    let (partitioned, acid, owner) = match unit.table(Environment::Left) {
        Some(left) if left.exists => (left.is_partitioned(), left.is_acid(), left.owner.clone()),
        _ => (false, false, None),
    };
    let right_cluster = &config.clusters.right;
    let right = unit.table_mut(Environment::Right);

    match right.create_strategy {
        CreateStrategy::Nothing | CreateStrategy::Leave => {}
        CreateStrategy::Drop => {
            right.add_sql(stmt::USE_DESC, stmt::use_db(&database));
            let drop = if right.is_view() {
                stmt::drop_view(&right.name)
            } else {
                stmt::drop_table(&right.name)
            };
            right.add_sql(stmt::DROP_DESC, drop);
        }
        CreateStrategy::Replace => {
            right.add_sql(stmt::USE_DESC, stmt::use_db(&database));
            let drop = if right.is_view() {
                stmt::drop_view(&right.name)
            } else {
                stmt::drop_table(&right.name)
            };
            right.add_sql(stmt::DROP_DESC, drop);
            let create = right.create_statement(right_cluster.create_if_not_exists);
            right.add_sql(stmt::CREATE_DESC, create);
        }
        CreateStrategy::Create => {
            right.add_sql(stmt::USE_DESC, stmt::use_db(&database));
            let create = right.create_statement(right_cluster.create_if_not_exists);
            right.add_sql(stmt::CREATE_DESC, create);
            add_set_owner(config, right, owner.as_deref());
        }
    }

    if partitioned
        && !acid
        && matches!(right.create_strategy, CreateStrategy::Replace | CreateStrategy::Create)
        && right_cluster.partition_discovery.init_msck
    {
        let msck = stmt::msck_repair(&right.name);
        if config.is_distcp() {
            right.add_cleanup_sql(stmt::REPAIR_DESC, msck);
        } else {
            right.add_sql(stmt::REPAIR_DESC, msck);
        }
    }
    Ok(true)
}

/// `SET OWNER` for a created RIGHT table, when ownership transfer applies.
pub(crate) fn add_set_owner(config: &Config, right: &mut TableDefinition, owner: Option<&str>) {
    if config.clusters.right.legacy_hive || !config.transfer_ownership {
        return;
    }
    if let Some(owner) = owner {
        let sql = stmt::set_owner(&right.name, owner);
        right.add_sql(stmt::SET_OWNER_DESC, sql);
    }
}

/// Enforce the partition ceiling for SQL data movement. Records an issue on LEFT when exceeded.
pub(crate) fn within_sql_partition_limit(config: &Config, unit: &mut TableMirror) -> bool {
    let Some(left) = unit.table(Environment::Left) else {
        return true;
    };
    let count = left.partitions.len();
    let (limit, setting) = if left.is_acid() {
        (config.migrate_acid.partition_limit, "migrateACID->partitionLimit")
    } else {
        (config.hybrid.sql_partition_limit, "hybrid->sqlPartitionLimit")
    };
    if limit == 0 || count <= limit {
        return true;
    }
    unit.add_issue(
        Environment::Left,
        format!(
            "The number of partitions: {} exceeds the configuration limit ({}) of {}.  This value is used to \
             abort migrations that have a high potential for failure.  The migration will need to be done \
             manually OR try increasing the limit.",
            count, setting, limit
        ),
    );
    false
}

/// Rewrite a fully qualified LEFT `avro.schema.url` onto the RIGHT namespace.
pub(crate) fn avro_check(config: &Config, unit: &mut TableMirror) -> Result<()> {
    let Some(left_path) = unit
        .table(Environment::Left)
        .and_then(|t| t.property(props::AVRO_SCHEMA_URL))
    else {
        return Ok(());
    };
    info!("{}: is an AVRO table", unit.qualified_name());

    let left_ns = config.clusters.left.namespace();
    let right_ns = config.clusters.right.namespace();
    let protocol = Regex::new(PROTOCOL_NAMESPACE)?;
    let right_path = match protocol.find(&left_path) {
        Some(found) if !left_ns.is_empty() && found.as_str().starts_with(left_ns) => {
            let rewritten = format!("{}{}", right_ns, &left_path[left_ns.len()..]);
            if let Some(right) = unit.environments.get_mut(&Environment::Right) {
                if right.is_defined() {
                    crate::core::ddl::upsert_property(
                        &mut right.definition,
                        props::AVRO_SCHEMA_URL,
                        &rewritten,
                    );
                }
            }
            Some(rewritten)
        }
        Some(_) => {
            let right = unit.table_mut(Environment::Right);
            right.add_issue(format!(
                "AVRO Schema URL was NOT adjusted. Current (LEFT) path did NOT match the LEFT hcfsnamespace. \
                 {} is NOT in the {}. Can't determine change, so we'll not do anything.",
                left_path, left_ns
            ));
            right.add_issue("Schema creation may fail if location isn't available to RIGHT cluster.");
            None
        }
        None => {
            unit.add_issue(
                Environment::Right,
                format!(
                    "AVRO Schema URL appears to be relative: {}. No table definition adjustments.",
                    left_path
                ),
            );
            Some(format!("{}{}", right_ns, left_path))
        }
    };

    if config.copy_avro_schema_urls {
        if let Some(right_path) = right_path {
            let source = if protocol.is_match(&left_path) {
                left_path.clone()
            } else {
                format!("{}{}", left_ns, left_path)
            };
            unit.table_mut(Environment::Right)
                .add_action(format!("hdfs dfs -cp -f {} {}", source, right_path));
        }
    }
    unit.add_step("AVRO", Some("Checked".to_string()));
    Ok(())
}

/// Copies no location translation recorded, added once the unit planned successfully.
///
/// With intermediate storage the data makes two hops: LEFT into the working
/// directory, then the working directory into the final location. Returns
/// `false` when distcp can't move this table's data.
fn record_distcp(config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> bool {
    let left = unit.table(Environment::Left).cloned().unwrap_or_default();
    let acid = left.is_acid();
    let location_of = |unit: &TableMirror, environment: Environment| {
        unit.table(environment)
            .filter(|t| t.is_defined())
            .and_then(TableDefinition::location)
    };
    let right_location =
        location_of(unit, Environment::Right).or_else(|| default_external_location(config, unit));
    let database = unit.resolved_database.clone();
    let mut pairs: Vec<(Environment, Option<String>, Option<String>)> = Vec::new();

    if let Some(intermediate) = config.transfer.intermediate_storage.as_deref() {
        let working = format!(
            "{}/{}/{}/{}/{}",
            intermediate.trim_end_matches('/'),
            config.transfer.remote_working_directory,
            ctx.run_marker,
            unit.database,
            unit.name
        );
        let final_location = location_of(unit, Environment::Shadow)
            .filter(|l| *l != working)
            .or(right_location);
        pairs.push((Environment::Left, left.location(), Some(working.clone())));
        pairs.push((Environment::Right, Some(working), final_location));
    } else if config.transfer.common_storage.is_some()
        && config.data_strategy != DataStrategy::StorageMigration
    {
        let (original, target) = if acid {
            let target = if config.migrate_acid.downgrade {
                right_location
            } else {
                location_of(unit, Environment::Shadow)
            };
            (location_of(unit, Environment::Transfer), target)
        } else {
            (left.location(), right_location)
        };
        pairs.push((Environment::Left, original, target));
    } else if !unit.translations.is_empty() {
        return true;
    } else if acid
        && !config.migrate_acid.downgrade
        && config.data_strategy != DataStrategy::StorageMigration
    {
        unit.add_issue(
            Environment::Right,
            "`distcp` can NOT be used to migrate data for ACID tables.  Try using strategies: SQL, \
             EXPORT_IMPORT, or HYBRID",
        );
        return false;
    } else {
        let original = if acid {
            location_of(unit, Environment::Transfer)
        } else {
            left.location()
        };
        let environment = match config.transfer.storage_migration.data_flow {
            DataFlow::Pull => Environment::Right,
            DataFlow::Push => Environment::Left,
        };
        pairs.push((environment, original, right_location));
    }

    for (environment, original, translated) in pairs {
        if let (Some(original), Some(translated)) = (original, translated) {
            unit.record_translation(LocationTranslation {
                database: database.clone(),
                environment,
                original,
                translated,
                level: 0,
            });
        }
    }
    true
}

/// `<ns><external dir>/<db>.db/<table>`, used when a definition carries no location.
pub(crate) fn default_external_location(config: &Config, unit: &TableMirror) -> Option<String> {
    if !config.reset_to_default_location {
        return None;
    }
    let dir = config.transfer.warehouse.external_directory.as_deref()?;
    let base = config
        .transfer
        .common_storage
        .as_deref()
        .map(|c| c.trim_end_matches('/'))
        .unwrap_or_else(|| config.clusters.right.namespace());
    Some(format!("{}{}/{}.db/{}", base, dir, unit.resolved_database, unit.name))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn config(strategy: DataStrategy) -> Config {
        let mut config = Config::default();
        config.data_strategy = strategy;
        config.databases = vec!["sales".into()];
        config.clusters.left.hcfs_namespace = Some("hdfs://LEFT".into());
        config.clusters.right.hcfs_namespace = Some("hdfs://RIGHT".into());
        config
    }

    pub fn ctx() -> PlanContext {
        PlanContext::new("20261019_120000", "2026-10-19 12:00:00")
    }

    /// Unit with a captured LEFT table and an optional captured RIGHT table.
    pub fn unit(name: &str, left: Vec<String>, right: Option<Vec<String>>) -> TableMirror {
        let mut unit = TableMirror::new("sales", "sales", name);
        unit.environments
            .insert(Environment::Left, TableDefinition::existing(name, left));
        let mut target = TableDefinition::new(name);
        if let Some(definition) = right {
            target = TableDefinition::existing(name, definition);
        }
        unit.environments.insert(Environment::Right, target);
        unit
    }

    pub fn sql_of(unit: &TableMirror, environment: Environment) -> Vec<String> {
        unit.table(environment)
            .map(|t| t.sql.iter().map(|s| s.sql.clone()).collect())
            .unwrap_or_default()
    }

    pub fn issues_of(unit: &TableMirror, environment: Environment) -> Vec<String> {
        unit.table(environment)
            .map(|t| t.issues.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::core::ddl::{self, fixtures};

    #[test]
    fn test_exclusions() {
        let mut config = config(DataStrategy::SchemaOnly);
        let acid = TableDefinition::existing("acid_orders", fixtures::acid_bucketed(2));
        assert!(exclusion_reason(&config, &acid).unwrap().contains("ACID table"));
        config.migrate_acid.on = true;
        assert!(exclusion_reason(&config, &acid).is_none());

        let view = TableDefinition::existing("big_orders", fixtures::view());
        assert!(exclusion_reason(&config, &view).unwrap().contains("VIEW"));
        config.data_strategy = DataStrategy::Dump;
        assert!(exclusion_reason(&config, &view).is_none());

        config.data_strategy = DataStrategy::SchemaOnly;
        config.migrate_view.on = true;
        let table = TableDefinition::existing("orders", fixtures::external_partitioned());
        assert!(exclusion_reason(&config, &table).is_some());
        assert!(exclusion_reason(&config, &view).is_none());
    }

    #[test]
    fn test_storage_migrated_tables_excluded() {
        let config = config(DataStrategy::StorageMigration);
        let mut definition = fixtures::external_partitioned();
        ddl::upsert_property(&mut definition, props::STORAGE_MIGRATED, "2026-10-01");
        let table = TableDefinition::existing("orders", definition);
        let reason = exclusion_reason(&config, &table).unwrap();
        assert!(reason.contains("2026-10-01"));
    }

    #[test]
    fn test_route_sql_acid_and_bridged() {
        let mut config = config(DataStrategy::Sql);
        config.migrate_acid.on = true;
        let mut acid = unit("acid_orders", fixtures::acid_bucketed(2), None);
        assert_eq!(route(&config, &mut acid), DataStrategy::Intermediate);

        let mut plain = unit("orders", fixtures::external_partitioned(), None);
        assert_eq!(route(&config, &mut plain), DataStrategy::Sql);
        config.transfer.intermediate_storage = Some("s3a://bridge".into());
        assert_eq!(route(&config, &mut plain), DataStrategy::Intermediate);

        config.migrate_acid.downgrade = true;
        config.migrate_acid.in_place = true;
        assert_eq!(route(&config, &mut acid), DataStrategy::AcidDowngradeInPlace);
    }

    #[test]
    fn test_sync_purge_protected_is_left() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.sync = true;
        let mut right = fixtures::external_partitioned();
        right.insert(2, "  `note` string,".to_string());
        ddl::upsert_property(&mut right, props::EXTERNAL_TABLE_PURGE, "true");
        let mut unit = unit("orders", fixtures::external_partitioned(), Some(right));

        assert!(!sync_disposition(&config, &mut unit, SCHEMA_EXISTS_NO_ACTION));
        let right = unit.table(Environment::Right).unwrap();
        assert_eq!(right.create_strategy, CreateStrategy::Leave);
        assert!(right.issues[0].contains("PURGE option set"));
    }

    #[test]
    fn test_sync_read_only_degrades_replace() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.sync = true;
        config.read_only = true;
        let mut right = fixtures::external_partitioned();
        right.insert(2, "  `note` string,".to_string());
        let mut unit = unit("orders", fixtures::external_partitioned(), Some(right));

        assert!(!sync_disposition(&config, &mut unit, SCHEMA_EXISTS_NO_ACTION));
        let right = unit.table(Environment::Right).unwrap();
        assert_eq!(right.create_strategy, CreateStrategy::Leave);
        assert!(right.issues.iter().any(|i| i.contains("Read-Only")));
    }

    #[test]
    fn test_partition_limit() {
        let mut config = config(DataStrategy::Sql);
        config.hybrid.sql_partition_limit = 2;
        let mut unit = unit("orders", fixtures::external_partitioned(), None);
        unit.table_mut(Environment::Left).partitions =
            vec!["dt=1".into(), "dt=2".into(), "dt=3".into()];
        assert!(!within_sql_partition_limit(&config, &mut unit));
        assert!(issues_of(&unit, Environment::Left)[0].contains("hybrid->sqlPartitionLimit"));

        config.hybrid.sql_partition_limit = 0;
        assert!(within_sql_partition_limit(&config, &mut unit));
    }

    #[test]
    fn test_avro_url_rewritten_to_right() {
        let config = config(DataStrategy::SchemaOnly);
        let mut left = fixtures::external_partitioned();
        ddl::upsert_property(
            &mut left,
            props::AVRO_SCHEMA_URL,
            "hdfs://LEFT/schemas/orders.avsc",
        );
        let mut unit = unit("orders", left.clone(), None);
        let right = unit.table_mut(Environment::Right);
        right.definition = left;

        avro_check(&config, &mut unit).unwrap();
        let right = unit.table(Environment::Right).unwrap();
        assert_eq!(
            right.property(props::AVRO_SCHEMA_URL).as_deref(),
            Some("hdfs://RIGHT/schemas/orders.avsc")
        );
        assert_eq!(unit.steps.last().unwrap().mark, "AVRO");
    }

    #[test]
    fn test_avro_url_foreign_and_relative() {
        let config = config(DataStrategy::SchemaOnly);
        let mut left = fixtures::external_partitioned();
        ddl::upsert_property(&mut left, props::AVRO_SCHEMA_URL, "s3a://elsewhere/orders.avsc");
        let mut foreign = unit("orders", left, None);
        avro_check(&config, &mut foreign).unwrap();
        assert!(issues_of(&foreign, Environment::Right)[0].contains("was NOT adjusted"));

        let mut left = fixtures::external_partitioned();
        ddl::upsert_property(&mut left, props::AVRO_SCHEMA_URL, "/schemas/orders.avsc");
        let mut relative = unit("orders", left, None);
        avro_check(&config, &mut relative).unwrap();
        assert!(issues_of(&relative, Environment::Right)[0].contains("appears to be relative"));
    }

    #[test]
    fn test_plan_is_repeatable() {
        let config = config(DataStrategy::SchemaOnly);
        let mut first = unit("orders", fixtures::external_partitioned(), None);
        let mut second = first.clone();
        assert!(plan_table(&config, &ctx(), &mut first).unwrap());
        assert!(plan_table(&config, &ctx(), &mut second).unwrap());
        assert_eq!(
            first.table(Environment::Right).unwrap().sql,
            second.table(Environment::Right).unwrap().sql
        );
        assert_eq!(first.strategy, DataStrategy::SchemaOnly);
    }

    #[test]
    fn test_intermediate_distcp_pairs_recorded() {
        let mut config = config(DataStrategy::Sql);
        config.transfer.intermediate_storage = Some("s3a://bridge/".into());
        config.transfer.storage_migration.distcp = true;
        let mut unit = unit("orders", fixtures::external_partitioned(), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());

        let working = "s3a://bridge/hms_mirror_working/20261019_120000/sales/orders";
        assert!(unit.translations.iter().any(|t| t.environment == Environment::Left
            && t.original == "hdfs://LEFT/warehouse/tablespace/external/hive/sales.db/orders"
            && t.translated == working));
        assert!(unit
            .translations
            .iter()
            .any(|t| t.environment == Environment::Right && t.original == working));
    }
}
