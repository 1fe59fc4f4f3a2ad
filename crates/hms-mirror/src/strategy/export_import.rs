use super::{add_set_owner, PlanContext, Resolver};
use super::{EXPORT_IMPORT_SYNC, SCHEMA_EXISTS_NO_ACTION_DATA, SCHEMA_WILL_BE_CREATED};
use crate::config::Config;
use crate::core::ddl::props;
use crate::core::{CopySpec, CreateStrategy, DataStrategy, Environment, TableMirror};
use crate::error::Result;
use crate::schema::build_table_schema;
use crate::sql as stmt;
use crate::translator;
use tracing::debug;

/// LEFT exports each table to a directory, RIGHT imports it.
pub struct ExportImport;

impl Resolver for ExportImport {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::ExportImport
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building EXPORT_IMPORT definition", unit.qualified_name());
        let left = unit.require(Environment::Left)?.clone();
        let right_exists = unit.table(Environment::Right).map(|t| t.exists).unwrap_or(false);

        if right_exists && !config.sync {
            unit.add_issue(Environment::Left, SCHEMA_EXISTS_NO_ACTION_DATA);
            unit.table_mut(Environment::Right).create_strategy = CreateStrategy::Leave;
            return Ok(false);
        }
        if left.is_acid() && config.clusters.left.legacy_hive != config.clusters.right.legacy_hive {
            unit.add_issue(
                Environment::Left,
                "ACID table EXPORTs are NOT compatible for IMPORT to clusters on a different major version of Hive.",
            );
            return Ok(false);
        }
        if !left.is_native() {
            unit.add_issue(
                Environment::Left,
                "Can't process ACID tables, VIEWs, or Non Native Hive Tables with this strategy.",
            );
            return Ok(false);
        }

        let mut spec = CopySpec::new(Environment::Left, Environment::Right);
        spec.set_replace_location(true);
        if config.convert_managed() {
            spec.set_upgrade(true);
        }
        spec.set_take_ownership(!config.read_only && !config.no_purge);

        let right = unit.table_mut(Environment::Right);
        if right.exists {
            right.create_strategy = CreateStrategy::Replace;
        } else {
            right.add_issue(SCHEMA_WILL_BE_CREATED);
            right.create_strategy = CreateStrategy::Create;
        }
        build_table_schema(config, ctx, unit, &spec)
    }

    fn build_sql(&self, config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        export_import_sql(config, ctx, unit, false)
    }

    fn checks_avro(&self, unit: &TableMirror) -> bool {
        !unit
            .table(Environment::Left)
            .map(|t| t.is_acid())
            .unwrap_or(false)
    }
}

/// Directory the table is exported to, as seen from the exporting cluster.
fn export_location(config: &Config, ctx: &PlanContext, unit: &TableMirror) -> String {
    let transfer = &config.transfer;
    match transfer
        .intermediate_storage
        .as_deref()
        .or(transfer.common_storage.as_deref())
    {
        Some(storage) => format!(
            "{}/{}/{}/{}/{}",
            storage.trim_end_matches('/'),
            transfer.remote_working_directory,
            ctx.run_marker,
            unit.database,
            unit.name
        ),
        None => format!("{}{}/{}", transfer.export_base_dir_prefix, unit.database, unit.name),
    }
}

/// EXPORT on LEFT, then IMPORT on RIGHT, or both on LEFT for an in-place downgrade.
///
/// The in-place flavor renames the original to its archive name, exports the
/// archive and imports it back as an external table under the original name.
pub(super) fn export_import_sql(
    config: &Config,
    ctx: &PlanContext,
    unit: &mut TableMirror,
    in_place: bool,
) -> Result<bool> {
    debug!("{}: building EXPORT_IMPORT statements", unit.qualified_name());
    let left = unit.require(Environment::Left)?.clone();
    let right = unit.table(Environment::Right).cloned().unwrap_or_default();
    let database = unit.database.clone();
    let resolved = unit.resolved_database.clone();
    let bridged =
        config.transfer.intermediate_storage.is_some() || config.transfer.common_storage.is_some();

    let export_location = export_location(config, ctx, unit);
    let import_location = if bridged {
        export_location.clone()
    } else {
        format!("{}{}", config.clusters.left.namespace(), export_location)
    };

    let original_name = left.name.clone();
    let mut export_name = original_name.clone();
    let source = unit.table_mut(Environment::Left);
    source.add_sql(stmt::USE_DESC, stmt::use_db(&database));
    if in_place {
        if left.has_property(props::TRANSLATED_TO_EXTERNAL) {
            source.add_sql(
                stmt::REMOVE_TABLE_PROP_DESC,
                stmt::unset_table_property(&original_name, props::TRANSLATED_TO_EXTERNAL),
            );
        }
        export_name = format!("{}{}", original_name, stmt::ARCHIVE_SUFFIX);
        source.add_sql(stmt::RENAME_DESC, stmt::rename_table(&original_name, &export_name));
    }
    source.add_sql(stmt::EXPORT_DESC, stmt::export_table(&export_name, &export_location));

    let import = if left.is_acid() {
        if !config.migrate_acid.downgrade {
            stmt::import_table(&export_name, &import_location)
        } else if in_place {
            stmt::import_external_table(&original_name, &import_location)
        } else {
            stmt::import_external_table(&export_name, &import_location)
        }
    } else if config.reset_to_default_location {
        match config.transfer.warehouse.external_directory.as_deref() {
            Some(directory) => {
                let target = format!(
                    "{}{}/{}.db/{}",
                    config.clusters.right.namespace(),
                    directory,
                    resolved,
                    unit.name
                );
                stmt::import_external_table_location(&export_name, &import_location, &target)
            }
            None => stmt::import_external_table(&export_name, &import_location),
        }
    } else {
        let target = match right.location() {
            Some(location) => location,
            None => {
                let original = left.location().unwrap_or_default();
                translator::translate_table_location(config, unit, &original, 1)?.location
            }
        };
        stmt::import_external_table_location(&export_name, &import_location, &target)
    };

    if in_place {
        unit.table_mut(Environment::Left).add_sql(stmt::IMPORT_DESC, import);
    } else {
        let target = unit.table_mut(Environment::Right);
        target.add_sql(stmt::USE_DESC, stmt::use_db(&resolved));
        if target.exists && config.sync {
            target.add_sql(stmt::DROP_DESC, stmt::drop_table(&original_name));
            target.add_issue(EXPORT_IMPORT_SYNC);
        }
        target.add_sql(stmt::IMPORT_DESC, import);
        add_set_owner(config, target, left.owner.as_deref());
    }

    let limit = config.hybrid.export_import_partition_limit;
    if limit > 0 && left.partitions.len() > limit {
        let issue = if in_place {
            format!(
                "The number of partitions: {} exceeds the EXPORT_IMPORT partition limit \
                 (hybrid->exportImportPartitionLimit) of {}.  The queries will NOT be automatically run.",
                left.partitions.len(),
                limit
            )
        } else {
            format!(
                "The number of partitions: {} exceeds the configuration limit (hybrid->exportImportPartitionLimit) \
                 of {}.  This value is used to abort migrations that have a high potential for failure.  The \
                 migration will need to be done manually OR try increasing the limit.",
                left.partitions.len(),
                limit
            )
        };
        unit.add_issue(Environment::Left, issue);
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::super::plan_table;
    use super::super::testing::*;
    use super::*;
    use crate::core::ddl::fixtures;

    #[test]
    fn test_export_then_import_with_location() {
        let config = config(DataStrategy::ExportImport);
        let mut unit = unit("orders", fixtures::external_partitioned(), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());

        assert_eq!(
            sql_of(&unit, Environment::Left),
            vec![
                "USE sales".to_string(),
                "EXPORT TABLE orders TO \"/apps/hive/warehouse/export_sales/orders\"".to_string(),
            ]
        );
        assert_eq!(
            sql_of(&unit, Environment::Right),
            vec![
                "USE sales".to_string(),
                "IMPORT EXTERNAL TABLE orders FROM \"hdfs://LEFT/apps/hive/warehouse/export_sales/orders\" \
                 LOCATION \"hdfs://RIGHT/warehouse/tablespace/external/hive/sales.db/orders\""
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_existing_target_needs_sync() {
        let config = config(DataStrategy::ExportImport);
        let mut unit = unit(
            "orders",
            fixtures::external_partitioned(),
            Some(fixtures::external_partitioned()),
        );
        assert!(!plan_table(&config, &ctx(), &mut unit).unwrap());
        assert_eq!(
            issues_of(&unit, Environment::Left),
            vec![SCHEMA_EXISTS_NO_ACTION_DATA.to_string()]
        );
    }

    #[test]
    fn test_sync_drops_before_import() {
        let mut config = config(DataStrategy::ExportImport);
        config.sync = true;
        let mut unit = unit(
            "orders",
            fixtures::external_partitioned(),
            Some(fixtures::external_partitioned()),
        );
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());
        let right = sql_of(&unit, Environment::Right);
        assert_eq!(right[1], "DROP TABLE IF EXISTS orders");
        assert!(right[2].starts_with("IMPORT EXTERNAL TABLE orders"));
        assert!(issues_of(&unit, Environment::Right).contains(&EXPORT_IMPORT_SYNC.to_string()));
    }

    #[test]
    fn test_intermediate_storage_export_path() {
        let mut config = config(DataStrategy::ExportImport);
        config.transfer.intermediate_storage = Some("s3a://bridge/".into());
        let mut unit = unit("orders", fixtures::external_partitioned(), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());
        let working = "s3a://bridge/hms_mirror_working/20261019_120000/sales/orders";
        assert!(sql_of(&unit, Environment::Left)[1].contains(working));
        assert!(sql_of(&unit, Environment::Right)[1].contains(&format!("FROM \"{}\"", working)));
    }

    #[test]
    fn test_partition_limit_aborts() {
        let mut config = config(DataStrategy::ExportImport);
        config.hybrid.export_import_partition_limit = 1;
        let mut unit = unit("orders", fixtures::external_partitioned(), None);
        unit.table_mut(Environment::Left).partitions = vec!["dt=1".into(), "dt=2".into()];
        assert!(!plan_table(&config, &ctx(), &mut unit).unwrap());
        assert!(issues_of(&unit, Environment::Left)[0].contains("hybrid->exportImportPartitionLimit"));
    }

    #[test]
    fn test_acid_across_hive_versions_refused() {
        let mut config = config(DataStrategy::ExportImport);
        config.migrate_acid.on = true;
        config.clusters.right.legacy_hive = true;
        let mut unit = unit("acid_orders", fixtures::acid_bucketed(2), None);
        assert!(!plan_table(&config, &ctx(), &mut unit).unwrap());
        assert!(issues_of(&unit, Environment::Left)[0].contains("NOT compatible"));
    }
}
