use super::{within_sql_partition_limit, PlanContext, Resolver};
use crate::config::Config;
use crate::core::ddl::{self, props};
use crate::core::{CopySpec, DataStrategy, Environment, TableDefinition, TableMirror};
use crate::error::Result;
use crate::schema::{build_table_schema, location_not_match_warehouse};
use crate::sql::{self as stmt, TransferKind};
use crate::translator;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

/// Moves a table's data to new storage on the LEFT cluster itself.
///
/// With distcp the table and its partitions are re-pointed at the translated
/// locations and the copy is left to distcp. Otherwise the table is renamed
/// aside, recreated at its new location and reloaded with SQL.
pub struct StorageMigration;

impl Resolver for StorageMigration {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::StorageMigration
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building STORAGE_MIGRATION definition", unit.qualified_name());
        let left = unit.require(Environment::Left)?.clone();

        if let Some(prefix) = migrated_prefix(config, &left) {
            if left.location().is_some_and(|l| l.starts_with(&prefix)) {
                unit.add_issue(Environment::Left, "Table has already been migrated");
                return Ok(false);
            }
        }
        if config.is_distcp() {
            return Ok(true);
        }

        ddl::upsert_property(
            &mut unit.table_mut(Environment::Left).definition,
            props::STORAGE_MIGRATED,
            &ctx.stage_timestamp,
        );

        let mut spec = CopySpec::new(Environment::Left, Environment::Right);
        if left.is_acid() {
            spec.set_strip_location(true);
            if config.migrate_acid.downgrade {
                spec.set_make_external(true)
                    .set_make_non_transactional(true)
                    .set_take_ownership(!config.no_purge);
            }
        } else {
            spec.set_replace_location(true);
        }
        build_table_schema(config, ctx, unit, &spec)
    }

    fn build_sql(&self, config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        if config.is_distcp() {
            relocate(config, ctx, unit)
        } else {
            rebuild(config, ctx, unit)
        }
    }
}

/// Warehouse root under the new storage that a migrated table would live in.
fn migrated_prefix(config: &Config, left: &TableDefinition) -> Option<String> {
    let common = config.transfer.common_storage.as_deref()?;
    let warehouse = &config.transfer.warehouse;
    let directory = if left.is_external() {
        warehouse.external_directory.as_deref()?
    } else {
        warehouse.managed_directory.as_deref()?
    };
    Some(format!(
        "{}/{}",
        common.trim_end_matches('/'),
        directory.trim_start_matches('/')
    ))
}

/// Name the original table is parked under while its replacement is loaded.
///
/// Derived from the run marker so a re-plan of the same run picks the same name.
fn parked_name(ctx: &PlanContext, unit: &TableMirror) -> String {
    let mut hasher = Sha1::new();
    hasher.update(ctx.run_marker.as_bytes());
    hasher.update(unit.qualified_name().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}_storage_migration", unit.name, &digest[..8])
}

/// distcp flavor: `SET LOCATION` on the table and each partition.
fn relocate(config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
    debug!("{}: building STORAGE_MIGRATION relocation", unit.qualified_name());
    let left = unit.require(Environment::Left)?.clone();
    let database = unit.database.clone();
    let Some(location) = left.location() else {
        unit.add_issue(Environment::Left, "Table has no LOCATION to migrate.");
        return Ok(false);
    };
    let expected = if !config.transfer.warehouse.is_complete() {
        None
    } else if left.is_external() {
        ctx.target_location.clone()
    } else {
        ctx.target_managed_location.clone()
    };

    unit.table_mut(Environment::Left)
        .add_sql(stmt::USE_DESC, stmt::use_db(&database));

    let mut clean = true;
    match translator::translate_table_location(config, unit, &location, 0) {
        Ok(translated) => {
            let source = unit.table_mut(Environment::Left);
            source.add_sql(
                stmt::ALTER_TABLE_LOCATION_DESC,
                stmt::set_table_location(&left.name, &translated.location),
            );
            if let Some(expected) = expected.as_deref() {
                if !translated.location.starts_with(expected) {
                    source.add_issue(location_not_match_warehouse("table", expected, &translated.location));
                }
            }
        }
        Err(err) => {
            warn!("{}: {}", unit.qualified_name(), err);
            unit.add_issue(Environment::Left, err.to_string());
            clean = false;
        }
    }

    for partition in &left.partitions {
        let original = format!("{}/{}", location.trim_end_matches('/'), partition);
        let level = partition.matches('/').count() + 1;
        match translator::translate_table_location(config, unit, &original, level) {
            Ok(translated) => {
                let spec = ddl::to_partition_spec(partition);
                let source = unit.table_mut(Environment::Left);
                source.add_sql(
                    format!("{} {}", stmt::ALTER_PARTITION_LOCATION_DESC, spec),
                    stmt::set_partition_location(&left.name, &spec, &translated.location),
                );
                if let Some(expected) = expected.as_deref() {
                    if !translated.location.starts_with(expected) {
                        source.add_issue(location_not_match_warehouse(
                            "partition",
                            expected,
                            &translated.location,
                        ));
                    }
                }
            }
            Err(err) => {
                unit.add_issue(Environment::Left, err.to_string());
                clean = false;
            }
        }
    }
    Ok(clean)
}

/// SQL flavor: park the original, create the replacement and load it.
fn rebuild(config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
    debug!("{}: building STORAGE_MIGRATION statements", unit.qualified_name());
    let left = unit.require(Environment::Left)?.clone();
    let right = unit.require(Environment::Right)?.clone();
    let database = unit.database.clone();
    let parked = parked_name(ctx, unit);
    let left_cluster = &config.clusters.left;

    let source = unit.table_mut(Environment::Left);
    source.clear_plan();
    source.add_sql(stmt::USE_DESC, stmt::use_db(&database));
    if left.has_property(props::TRANSLATED_TO_EXTERNAL) {
        source.add_sql(
            stmt::REMOVE_TABLE_PROP_DESC,
            stmt::unset_table_property(&left.name, props::TRANSLATED_TO_EXTERNAL),
        );
    }
    source.add_sql(stmt::RENAME_DESC, stmt::rename_table(&left.name, &parked));
    source.add_sql(
        stmt::CREATE_DESC,
        right.create_statement(left_cluster.create_if_not_exists),
    );
    if !left_cluster.legacy_hive && config.transfer_ownership {
        if let Some(owner) = left.owner.as_deref() {
            source.add_sql(stmt::SET_OWNER_DESC, stmt::set_owner(&right.name, owner));
        }
    }
    source.add_cleanup_sql(stmt::DROP_DESC, stmt::drop_table(&parked));

    if left_cluster.legacy_hive {
        source.add_sql(stmt::TEZ_EXECUTION_DESC, stmt::SET_TEZ_AS_EXECUTION_ENGINE);
    }
    source.sql.extend(stmt::session_overrides(config, Environment::Left));
    source.sql.extend(stmt::data_transfer(
        config,
        Environment::Left,
        &left,
        &parked,
        &right.name,
        TransferKind::NewNamespace,
    ));

    Ok(within_sql_partition_limit(config, unit))
}

#[cfg(test)]
mod tests {
    use super::super::plan_table;
    use super::super::testing::*;
    use super::*;
    use crate::core::ddl::fixtures;

    fn sm_config() -> Config {
        let mut config = config(DataStrategy::StorageMigration);
        config.transfer.common_storage = Some("s3a://bucket".into());
        config.transfer.warehouse.external_directory = Some("/warehouse/external".into());
        config.transfer.warehouse.managed_directory = Some("/warehouse/managed".into());
        config
    }

    fn orders() -> TableMirror {
        let mut orders = unit("orders", fixtures::external_partitioned(), None);
        orders.table_mut(Environment::Left).partitions = vec!["dt=2026-10-01".into()];
        orders
    }

    #[test]
    fn test_rebuild_on_new_storage() {
        let config = sm_config();
        let mut orders = orders();
        assert!(plan_table(&config, &ctx(), &mut orders).unwrap());

        let parked = parked_name(&ctx(), &orders);
        assert!(parked.starts_with("orders_") && parked.ends_with("_storage_migration"));
        let left = orders.table(Environment::Left).unwrap();
        assert!(left.has_property(props::STORAGE_MIGRATED));

        let sql = sql_of(&orders, Environment::Left);
        assert_eq!(sql[0], "USE sales");
        assert_eq!(sql[1], format!("ALTER TABLE orders RENAME TO {}", parked));
        assert!(sql[2].starts_with("CREATE EXTERNAL TABLE `orders`("));
        assert!(sql[2].contains("s3a://bucket/warehouse/tablespace/external/hive/sales.db/orders"));
        assert!(sql[2].contains(props::STORAGE_MIGRATED));
        assert!(sql
            .last()
            .unwrap()
            .starts_with(&format!("FROM {} INSERT OVERWRITE TABLE orders PARTITION", parked)));
        assert_eq!(left.cleanup_sql[0].sql, format!("DROP TABLE IF EXISTS {}", parked));
        assert!(sql_of(&orders, Environment::Right).is_empty());
    }

    #[test]
    fn test_parked_name_is_stable() {
        let orders = orders();
        assert_eq!(parked_name(&ctx(), &orders), parked_name(&ctx(), &orders));
        let other = PlanContext::new("20261020_080000", "2026-10-20 08:00:00");
        assert_ne!(parked_name(&ctx(), &orders), parked_name(&other, &orders));
    }

    #[test]
    fn test_already_migrated_is_skipped() {
        let config = sm_config();
        let mut definition = fixtures::external_partitioned();
        ddl::update_location(&mut definition, "s3a://bucket/warehouse/external/sales.db/orders");
        let mut orders = unit("orders", definition, None);
        assert!(!plan_table(&config, &ctx(), &mut orders).unwrap());
        assert_eq!(
            issues_of(&orders, Environment::Left),
            vec!["Table has already been migrated".to_string()]
        );
    }

    #[test]
    fn test_distcp_relocates_table_and_partitions() {
        let mut config = sm_config();
        config.transfer.storage_migration.distcp = true;
        let mut orders = orders();
        assert!(plan_table(&config, &ctx(), &mut orders).unwrap());

        let base = "s3a://bucket/warehouse/tablespace/external/hive/sales.db/orders";
        assert_eq!(
            sql_of(&orders, Environment::Left),
            vec![
                "USE sales".to_string(),
                format!("ALTER TABLE orders SET LOCATION \"{}\"", base),
                format!(
                    "ALTER TABLE orders PARTITION (dt=\"2026-10-01\") SET LOCATION \"{}/dt=2026-10-01\"",
                    base
                ),
            ]
        );
        assert!(orders
            .translations
            .iter()
            .all(|t| t.environment == Environment::Left));
        assert_eq!(orders.translations.len(), 2);
    }

    #[test]
    fn test_distcp_warns_outside_warehouse() {
        let mut config = sm_config();
        config.transfer.storage_migration.distcp = true;
        let ctx = ctx().for_database(Some("s3a://bucket/warehouse/external/sales.db"), None);
        let mut orders = orders();
        assert!(plan_table(&config, &ctx, &mut orders).unwrap());
        let issues = issues_of(&orders, Environment::Left);
        assert!(issues.iter().any(|i| i.contains("`table` location is still NOT aligned")));
        assert!(issues.iter().any(|i| i.contains("`partition` location is still NOT aligned")));
    }

    #[test]
    fn test_acid_downgrade_strips_location() {
        let mut config = sm_config();
        config.migrate_acid.on = true;
        config.migrate_acid.downgrade = true;
        let mut acid = unit("acid_orders", fixtures::acid_bucketed(4), None);
        assert!(plan_table(&config, &ctx(), &mut acid).unwrap());
        let right = acid.table(Environment::Right).unwrap();
        assert!(right.is_external());
        assert!(right.location().is_none());
    }
}
