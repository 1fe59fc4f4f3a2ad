use super::sql::{final_table_sql, transfer_sql};
use super::{PlanContext, Resolver};
use super::{CINE_WITH_EXIST, NON_LEGACY_TO_LEGACY, SCHEMA_EXISTS_NO_ACTION_DATA, SCHEMA_EXISTS_SYNC_ACID};
use crate::config::Config;
use crate::core::{CopySpec, CreateStrategy, DataStrategy, Environment, TableMirror};
use crate::error::Result;
use crate::schema::build_table_schema;
use crate::sql as stmt;
use tracing::debug;

/// SQL transfer staged through a TRANSFER table on LEFT.
///
/// Used for ACID tables and whenever intermediate or common storage bridges
/// the clusters. The TRANSFER table lands the data where RIGHT can read it, a
/// SHADOW table on RIGHT exposes it, and the final table is loaded from there.
pub struct Intermediate;

impl Resolver for Intermediate {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Intermediate
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building INTERMEDIATE definitions", unit.qualified_name());
        let left = unit.require(Environment::Left)?.clone();
        let acid = left.is_acid();
        let transfer = &config.transfer;
        let downgrade = config.migrate_acid.downgrade;
        let left_legacy = config.clusters.left.legacy_hive;
        let right_legacy = config.clusters.right.legacy_hive;

        let right = unit.table_mut(Environment::Right);
        if right.exists {
            let right_acid = right.is_acid();
            if !right_acid && config.clusters.right.create_if_not_exists && config.sync {
                right.add_issue(CINE_WITH_EXIST);
                right.create_strategy = CreateStrategy::Create;
            } else if right_acid && config.sync {
                right.add_issue(SCHEMA_EXISTS_SYNC_ACID);
                right.create_strategy = CreateStrategy::Replace;
            } else {
                right.add_issue(SCHEMA_EXISTS_NO_ACTION_DATA);
                right.create_strategy = CreateStrategy::Nothing;
                return Ok(false);
            }
        } else {
            right.create_strategy = CreateStrategy::Create;
        }

        let mut right_spec = CopySpec::new(Environment::Left, Environment::Right);
        if !acid && left.is_managed() {
            right_spec.set_upgrade(true).set_replace_location(true);
        } else if acid && downgrade {
            if transfer.common_storage.is_some() || config.is_distcp() {
                right_spec.set_replace_location(true);
            } else {
                right_spec.set_strip_location(true);
            }
            right_spec
                .set_make_external(true)
                .set_make_non_transactional(true)
                .set_take_ownership(!config.no_purge);
        } else if acid {
            right_spec.set_strip_location(true);
        } else {
            right_spec.set_replace_location(true);
        }
        if !build_table_schema(config, ctx, unit, &right_spec)? {
            return Ok(false);
        }

        let mut transfer_spec = CopySpec::new(Environment::Left, Environment::Transfer);
        if left_legacy != right_legacy && !left_legacy {
            unit.add_issue(Environment::Left, NON_LEGACY_TO_LEGACY);
            return Ok(false);
        }
        if transfer.common_storage.is_none() {
            if left_legacy {
                transfer_spec.set_make_non_transactional(true);
            } else {
                transfer_spec.set_make_external(true).set_take_ownership(true);
            }
        } else {
            transfer_spec.set_make_non_transactional(true).set_make_external(true);
            if !left_legacy {
                // The RIGHT table reads a downgraded table's data in place.
                transfer_spec.set_take_ownership(!downgrade);
            }
        }
        transfer_spec
            .set_table_name_prefix(transfer.transfer_prefix.clone())
            .set_replace_location(true);
        if !build_table_schema(config, ctx, unit, &transfer_spec)? {
            return Ok(false);
        }

        let needs_shadow = (transfer.intermediate_storage.is_some() && !acid)
            || (acid && config.migrate_acid.on);
        let readable_in_place = downgrade && transfer.common_storage.is_some();
        if needs_shadow && !readable_in_place && !config.is_distcp() {
            let mut shadow_spec = CopySpec::new(Environment::Left, Environment::Shadow);
            shadow_spec
                .set_upgrade(true)
                .set_make_external(true)
                .set_take_ownership(false)
                .set_replace_location(true)
                .set_table_name_prefix(transfer.shadow_prefix.clone());
            return build_table_schema(config, ctx, unit, &shadow_spec);
        }
        Ok(true)
    }

    fn build_sql(&self, config: &Config, _ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        debug!("{}: building INTERMEDIATE statements", unit.qualified_name());
        let left = unit.require(Environment::Left)?.clone();
        let transfer = unit.require(Environment::Transfer)?.clone();
        let shadow = unit.table(Environment::Shadow).cloned().unwrap_or_default();
        let database = unit.database.clone();
        let resolved = unit.resolved_database.clone();
        let left_cine = config.clusters.left.create_if_not_exists;
        let right_cine = config.clusters.right.create_if_not_exists;

        let source = unit.table_mut(Environment::Left);
        source.add_sql(stmt::USE_DESC, stmt::use_db(&database));
        source.add_sql(stmt::DROP_TRANSFER_DESC, stmt::drop_table(&transfer.name));
        source.add_sql(stmt::CREATE_TRANSFER_DESC, transfer.create_statement(left_cine));

        let right = unit.table_mut(Environment::Right);
        right.clear_plan();
        right.add_sql(stmt::USE_DESC, stmt::use_db(&resolved));
        if shadow.is_defined() {
            right.add_sql(stmt::DROP_SHADOW_DESC, stmt::drop_table(&shadow.name));
            right.add_sql(stmt::CREATE_SHADOW_DESC, shadow.create_statement(right_cine));
        }
        let created = right.create_strategy == CreateStrategy::Create;
        final_table_sql(config, right, left.owner.as_deref());
        if created
            && left.is_partitioned()
            && config.transfer.common_storage.is_some()
            && (!left.is_acid() || config.migrate_acid.downgrade)
        {
            let msck = stmt::msck_repair(&right.name);
            right.add_sql(stmt::REPAIR_DESC, msck);
        }

        let source = unit.table_mut(Environment::Left);
        if config.clusters.left.legacy_hive && !config.is_distcp() {
            source.add_sql(stmt::TEZ_EXECUTION_DESC, stmt::SET_TEZ_AS_EXECUTION_ENGINE);
        }
        source.add_cleanup_sql(
            stmt::POST_MIGRATION_CLEANUP_DESC,
            "-- To be run AFTER final RIGHT SQL statements.",
        );
        source.add_cleanup_sql(stmt::USE_DESC, stmt::use_db(&database));

        Ok(transfer_sql(config, unit))
    }
}

#[cfg(test)]
mod tests {
    use super::super::plan_table;
    use super::super::testing::*;
    use super::*;
    use crate::core::ddl::fixtures;

    fn acid_config() -> Config {
        let mut config = config(DataStrategy::Sql);
        config.migrate_acid.on = true;
        config
    }

    #[test]
    fn test_acid_through_transfer_and_shadow() {
        let config = acid_config();
        let mut unit = unit("acid_orders", fixtures::acid_bucketed(4), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());
        assert_eq!(unit.strategy, DataStrategy::Intermediate);

        let transfer = unit.table(Environment::Transfer).unwrap();
        assert_eq!(transfer.name, "hms_mirror_transfer_acid_orders");
        assert!(transfer.is_external());
        let export = "hdfs://LEFT/apps/hive/warehouse/export_sales/acid_orders";
        assert_eq!(transfer.location().as_deref(), Some(export));
        let shadow = unit.table(Environment::Shadow).unwrap();
        assert_eq!(shadow.location().as_deref(), Some(export));

        let left = sql_of(&unit, Environment::Left);
        assert_eq!(left[0], "USE sales");
        assert_eq!(left[1], "DROP TABLE IF EXISTS hms_mirror_transfer_acid_orders");
        assert!(left[2].starts_with("CREATE EXTERNAL TABLE `hms_mirror_transfer_acid_orders`("));
        assert_eq!(
            left.last().unwrap(),
            "FROM acid_orders INSERT OVERWRITE TABLE hms_mirror_transfer_acid_orders SELECT *"
        );

        let right = sql_of(&unit, Environment::Right);
        assert!(right[3].starts_with("CREATE TABLE `acid_orders`("));
        assert_eq!(
            right.last().unwrap(),
            "DROP TABLE IF EXISTS hms_mirror_shadow_acid_orders"
        );
        let cleanup = &unit.table(Environment::Left).unwrap().cleanup_sql;
        assert_eq!(cleanup[0].description, stmt::POST_MIGRATION_CLEANUP_DESC);
        assert_eq!(cleanup[2].sql, "DROP TABLE IF EXISTS hms_mirror_transfer_acid_orders");
    }

    #[test]
    fn test_intermediate_storage_locations() {
        let mut config = config(DataStrategy::Sql);
        config.transfer.intermediate_storage = Some("s3a://bridge".into());
        let mut unit = unit("orders", fixtures::external_partitioned(), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());

        let working = "s3a://bridge/hms_mirror_working/20261019_120000/sales/orders";
        assert_eq!(
            unit.table(Environment::Transfer).unwrap().location().as_deref(),
            Some(working)
        );
        assert_eq!(
            unit.table(Environment::Shadow).unwrap().location().as_deref(),
            Some(working)
        );
        assert_eq!(
            unit.table(Environment::Right).unwrap().location().as_deref(),
            Some("hdfs://RIGHT/warehouse/tablespace/external/hive/sales.db/orders")
        );
    }

    #[test]
    fn test_non_legacy_to_legacy_refused() {
        let mut config = acid_config();
        config.clusters.right.legacy_hive = true;
        let mut unit = unit("acid_orders", fixtures::acid_bucketed(4), None);
        assert!(!plan_table(&config, &ctx(), &mut unit).unwrap());
        assert!(issues_of(&unit, Environment::Left).contains(&NON_LEGACY_TO_LEGACY.to_string()));
    }

    #[test]
    fn test_existing_acid_replaced_under_sync() {
        let mut config = acid_config();
        config.sync = true;
        let mut unit = unit(
            "acid_orders",
            fixtures::acid_bucketed(4),
            Some(fixtures::acid_bucketed(4)),
        );
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());
        let right = sql_of(&unit, Environment::Right);
        assert!(right.contains(&"DROP TABLE IF EXISTS acid_orders".to_string()));
    }

    #[test]
    fn test_legacy_left_forces_tez() {
        let mut config = config(DataStrategy::Sql);
        config.clusters.left.legacy_hive = true;
        config.transfer.intermediate_storage = Some("s3a://bridge".into());
        let mut unit = unit("customers", fixtures::legacy_managed(), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());
        assert!(sql_of(&unit, Environment::Left).contains(&stmt::SET_TEZ_AS_EXECUTION_ENGINE.to_string()));
    }
}
