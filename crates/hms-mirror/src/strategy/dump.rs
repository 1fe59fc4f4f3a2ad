use super::{PlanContext, Resolver};
use crate::config::Config;
use crate::core::ddl;
use crate::core::{DataStrategy, Environment, TableMirror};
use crate::error::Result;
use crate::sql as stmt;
use tracing::debug;

/// Replays the LEFT schema as a script; nothing is translated.
pub struct Dump;

impl Resolver for Dump {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Dump
    }

    fn build_definitions(
        &self,
        config: &Config,
        _ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building DUMP definition", unit.qualified_name());
        unit.require(Environment::Left)?;
        let legacy = config.clusters.left.legacy_hive;
        let left = unit.table_mut(Environment::Left);
        ddl::strip_database(&mut left.definition);
        if !legacy && left.is_acid() {
            ddl::strip_location(&mut left.definition);
        }
        Ok(true)
    }

    fn build_sql(&self, config: &Config, _ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        debug!("{}: building DUMP statements", unit.qualified_name());
        let database = unit.database.clone();
        let cluster = &config.clusters.left;
        let left = unit.table_mut(Environment::Left);
        left.sql.clear();

        left.add_sql(stmt::USE_DESC, stmt::use_db(&database));
        let create = left.create_statement(cluster.create_if_not_exists);
        left.add_sql(stmt::CREATE_DESC, create);
        if !cluster.legacy_hive && config.transfer_ownership {
            if let Some(owner) = left.owner.clone() {
                let sql = stmt::set_owner(&left.name, &owner);
                left.add_sql(stmt::SET_OWNER_DESC, sql);
            }
        }

        if left.is_partitioned() && !left.is_acid() && cluster.partition_discovery.init_msck {
            let msck = stmt::msck_repair(&left.name);
            if config.is_distcp() {
                left.add_cleanup_sql(stmt::REPAIR_DESC, msck);
            } else {
                left.add_sql(stmt::REPAIR_DESC, msck);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::plan_table;
    use super::super::testing::*;
    use super::*;
    use crate::core::ddl::fixtures;

    #[test]
    fn test_dump_replays_left() {
        let mut config = config(DataStrategy::Dump);
        config.transfer_ownership = true;
        let mut orders = unit("orders", fixtures::external_partitioned(), None);
        orders.table_mut(Environment::Left).owner = Some("etl".into());
        assert!(plan_table(&config, &ctx(), &mut orders).unwrap());

        let sql = sql_of(&orders, Environment::Left);
        assert_eq!(sql[0], "USE sales");
        assert!(sql[1].starts_with("CREATE EXTERNAL TABLE `orders`("));
        assert!(sql[1].contains("hdfs://LEFT/warehouse/tablespace/external/hive/sales.db/orders"));
        assert_eq!(sql[2], "ALTER TABLE orders SET OWNER USER etl");
        assert_eq!(sql[3], "MSCK REPAIR TABLE orders");
        assert!(sql_of(&orders, Environment::Right).is_empty());
    }

    #[test]
    fn test_dump_acid_without_location() {
        let mut config = config(DataStrategy::Dump);
        config.migrate_acid.on = true;
        let mut acid = unit("acid_orders", fixtures::acid_bucketed(4), None);
        assert!(plan_table(&config, &ctx(), &mut acid).unwrap());
        let sql = sql_of(&acid, Environment::Left);
        assert!(sql[1].starts_with("CREATE TABLE `acid_orders`("));
        assert!(!sql[1].contains("LOCATION"));
        assert_eq!(sql.len(), 2);
    }

    #[test]
    fn test_dump_views_as_is() {
        let config = config(DataStrategy::Dump);
        let mut view = unit("big_orders", fixtures::view(), None);
        assert!(plan_table(&config, &ctx(), &mut view).unwrap());
        let sql = sql_of(&view, Environment::Left);
        assert!(sql[1].starts_with("CREATE VIEW `big_orders`"));
    }
}
