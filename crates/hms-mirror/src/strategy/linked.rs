use super::{sync_disposition, target_sql, PlanContext, Resolver};
use super::{SCHEMA_EXISTS_LEAVE, SCHEMA_EXISTS_NO_ACTION, SCHEMA_WILL_BE_CREATED};
use crate::config::Config;
use crate::core::{CopySpec, CreateStrategy, DataStrategy, Environment, TableMirror};
use crate::error::Result;
use crate::schema::build_table_schema;
use tracing::debug;

/// RIGHT tables read the LEFT cluster's storage in place.
pub struct Linked;

/// How a shared-storage strategy treats the RIGHT table.
pub(super) struct SharedStorage<'a> {
    pub take_ownership: bool,
    /// Issue recorded when the RIGHT table exists and matches (sync) or exists at all.
    pub matched_issue: &'a str,
    pub exists_issue: &'a str,
    /// Issue recorded on LEFT for tables that can't share storage.
    pub refusal: &'a str,
}

/// Definitions for LINKED and COMMON: native, non-transactional tables keep their location.
pub(super) fn shared_storage_definitions(
    config: &Config,
    ctx: &PlanContext,
    unit: &mut TableMirror,
    rules: SharedStorage<'_>,
) -> Result<bool> {
    let left = unit.table(Environment::Left).cloned().unwrap_or_default();
    if !left.is_native() || left.is_acid() {
        unit.add_issue(Environment::Left, rules.refusal);
        unit.table_mut(Environment::Right).create_strategy = CreateStrategy::Nothing;
        return Ok(false);
    }

    let mut spec = CopySpec::new(Environment::Left, Environment::Right);
    spec.set_replace_location(false);
    if config.convert_managed() {
        spec.set_upgrade(true);
    }
    spec.set_take_ownership(rules.take_ownership);

    if config.sync {
        if !sync_disposition(config, unit, rules.matched_issue) {
            return Ok(false);
        }
        spec.set_take_ownership(false);
        if unit.table_mut(Environment::Right).create_strategy == CreateStrategy::Drop {
            return Ok(true);
        }
    } else {
        let right = unit.table_mut(Environment::Right);
        if right.exists {
            right.add_issue(rules.exists_issue);
            right.create_strategy = CreateStrategy::Leave;
            return Ok(false);
        }
        right.add_issue(SCHEMA_WILL_BE_CREATED);
        right.create_strategy = CreateStrategy::Create;
    }

    build_table_schema(config, ctx, unit, &spec)
}

impl Resolver for Linked {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Linked
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building LINKED definition", unit.qualified_name());
        shared_storage_definitions(
            config,
            ctx,
            unit,
            SharedStorage {
                take_ownership: false,
                matched_issue: SCHEMA_EXISTS_NO_ACTION,
                exists_issue: SCHEMA_EXISTS_LEAVE,
                refusal: "Can't LINK ACID tables",
            },
        )
    }

    fn build_sql(&self, config: &Config, _ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        target_sql(config, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::super::plan_table;
    use super::super::testing::*;
    use super::*;
    use crate::core::ddl::fixtures;

    #[test]
    fn test_linked_keeps_left_location_without_purge() {
        let config = config(DataStrategy::Linked);
        let mut unit = unit("orders", fixtures::external_partitioned(), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());
        let right = unit.table(Environment::Right).unwrap();
        assert_eq!(
            right.location().as_deref(),
            Some("hdfs://LEFT/warehouse/tablespace/external/hive/sales.db/orders")
        );
        assert!(!right.is_external_purge());
        assert!(sql_of(&unit, Environment::Right)[1].starts_with("CREATE EXTERNAL TABLE"));
    }

    #[test]
    fn test_linked_refuses_acid() {
        let mut config = config(DataStrategy::Linked);
        config.migrate_acid.on = true;
        let mut unit = unit("acid_orders", fixtures::acid_bucketed(2), None);
        assert!(!plan_table(&config, &ctx(), &mut unit).unwrap());
        assert_eq!(issues_of(&unit, Environment::Left), vec!["Can't LINK ACID tables".to_string()]);
        assert_eq!(
            unit.table(Environment::Right).unwrap().create_strategy,
            CreateStrategy::Nothing
        );
    }

    #[test]
    fn test_linked_legacy_managed_not_owned() {
        let mut config = config(DataStrategy::Linked);
        config.clusters.left.legacy_hive = true;
        let mut unit = unit("customers", fixtures::legacy_managed(), None);
        assert!(plan_table(&config, &ctx(), &mut unit).unwrap());
        let right = unit.table(Environment::Right).unwrap();
        assert!(right.is_external());
        assert!(!right.is_external_purge());
        assert!(right
            .issues
            .iter()
            .any(|i| i.contains("PURGE flag NOT set")));
    }
}
