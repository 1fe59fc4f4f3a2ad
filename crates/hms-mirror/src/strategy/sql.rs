use super::{add_set_owner, within_sql_partition_limit, PlanContext, Resolver};
use super::{SCHEMA_EXISTS_NO_ACTION_DATA, SCHEMA_WILL_BE_CREATED, SQL_SYNC_WO_CINE, SQL_SYNC_W_CINE};
use crate::config::Config;
use crate::core::{CopySpec, CreateStrategy, DataStrategy, Environment, TableDefinition, TableMirror};
use crate::error::Result;
use crate::schema::build_table_schema;
use crate::sql::{self as stmt, TransferKind};
use tracing::debug;

/// Data moves with INSERT statements: the RIGHT cluster reads the LEFT data
/// through a SHADOW table and overwrites the final table from it.
pub struct Sql;

impl Resolver for Sql {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Sql
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building SQL definition", unit.qualified_name());
        let left = unit.require(Environment::Left)?.clone();

        let right = unit.table_mut(Environment::Right);
        if right.exists {
            if config.sync && config.clusters.right.create_if_not_exists {
                right.add_issue(SQL_SYNC_W_CINE);
                right.create_strategy = CreateStrategy::Create;
            } else if config.sync {
                right.add_issue(SQL_SYNC_WO_CINE);
                return Ok(false);
            } else {
                right.add_issue(SCHEMA_EXISTS_NO_ACTION_DATA);
                return Ok(false);
            }
        } else {
            right.add_issue(SCHEMA_WILL_BE_CREATED);
            right.create_strategy = CreateStrategy::Create;
        }

        if config.transfer.common_storage.is_none() {
            let mut shadow = CopySpec::new(Environment::Left, Environment::Shadow);
            if config.convert_managed() {
                shadow.set_upgrade(true);
            }
            shadow
                .set_take_ownership(false)
                .set_table_name_prefix(config.transfer.shadow_prefix.clone());
            build_table_schema(config, ctx, unit, &shadow)?;
        }

        let spec = target_spec(config, &left);
        build_table_schema(config, ctx, unit, &spec)
    }

    fn build_sql(&self, config: &Config, _ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        debug!("{}: building SQL statements", unit.qualified_name());
        let database = unit.resolved_database.clone();
        let owner = unit.require(Environment::Left)?.owner.clone();
        let shadow = unit.table(Environment::Shadow).cloned().unwrap_or_default();
        let cine = config.clusters.right.create_if_not_exists;

        let right = unit.table_mut(Environment::Right);
        right.clear_plan();
        right.add_sql(stmt::USE_DESC, stmt::use_db(&database));
        if shadow.is_defined() {
            right.add_sql(stmt::DROP_SHADOW_DESC, stmt::drop_table(&shadow.name));
            right.add_sql(stmt::CREATE_SHADOW_DESC, shadow.create_statement(cine));
        }
        final_table_sql(config, right, owner.as_deref());

        Ok(transfer_sql(config, unit))
    }

    fn checks_avro(&self, _unit: &TableMirror) -> bool {
        true
    }
}

/// RIGHT table spec for the SQL-based strategies.
pub(super) fn target_spec(config: &Config, left: &TableDefinition) -> CopySpec {
    let mut spec = CopySpec::new(Environment::Left, Environment::Right);
    spec.set_replace_location(true);
    if left.is_managed() && config.convert_managed() {
        spec.set_upgrade(true);
    } else {
        spec.set_make_external(true);
    }
    if config.read_only {
        spec.set_take_ownership(false);
    } else if left.is_managed() {
        spec.set_take_ownership(true);
    }
    if config.no_purge {
        spec.set_take_ownership(false);
    }
    spec
}

/// Disposition statements for the final RIGHT table.
pub(super) fn final_table_sql(config: &Config, right: &mut TableDefinition, owner: Option<&str>) {
    let cine = config.clusters.right.create_if_not_exists;
    match right.create_strategy {
        CreateStrategy::Nothing | CreateStrategy::Leave => {}
        CreateStrategy::Drop => {
            let drop = stmt::drop_table(&right.name);
            right.add_sql(stmt::DROP_DESC, drop);
        }
        CreateStrategy::Replace => {
            let drop = stmt::drop_table(&right.name);
            right.add_sql(stmt::DROP_DESC, drop);
            let create = right.create_statement(cine);
            right.add_sql(stmt::CREATE_DESC, create);
        }
        CreateStrategy::Create => {
            let create = right.create_statement(cine);
            right.add_sql(stmt::CREATE_DESC, create);
            add_set_owner(config, right, owner);
        }
    }
}

/// Statements that move the data once the tables exist: LEFT into TRANSFER,
/// then SHADOW into the final RIGHT table. With distcp only markers are left
/// where the copy has to happen.
pub(super) fn transfer_sql(config: &Config, unit: &mut TableMirror) -> bool {
    if !within_sql_partition_limit(config, unit) {
        return false;
    }
    let left = unit.table(Environment::Left).cloned().unwrap_or_default();
    let transfer = unit.table(Environment::Transfer).cloned().unwrap_or_default();
    let shadow = unit.table(Environment::Shadow).cloned().unwrap_or_default();
    let distcp = config.is_distcp();

    if distcp {
        unit.table_mut(Environment::Left)
            .add_sql(stmt::DISTCP_DESC, "-- Run distcp commands");
    } else if transfer.is_defined() {
        let source = unit.table_mut(Environment::Left);
        source.sql.extend(stmt::session_overrides(config, Environment::Left));
        source.sql.extend(stmt::data_transfer(
            config,
            Environment::Left,
            &left,
            &left.name,
            &transfer.name,
            TransferKind::Stage,
        ));
        source.add_cleanup_sql(stmt::DROP_TRANSFER_DESC, stmt::drop_table(&transfer.name));
    }

    let right = unit.table_mut(Environment::Right);
    if distcp {
        right.add_sql(stmt::DISTCP_DESC, "-- Run the Distcp output to migrate data.");
        if left.is_partitioned() {
            let msck = stmt::msck_repair(&right.name);
            right.add_cleanup_sql(stmt::REPAIR_DESC, msck);
        }
    } else if shadow.is_defined() && (left.is_acid() || config.transfer.common_storage.is_none()) {
        if left.is_partitioned() {
            right.add_sql(stmt::REPAIR_DESC, stmt::msck_repair(&shadow.name));
        }
        right.sql.extend(stmt::session_overrides(config, Environment::Right));
        let target = right.name.clone();
        right.sql.extend(stmt::data_transfer(
            config,
            Environment::Right,
            &left,
            &shadow.name,
            &target,
            TransferKind::FromShadow,
        ));
        right.add_sql(stmt::DROP_SHADOW_DESC, stmt::drop_table(&shadow.name));
    }
    true
}
