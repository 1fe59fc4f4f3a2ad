use super::{sync_disposition, target_sql, PlanContext, Resolver};
use super::{ACID_NOT_ON, CINE_WITH_EXIST, SCHEMA_EXISTS_LEAVE, SCHEMA_EXISTS_NO_ACTION, SCHEMA_WILL_BE_CREATED};
use crate::config::Config;
use crate::core::{CopySpec, CreateStrategy, DataStrategy, Environment, TableMirror};
use crate::error::Result;
use crate::schema::build_table_schema;
use tracing::debug;

/// Metadata only: the RIGHT table points at translated locations, no data is moved.
pub struct SchemaOnly;

impl Resolver for SchemaOnly {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::SchemaOnly
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building SCHEMA_ONLY definition", unit.qualified_name());
        let left = unit.table(Environment::Left).cloned().unwrap_or_default();

        let mut spec = CopySpec::new(Environment::Left, Environment::Right);
        spec.set_replace_location(true);
        if config.convert_managed() {
            spec.set_upgrade(true);
        }
        if !config.read_only || !config.sync {
            spec.set_take_ownership(!left.is_external());
        } else if spec.upgrade() {
            unit.add_issue(
                Environment::Right,
                "Ownership (PURGE Option) not set because of either: `sync` or `ro|read-only` was specified in the config.",
            );
        }
        if config.read_only || config.no_purge {
            spec.set_take_ownership(false);
        }

        if config.sync {
            if !sync_disposition(config, unit, SCHEMA_EXISTS_NO_ACTION) {
                return Ok(false);
            }
            spec.set_take_ownership(false);
            if unit.table_mut(Environment::Right).create_strategy == CreateStrategy::Drop {
                return Ok(true);
            }
        } else {
            let right = unit.table_mut(Environment::Right);
            if right.exists {
                if right.is_view() {
                    right.add_issue("View exists already.  Will REPLACE.");
                    right.create_strategy = CreateStrategy::Replace;
                } else if config.clusters.right.create_if_not_exists {
                    right.add_issue(CINE_WITH_EXIST);
                    right.create_strategy = CreateStrategy::Create;
                } else {
                    right.add_issue(SCHEMA_EXISTS_LEAVE);
                    right.create_strategy = CreateStrategy::Leave;
                    return Ok(false);
                }
            } else {
                right.add_issue(SCHEMA_WILL_BE_CREATED);
                right.create_strategy = CreateStrategy::Create;
            }
        }

        let acid = left.is_acid();
        if acid {
            spec.set_strip_location(true);
        }
        if acid && !config.migrate_acid.on {
            unit.add_issue(Environment::Left, ACID_NOT_ON);
            unit.table_mut(Environment::Right).create_strategy = CreateStrategy::Nothing;
            return Ok(false);
        }

        let built = build_table_schema(config, ctx, unit, &spec)?;
        if built && acid && !config.clusters.left.legacy_hive {
            crate::core::ddl::strip_location(&mut unit.table_mut(Environment::Left).definition);
        }
        Ok(built)
    }

    fn build_sql(&self, config: &Config, _ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        debug!("{}: building SCHEMA_ONLY SQL", unit.qualified_name());
        target_sql(config, unit)
    }

    fn checks_avro(&self, _unit: &TableMirror) -> bool {
        true
    }
}
