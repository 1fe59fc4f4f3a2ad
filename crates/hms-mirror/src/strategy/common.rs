use super::linked::{shared_storage_definitions, SharedStorage};
use super::{target_sql, PlanContext, Resolver, SCHEMA_EXISTS_NO_ACTION_DATA};
use crate::config::Config;
use crate::core::{DataStrategy, TableMirror};
use crate::error::Result;
use tracing::debug;

/// Both clusters already see the same storage; the RIGHT table owns it unless read-only.
pub struct Common;

impl Resolver for Common {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Common
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building COMMON definition", unit.qualified_name());
        shared_storage_definitions(
            config,
            ctx,
            unit,
            SharedStorage {
                take_ownership: !config.read_only && !config.no_purge,
                matched_issue: SCHEMA_EXISTS_NO_ACTION_DATA,
                exists_issue: SCHEMA_EXISTS_NO_ACTION_DATA,
                refusal: "Can't use COMMON for ACID tables",
            },
        )
    }

    fn build_sql(&self, config: &Config, _ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        target_sql(config, unit)
    }
}
