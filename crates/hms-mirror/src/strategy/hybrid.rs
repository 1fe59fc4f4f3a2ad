use super::{PlanContext, Resolver, ACID_NOT_ON};
use crate::config::Config;
use crate::core::{CreateStrategy, DataStrategy, Environment, TableMirror};
use crate::error::Result;

/// HYBRID picks EXPORT_IMPORT or SQL per table; see [`route`].
///
/// Only tables that can't be routed are planned by the resolver itself, and
/// it just records why.
pub struct Hybrid;

/// Strategy a HYBRID run uses for `unit`.
///
/// ACID tables crossing from a legacy cluster need the staged SQL path.
/// Partitioned tables above the EXPORT_IMPORT partition limit use SQL.
/// Everything else is exported and imported.
pub(super) fn route(config: &Config, unit: &mut TableMirror) -> DataStrategy {
    let Some((acid, partitioned, count)) = unit
        .table(Environment::Left)
        .map(|t| (t.is_acid(), t.is_partitioned(), t.partitions.len()))
    else {
        return DataStrategy::ExportImport;
    };
    let bridged =
        config.transfer.intermediate_storage.is_some() || config.transfer.common_storage.is_some();

    if acid && config.convert_managed() {
        return if config.migrate_acid.on {
            DataStrategy::Intermediate
        } else {
            DataStrategy::Hybrid
        };
    }

    let limit = config.hybrid.export_import_partition_limit;
    if partitioned && limit > 0 && count > limit {
        unit.add_issue(
            Environment::Left,
            format!(
                "The number of partitions: {} exceeds the EXPORT_IMPORT partition limit \
                 (hybrid->exportImportPartitionLimit) of {}.  Hence, the SQL method has been selected for the \
                 migration.",
                count, limit
            ),
        );
        return if bridged || acid {
            DataStrategy::Intermediate
        } else {
            DataStrategy::Sql
        };
    }
    DataStrategy::ExportImport
}

impl Resolver for Hybrid {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::Hybrid
    }

    fn build_definitions(
        &self,
        _config: &Config,
        _ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        unit.add_issue(Environment::Left, ACID_NOT_ON);
        unit.table_mut(Environment::Right).create_strategy = CreateStrategy::Nothing;
        Ok(false)
    }

    fn build_sql(&self, _config: &Config, _ctx: &PlanContext, _unit: &mut TableMirror) -> Result<bool> {
        Ok(false)
    }
}
