use super::export_import::export_import_sql;
use super::{PlanContext, Resolver};
use crate::config::Config;
use crate::core::ddl::props;
use crate::core::{CopySpec, DataStrategy, Environment, TableDefinition, TableMirror};
use crate::error::Result;
use crate::schema::build_table_schema;
use crate::sql::{self as stmt, TransferKind};
use tracing::debug;

/// Downgrades an ACID table to an external table on the LEFT cluster.
///
/// The original is renamed to `<name>_archive` and a non-transactional
/// external table takes its name. The data is reloaded with SQL or with
/// EXPORT/IMPORT depending on the configured strategy; the archive is dropped
/// by the cleanup script.
pub struct AcidDowngradeInPlace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    Sql,
    ExportImport,
}

fn reload(config: &Config, left: &TableDefinition) -> Reload {
    match config.data_strategy {
        DataStrategy::ExportImport => Reload::ExportImport,
        DataStrategy::Hybrid => {
            let limit = config.hybrid.export_import_partition_limit;
            let too_many = left.is_partitioned() && limit > 0 && left.partitions.len() >= limit;
            if config.clusters.left.legacy_hive || too_many {
                Reload::Sql
            } else {
                Reload::ExportImport
            }
        }
        _ => Reload::Sql,
    }
}

impl Resolver for AcidDowngradeInPlace {
    fn strategy(&self) -> DataStrategy {
        DataStrategy::AcidDowngradeInPlace
    }

    fn build_definitions(
        &self,
        config: &Config,
        ctx: &PlanContext,
        unit: &mut TableMirror,
    ) -> Result<bool> {
        debug!("{}: building ACID downgrade definition", unit.qualified_name());
        let left = unit.require(Environment::Left)?.clone();
        if !left.is_acid() {
            unit.add_issue(
                Environment::Left,
                "Table is not ACID.  An in-place downgrade only applies to ACID tables.",
            );
            return Ok(false);
        }
        if reload(config, &left) == Reload::ExportImport {
            return Ok(true);
        }

        let mut spec = CopySpec::new(Environment::Left, Environment::Right);
        spec.set_take_ownership(!config.no_purge)
            .set_make_external(true)
            .set_make_non_transactional(true)
            .set_strip_location(true);
        build_table_schema(config, ctx, unit, &spec)
    }

    fn build_sql(&self, config: &Config, ctx: &PlanContext, unit: &mut TableMirror) -> Result<bool> {
        let left = unit.require(Environment::Left)?.clone();
        let archive = format!("{}{}", left.name, stmt::ARCHIVE_SUFFIX);

        if reload(config, &left) == Reload::ExportImport {
            debug!("{}: downgrading in place with EXPORT_IMPORT", unit.qualified_name());
            if !export_import_sql(config, ctx, unit, true)? {
                return Ok(false);
            }
            unit.table_mut(Environment::Left)
                .add_cleanup_sql(stmt::DROP_DESC, stmt::drop_table(&archive));
            return Ok(true);
        }

        debug!("{}: downgrading in place with SQL", unit.qualified_name());
        let replacement = unit.require(Environment::Right)?.clone();
        let database = unit.database.clone();
        let source = unit.table_mut(Environment::Left);
        source.clear_plan();
        source.add_sql(stmt::USE_DESC, stmt::use_db(&database));
        if left.has_property(props::TRANSLATED_TO_EXTERNAL) {
            source.add_sql(
                stmt::REMOVE_TABLE_PROP_DESC,
                stmt::unset_table_property(&left.name, props::TRANSLATED_TO_EXTERNAL),
            );
        }
        source.add_sql(stmt::RENAME_DESC, stmt::rename_table(&left.name, &archive));
        source.add_sql(
            stmt::CREATE_DESC,
            replacement.create_statement(config.clusters.left.create_if_not_exists),
        );
        source.add_cleanup_sql(stmt::DROP_DESC, stmt::drop_table(&archive));

        let limit = config.migrate_acid.partition_limit;
        if left.is_partitioned() && limit > 0 && left.partitions.len() > limit {
            source.add_issue(format!(
                "The number of partitions: {} exceeds the ACID SQL partition limit \
                 (migrateACID->partitionLimit) of {}.  The queries will NOT be automatically run.",
                left.partitions.len(),
                limit
            ));
            return Ok(false);
        }

        source.sql.extend(stmt::session_overrides(config, Environment::Left));
        source.sql.extend(stmt::data_transfer(
            config,
            Environment::Left,
            &left,
            &archive,
            &replacement.name,
            TransferKind::NewNamespace,
        ));
        Ok(true)
    }
}
