//! Configuration validation.
//!
//! Structural problems are `MirrorError::Config`; combinations that can't be
//! planned are coded `MirrorError::ConfigIncompatible` and block the run.

use super::Config;
use crate::core::DataStrategy;
use crate::error::{MirrorError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.transfer.concurrency == 0 {
        return Err(MirrorError::Config(
            "transfer.concurrency must be at least 1".into(),
        ));
    }
    if config.db_rename.is_some() && config.databases.len() > 1 {
        return Err(MirrorError::Config(
            "db_rename is only valid with a single database".into(),
        ));
    }
    if config.data_strategy == DataStrategy::Intermediate {
        return Err(MirrorError::Config(
            "data_strategy INTERMEDIATE can't be selected directly".into(),
        ));
    }

    // Compile the filters so a bad pattern fails here, not mid-run.
    super::TableFilter::new(&config.filter)?;

    if config.sync && config.filter.is_table_filtering() {
        return Err(MirrorError::incompatible(
            "SYNC_TBL_FILTER",
            "'sync' can't be combined with a table filter; dropped tables would be misreported",
        ));
    }

    if config.migrate_acid.on
        && matches!(
            config.data_strategy,
            DataStrategy::Linked | DataStrategy::Common
        )
    {
        return Err(MirrorError::incompatible(
            "ACID_UNSUPPORTED_STRATEGY",
            format!(
                "ACID migration is not supported by the {} strategy",
                config.data_strategy
            ),
        ));
    }

    if config.migrate_acid.in_place && !config.migrate_acid.downgrade {
        return Err(MirrorError::incompatible(
            "IN_PLACE_REQUIRES_DOWNGRADE",
            "migrate_acid.in_place requires migrate_acid.downgrade",
        ));
    }

    if config.transfer.intermediate_storage.is_some() && config.transfer.common_storage.is_some() {
        return Err(MirrorError::incompatible(
            "INTERMEDIATE_AND_COMMON",
            "transfer.intermediate_storage and transfer.common_storage are mutually exclusive",
        ));
    }

    if config.data_strategy == DataStrategy::StorageMigration {
        if config.transfer.common_storage.is_none() {
            return Err(MirrorError::incompatible(
                "STORAGE_MIGRATION_REQUIRED_NAMESPACE",
                "STORAGE_MIGRATION requires transfer.common_storage as the target namespace",
            ));
        }
        if !config.transfer.warehouse.is_complete() {
            return Err(MirrorError::incompatible(
                "STORAGE_MIGRATION_REQUIRED_WAREHOUSE",
                "STORAGE_MIGRATION requires both transfer.warehouse.external_directory and managed_directory",
            ));
        }
    }

    if config.data_strategy != DataStrategy::Dump && config.clusters.left.hcfs_namespace.is_none() {
        return Err(MirrorError::incompatible(
            "MISSING_NAMESPACE",
            "clusters.left.hcfs_namespace is required",
        ));
    }
    let translates_to_right = matches!(
        config.data_strategy,
        DataStrategy::SchemaOnly | DataStrategy::Sql | DataStrategy::ExportImport | DataStrategy::Hybrid
    );
    if translates_to_right
        && config.transfer.common_storage.is_none()
        && config.clusters.right.hcfs_namespace.is_none()
    {
        return Err(MirrorError::incompatible(
            "MISSING_NAMESPACE",
            format!(
                "clusters.right.hcfs_namespace is required for {}",
                config.data_strategy
            ),
        ));
    }

    crate::translator::validate(config)?;

    Ok(())
}
