//! Target definition builder.
//!
//! [`build_table_schema`] rewrites the source projection of a unit into the
//! target projection named by a [`CopySpec`].

pub mod features;

use crate::config::Config;
use crate::core::ddl::{self, props};
use crate::core::{CopySpec, DataStrategy, Environment, TableDefinition, TableMirror};
use crate::error::{MirrorError, Result};
use crate::strategy::PlanContext;
use crate::translator::{self, last_segment};
use tracing::debug;

pub const VIEW_ISSUE: &str = "This is a VIEW.  It will be translated AS-IS.  View transitions will NOT honor \
     target db name changes For example: `db_prefix`.  VIEW creation depends on the referenced tables existing \
     FIRST. VIEW creation failures may mean that all referenced tables don't exist yet.";
pub const NON_NATIVE_ISSUE: &str = "This is not a NATIVE Hive table.  It will be translated 'AS-IS'.  If the \
     libraries or dependencies required for this table definition are not available on the target cluster, the \
     'create' statement may fail.";
pub const TABLE_LOCATION_REMAPPED: &str = "The tables location matched one of the 'global location map' \
     directories. The LOCATION element was adjusted and will be explicitly set during table creation.";
pub const TABLE_LOCATION_FORCED: &str = "You've request the table location be explicitly set.";
pub const RESET_TO_DEFAULT_LOCATION_WARNING: &str = "'reset-to-default-location' was specified.  Table \
     definition stripped of LOCATION.  Location will be determined by the database or system warehouse settings.";

pub(crate) fn location_not_match_warehouse(kind: &str, database_location: &str, target: &str) -> String {
    format!(
        "You have specified warehouse directories in the config but after all the translations, the `{}` \
         location is still NOT aligned in the DBs warehouse. `{}`->`{}`. Consider adding a global location \
         map entry to align them",
        kind, database_location, target
    )
}

/// Rebuild `spec.target()` from `spec.source()`.
///
/// Returns `Ok(false)` without touching anything when the source doesn't
/// exist. Views and connector tables are copied as-is.
pub fn build_table_schema(
    config: &Config,
    ctx: &PlanContext,
    unit: &mut TableMirror,
    spec: &CopySpec,
) -> Result<bool> {
    let source = match unit.table(spec.source()) {
        Some(source) if source.exists => source.clone(),
        _ => return Ok(false),
    };
    let target_env = spec.target();
    let mut definition = source.definition.clone();
    let mut issues: Vec<String> = Vec::new();
    let mut target_name = source.name.clone();

    if source.is_native() {
        ddl::strip_database(&mut definition);

        if let Some(location) = spec.location() {
            require_location(unit, &mut definition, location)?;
        }

        if config.reset_to_default_location {
            if let Some(location) = ddl::get_location(&definition) {
                if last_segment(&location) != unit.name {
                    issues.push(
                        "Tablename does NOT match last directory name. Using `rdl` will change the implied path \
                         from the original.  This may affect other applications that aren't relying on the \
                         metastore."
                            .to_string(),
                    );
                    if config.is_distcp() {
                        return Err(MirrorError::translation(
                            location,
                            "Tablename does NOT match last directory name.  Using distcp will copy the data but \
                             the table will not align with the directory.",
                        ));
                    }
                }
            }
        }

        let source_acid = source.is_acid();
        let mut add_properties = Vec::new();
        let converted = if !source_acid {
            shape_non_acid(config, spec, &source, &mut definition, &mut issues, &mut add_properties)
        } else {
            shape_acid(config, spec, &source, &mut definition, &mut issues, &mut add_properties)
        };

        if target_env == Environment::Right {
            add_properties.push((props::METADATA_STAGE1, ctx.stage_timestamp.clone()));
        }

        if let Some(prefix) = spec.table_name_prefix().filter(|_| spec.rename_table()) {
            target_name = format!("{}{}", prefix, unit.name);
            ddl::change_table_name(&mut definition, &target_name);
        }

        for key in props::HOUSEKEEPING {
            ddl::remove_property(&mut definition, key);
        }

        if config.cluster(target_env).partition_discovery.auto
            && ddl::is_partitioned(&definition)
            && (converted || ddl::is_external(&definition))
        {
            add_properties.push((props::DISCOVER_PARTITIONS, "true".to_string()));
        }

        for (key, value) in add_properties {
            ddl::upsert_property(&mut definition, key, &value);
        }

        match target_env {
            Environment::Left | Environment::Right => {
                if spec.replace_location() && (!source_acid || config.migrate_acid.downgrade) {
                    let original = source.location().ok_or_else(|| {
                        MirrorError::Invariant(format!(
                            "{} has no LOCATION to translate",
                            unit.qualified_name()
                        ))
                    })?;
                    let level = if config.filter.is_table_filtering() { 0 } else { 1 };
                    let translated =
                        translator::translate_table_location(config, unit, &original, level)?;
                    require_location(unit, &mut definition, &translated.location)?;

                    if config.transfer.warehouse.is_complete() {
                        let expected = if ddl::is_external(&definition) {
                            ctx.target_location.as_deref()
                        } else {
                            ctx.target_managed_location.as_deref()
                        };
                        if let Some(expected) = expected {
                            if !translated.location.starts_with(expected) {
                                unit.add_issue(
                                    Environment::Right,
                                    location_not_match_warehouse("table", expected, &translated.location),
                                );
                            }
                        }
                    }
                }
                if unit.remapped {
                    issues.push(TABLE_LOCATION_REMAPPED.to_string());
                } else if config.translator.force_external_location {
                    issues.push(TABLE_LOCATION_FORCED.to_string());
                } else if config.reset_to_default_location {
                    ddl::strip_location(&mut definition);
                    issues.push(RESET_TO_DEFAULT_LOCATION_WARNING.to_string());
                }
            }
            Environment::Shadow | Environment::Transfer => {
                if spec.location().is_none() && spec.replace_location() {
                    bridge_location(config, ctx, unit, spec, &source, &mut definition)?;
                }
            }
        }

        match target_env {
            Environment::Transfer => {
                ddl::upsert_property(&mut definition, props::TRANSFER_TABLE, "true")
            }
            Environment::Shadow => ddl::upsert_property(&mut definition, props::SHADOW_TABLE, "true"),
            _ => {}
        }

        if !config.skip_features {
            for feature in features::chain() {
                if feature.apply(&mut definition) {
                    debug!(
                        "{}: feature {} applied to {}",
                        unit.qualified_name(),
                        feature.name(),
                        target_env
                    );
                    issues.push(format!(
                        "Feature ({}) was found applicable and adjustments applied. {}",
                        feature.name(),
                        feature.description()
                    ));
                }
            }
        } else {
            debug!("{}: skipping features check", unit.qualified_name());
        }

        if config.translate_legacy() && features::apply_legacy_translations(&mut definition) {
            debug!("{}: legacy translation applied", unit.qualified_name());
        }

        let added = unit
            .table(target_env)
            .map(|t| t.add_properties.clone())
            .unwrap_or_default();
        for (key, value) in &added {
            ddl::upsert_property(&mut definition, key, value);
        }

        let storage_migration = config.data_strategy == DataStrategy::StorageMigration;
        if !spec.take_ownership() && !storage_migration {
            ddl::remove_property(&mut definition, props::EXTERNAL_TABLE_PURGE);
        }
        if config.cluster(target_env).legacy_hive && !storage_migration {
            ddl::remove_property(&mut definition, props::EXTERNAL_TABLE_PURGE);
            ddl::remove_property(&mut definition, props::DISCOVER_PARTITIONS);
            ddl::remove_property(&mut definition, props::BUCKETING_VERSION);
        }
    } else if source.is_view() {
        unit.add_issue(spec.source(), VIEW_ISSUE);
    } else {
        unit.add_issue(spec.source(), NON_NATIVE_ISSUE);
    }

    ddl::fix_definition(&mut definition);

    let target = unit.table_mut(target_env);
    target.name = target_name;
    target.definition = definition;
    target.partitions = source.partitions.clone();
    if target.owner.is_none() {
        target.owner = source.owner.clone();
    }
    for issue in issues {
        target.add_issue(issue);
    }
    Ok(true)
}

fn require_location(unit: &TableMirror, definition: &mut [String], location: &str) -> Result<()> {
    if ddl::update_location(definition, location) {
        Ok(())
    } else {
        Err(MirrorError::Invariant(format!(
            "{}: definition has no LOCATION clause to set to {}",
            unit.qualified_name(),
            location
        )))
    }
}

/// Managed/external handling for non-transactional sources. Returns whether the table was converted.
fn shape_non_acid(
    config: &Config,
    spec: &CopySpec,
    source: &TableDefinition,
    definition: &mut Vec<String>,
    issues: &mut Vec<String>,
    add_properties: &mut Vec<(&'static str, String)>,
) -> bool {
    if spec.upgrade() && source.is_managed() {
        let converted = ddl::make_external(definition);
        if converted {
            issues.push("Schema 'converted' from LEGACY managed to EXTERNAL".to_string());
            add_properties.push((props::LEGACY_MANAGED, "true".to_string()));
            add_properties.push((props::CONVERTED, "true".to_string()));
            if spec.take_ownership() {
                if !config.no_purge {
                    add_properties.push((props::EXTERNAL_TABLE_PURGE, "true".to_string()));
                }
            } else {
                issues.push(
                    "Ownership of the data not allowed in this scenario, PURGE flag NOT set.".to_string(),
                );
            }
        }
        converted
    } else {
        let converted = spec.make_external() && ddl::make_external(definition);
        if spec.take_ownership() && !config.no_purge {
            add_properties.push((props::EXTERNAL_TABLE_PURGE, "true".to_string()));
        }
        converted
    }
}

/// Transactional sources: strip or keep ACID shape, location and artificial buckets.
fn shape_acid(
    config: &Config,
    spec: &CopySpec,
    source: &TableDefinition,
    definition: &mut Vec<String>,
    issues: &mut Vec<String>,
    add_properties: &mut Vec<(&'static str, String)>,
) -> bool {
    let acid = &config.migrate_acid;
    if spec.make_non_transactional() {
        ddl::remove_property(definition, props::TRANSACTIONAL);
        ddl::remove_property(definition, props::TRANSACTIONAL_PROPERTIES);
        ddl::remove_property(definition, props::BUCKETING_VERSION);
    }

    let mut converted = spec.make_external() && ddl::make_external(definition);

    if spec.take_ownership()
        && (spec.target() == Environment::Transfer || (acid.downgrade && !config.no_purge))
    {
        add_properties.push((props::EXTERNAL_TABLE_PURGE, "true".to_string()));
    }

    if spec.strip_location() {
        if acid.downgrade {
            issues.push(
                "Location Stripped from 'Downgraded' ACID definition.  Location will be the default external \
                 location as configured by the database/environment."
                    .to_string(),
            );
        } else {
            issues.push(
                "Location Stripped from ACID definition.  Location element in 'CREATE' not allowed in Hive3+"
                    .to_string(),
            );
        }
        ddl::strip_location(definition);
    }

    if acid.downgrade && spec.make_external() {
        converted = ddl::make_external(definition) || converted;
        if !config.no_purge {
            add_properties.push((props::EXTERNAL_TABLE_PURGE, "true".to_string()));
        }
        add_properties.push((props::DOWNGRADED_FROM_ACID, "true".to_string()));
    }

    let threshold = acid.artificial_bucket_threshold;
    if ddl::remove_buckets(definition, threshold) {
        issues.push(format!(
            "Bucket Definition removed (was {}) because it was EQUAL TO or BELOW the configured \
             'artificialBucketThreshold' of {}",
            ddl::num_buckets(&source.definition),
            threshold
        ));
    }
    converted
}

/// SHADOW and TRANSFER locations: intermediate storage, then common storage, then the export convention.
fn bridge_location(
    config: &Config,
    ctx: &PlanContext,
    unit: &mut TableMirror,
    spec: &CopySpec,
    source: &TableDefinition,
    definition: &mut Vec<String>,
) -> Result<()> {
    let transfer = &config.transfer;
    if let Some(intermediate) = transfer.intermediate_storage.as_deref() {
        let location = format!(
            "{}/{}/{}/{}/{}",
            intermediate.trim_end_matches('/'),
            transfer.remote_working_directory,
            ctx.run_marker,
            unit.database,
            unit.name
        );
        require_location(unit, definition, &location)
    } else if transfer.common_storage.is_some() {
        let original = source.location().ok_or_else(|| {
            MirrorError::Invariant(format!("{} has no LOCATION to translate", unit.qualified_name()))
        })?;
        let translated = translator::translate_table_location(config, unit, &original, 1)?;
        require_location(unit, definition, &translated.location)
    } else if spec.strip_location() {
        ddl::strip_location(definition);
        Ok(())
    } else {
        let location = format!(
            "{}{}{}/{}",
            config.clusters.left.namespace(),
            transfer.export_base_dir_prefix.trim_end_matches('/'),
            unit.database,
            unit.name
        );
        require_location(unit, definition, &location)
    }
}
