//! Storage location translation.
//!
//! Maps a LEFT table location to its target location, applying per-database
//! overrides and the global location map, and records each translation on the
//! unit so distcp work can be grouped once planning is done.

mod distcp;

pub use distcp::{build_distcp_list, render as render_distcp, DistcpPlan};

use crate::config::{Config, DataFlow};
use crate::core::{DataStrategy, Environment, TableMirror};
use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of translating one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub location: String,
    /// A global location map entry matched.
    pub remapped: bool,
}

/// One recorded original -> translated pair, kept for distcp planning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationTranslation {
    /// Target database the location belongs to.
    pub database: String,
    /// Cluster that runs the copy.
    pub environment: Environment,
    pub original: String,
    pub translated: String,
    /// Directory levels trimmed from both sides before grouping.
    pub level: usize,
}

impl LocationTranslation {
    pub fn adjusted_original(&self) -> String {
        reduce_url_by(&self.original, self.level)
    }

    pub fn adjusted_target(&self) -> String {
        reduce_url_by(&self.translated, self.level)
    }
}

/// Reject translator settings that can't be honored in distcp mode.
///
/// distcp names the destination folder after the source folder, so neither an
/// explicit table location nor a renamed table under a consolidated database
/// can be produced by the copy.
pub fn validate(config: &Config) -> Result<()> {
    if !config.is_distcp() {
        return Ok(());
    }
    for (db, translation) in &config.translator.databases {
        if let Some((table, _)) = translation
            .tables
            .iter()
            .find(|(_, t)| t.location.is_some())
        {
            return Err(MirrorError::incompatible(
                "DISTCP_TABLE_LOCATION",
                format!(
                    "{}.{}: a table location can't be set when distcp is used to move the data",
                    db, table
                ),
            ));
        }
        if translation.consolidate_external {
            if let Some((table, _)) = translation.tables.iter().find(|(_, t)| t.rename.is_some()) {
                return Err(MirrorError::incompatible(
                    "DISTCP_CONSOLIDATE_RENAME",
                    format!(
                        "{}.{}: tables can't be renamed in a 'consolidate_external' database when distcp is used",
                        db, table
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Remove the last `levels` path segments from `url`, never cutting into the scheme or authority.
pub fn reduce_url_by(url: &str, levels: usize) -> String {
    let mut current = url.trim().trim_end_matches('/').to_string();
    let floor = match current.find("://") {
        Some(i) => current[i + 3..]
            .find('/')
            .map(|j| i + 3 + j)
            .unwrap_or(current.len()),
        None => 0,
    };
    for _ in 0..levels {
        match current.rfind('/') {
            Some(idx) if idx >= floor && idx < current.len() => current.truncate(idx),
            _ => break,
        }
    }
    current
}

/// Last path segment of a location.
pub fn last_segment(url: &str) -> &str {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Apply the global location map to a namespace-relative directory. Longest matching key wins.
pub fn apply_global_location_map(config: &Config, relative: &str) -> Option<String> {
    let mut keys: Vec<&String> = config.translator.global_location_map.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    keys.into_iter()
        .find(|k| !k.is_empty() && relative.starts_with(k.as_str()))
        .map(|k| {
            let replacement = &config.translator.global_location_map[k];
            format!("{}{}", replacement, &relative[k.len()..])
        })
}

/// Translate a LEFT table location for `unit`'s target.
///
/// Records the translation on the unit when distcp will move the data.
pub fn translate_table_location(
    config: &Config,
    unit: &mut TableMirror,
    original: &str,
    level: usize,
) -> Result<Translation> {
    let left_ns = config.clusters.left.namespace();
    if left_ns.is_empty() || !original.starts_with(left_ns) {
        return Err(MirrorError::translation(
            original,
            format!(
                "Table/Partition Location prefix: `{}` doesn't match the LEFT clusters defined hcfsNamespace: `{}`. \
                 We can't reliably make this translation.",
                original, left_ns
            ),
        ));
    }
    let relative = &original[left_ns.len()..];
    let base = config
        .transfer
        .common_storage
        .as_deref()
        .map(|c| c.trim_end_matches('/'))
        .unwrap_or_else(|| config.clusters.right.namespace());

    let translation = match override_location(config, unit, original) {
        Some(location) => Translation {
            location,
            remapped: false,
        },
        None => namespace_translation(config, unit, original, relative, base)?,
    };

    if translation.remapped {
        unit.remapped = true;
    }
    debug!(
        "{}: translated location {} -> {}",
        unit.qualified_name(),
        original,
        translation.location
    );

    if config.is_distcp() && config.data_strategy != DataStrategy::Sql {
        let environment = if config.data_strategy == DataStrategy::StorageMigration {
            Environment::Left
        } else if config.transfer.storage_migration.data_flow == DataFlow::Pull {
            Environment::Right
        } else {
            Environment::Left
        };
        let record = LocationTranslation {
            database: unit.resolved_database.clone(),
            environment,
            original: original.to_string(),
            translated: translation.location.trim().to_string(),
            level,
        };
        unit.record_translation(record);
    }
    Ok(translation)
}

/// Per-database translator overrides, in precedence order.
fn override_location(config: &Config, unit: &TableMirror, original: &str) -> Option<String> {
    let db = config.translator.databases.get(&unit.database)?;
    let table = db.tables.get(&unit.name);
    if let Some(location) = table.and_then(|t| t.location.as_ref()) {
        return Some(location.clone());
    }
    let db_location = db.location.as_deref()?.trim_end_matches('/');
    let rename = table.and_then(|t| t.rename.as_deref());
    if db.consolidate_external {
        let folder = if config.is_distcp() {
            last_segment(original)
        } else {
            rename.unwrap_or(&unit.name)
        };
        return Some(format!("{}/{}", db_location, folder));
    }
    let folder = match rename {
        Some(rename) if !config.is_distcp() => rename,
        _ => last_segment(original),
    };
    Some(format!("{}/{}", db_location, folder))
}

fn namespace_translation(
    config: &Config,
    unit: &TableMirror,
    original: &str,
    relative: &str,
    base: &str,
) -> Result<Translation> {
    let mapped = apply_global_location_map(config, relative);
    let remapped = mapped.is_some();

    if !remapped
        && config.data_strategy == DataStrategy::StorageMigration
        && config
            .transfer
            .common_storage
            .as_deref()
            .map(|c| c.trim_end_matches('/') == config.clusters.left.namespace())
            .unwrap_or(false)
        && !config.reset_to_default_location
    {
        return Err(MirrorError::translation(
            original,
            "Location Mapping can't be determined.  No matching `glm` entry to make translation.",
        ));
    }

    let location = if let Some(mapped) = mapped {
        format!("{}{}", base, mapped)
    } else if let (true, Some(ext)) = (
        config.reset_to_default_location,
        config.transfer.warehouse.external_directory.as_deref(),
    ) {
        format!("{}{}/{}.db/{}", base, ext, unit.resolved_database, unit.name)
    } else if config.data_strategy.shares_storage() {
        original.to_string()
    } else {
        format!("{}{}", base, relative)
    };
    Ok(Translation { location, remapped })
}
