//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::core::Environment;
use crate::error::Result;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration for resume validation.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Cluster that hosts an environment. SHADOW lives on the target, TRANSFER on the source.
    pub fn cluster(&self, environment: Environment) -> &ClusterConfig {
        match environment {
            Environment::Left | Environment::Transfer => &self.clusters.left,
            Environment::Right | Environment::Shadow => &self.clusters.right,
        }
    }

    /// Target database name: explicit rename, then translator rename, then prefix.
    pub fn resolved_database(&self, database: &str) -> String {
        if let Some(rename) = &self.db_rename {
            return rename.clone();
        }
        if let Some(rename) = self
            .translator
            .databases
            .get(database)
            .and_then(|d| d.rename.as_ref())
        {
            return rename.clone();
        }
        match &self.db_prefix {
            Some(prefix) => format!("{}{}", prefix, database),
            None => database.to_string(),
        }
    }

    /// Legacy source into a non-legacy target: managed tables are upgraded to external.
    pub fn convert_managed(&self) -> bool {
        self.clusters.left.legacy_hive && !self.clusters.right.legacy_hive
    }

    /// Whether legacy SerDe translations apply.
    pub fn translate_legacy(&self) -> bool {
        self.convert_managed() && !self.skip_legacy_translation
    }

    pub fn is_distcp(&self) -> bool {
        self.transfer.storage_migration.distcp
    }

    /// Whether a metadata failure message is transient rather than a sign of absence.
    pub fn is_transient_failure(&self, message: &str) -> bool {
        self.transient_patterns
            .iter()
            .any(|p| !p.is_empty() && message.contains(p.as_str()))
    }
}

/// Compiled table include/exclude filter.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl TableFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let include = config.tbl_regex.as_deref().map(Regex::new).transpose()?;
        let exclude = config
            .tbl_exclude_regex
            .as_deref()
            .map(Regex::new)
            .transpose()?;
        Ok(Self { include, exclude })
    }

    pub fn accepts(&self, table: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(table) {
                return false;
            }
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(table),
            None => true,
        }
    }
}
