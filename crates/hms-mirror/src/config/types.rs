//! Configuration type definitions.

use crate::core::DataStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Top-level data movement strategy (default: SCHEMA_ONLY).
    #[serde(default)]
    pub data_strategy: DataStrategy,

    /// Databases to process.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Prefix applied to every target database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_prefix: Option<String>,

    /// Explicit target database name. Only valid with a single database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_rename: Option<String>,

    /// Table include/exclude filters.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Source (left) and target (right) cluster settings.
    #[serde(default)]
    pub clusters: Clusters,

    /// ACID table handling.
    #[serde(default)]
    pub migrate_acid: MigrateAcidConfig,

    /// View handling.
    #[serde(default)]
    pub migrate_view: MigrateViewConfig,

    /// Include non-native (connector) tables in EXPORT_IMPORT runs.
    #[serde(default)]
    pub migrate_non_native: bool,

    /// Partition limits used to route HYBRID and SQL transfers.
    #[serde(default)]
    pub hybrid: HybridConfig,

    /// Transfer mechanics: concurrency, prefixes, storage bridging.
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Location translation rules.
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Transfer SQL tuning.
    #[serde(default)]
    pub optimization: OptimizationConfig,

    /// Never take ownership of target data.
    #[serde(default)]
    pub read_only: bool,

    /// Keep the target in step with the source: drop what vanished, replace what changed.
    #[serde(default)]
    pub sync: bool,

    /// Never set the purge property, even when ownership is claimed.
    #[serde(default)]
    pub no_purge: bool,

    /// Strip table locations so the target warehouse decides placement.
    #[serde(default)]
    pub reset_to_default_location: bool,

    /// Skip the feature fixup chain.
    #[serde(default)]
    pub skip_features: bool,

    /// Skip legacy SerDe class translations.
    #[serde(default)]
    pub skip_legacy_translation: bool,

    /// Emit `SET OWNER` statements for created tables.
    #[serde(default)]
    pub transfer_ownership: bool,

    /// Run the plan through the statement executor (otherwise dry run).
    #[serde(default)]
    pub execute: bool,

    /// Rewrite fully qualified `avro.schema.url` values to the target namespace.
    #[serde(default)]
    pub copy_avro_schema_urls: bool,

    /// Metadata failures matching any of these substrings are reported as issues, not absence.
    #[serde(default = "default_transient_patterns")]
    pub transient_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_strategy: DataStrategy::default(),
            databases: Vec::new(),
            db_prefix: None,
            db_rename: None,
            filter: FilterConfig::default(),
            clusters: Clusters::default(),
            migrate_acid: MigrateAcidConfig::default(),
            migrate_view: MigrateViewConfig::default(),
            migrate_non_native: false,
            hybrid: HybridConfig::default(),
            transfer: TransferConfig::default(),
            translator: TranslatorConfig::default(),
            optimization: OptimizationConfig::default(),
            read_only: false,
            sync: false,
            no_purge: false,
            reset_to_default_location: false,
            skip_features: false,
            skip_legacy_translation: false,
            transfer_ownership: false,
            execute: false,
            copy_avro_schema_urls: false,
            transient_patterns: default_transient_patterns(),
        }
    }
}

/// Table name filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Only tables matching this regex are processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbl_regex: Option<String>,

    /// Tables matching this regex are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbl_exclude_regex: Option<String>,
}

impl FilterConfig {
    pub fn is_table_filtering(&self) -> bool {
        self.tbl_regex.is_some() || self.tbl_exclude_regex.is_some()
    }
}

/// Both cluster descriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clusters {
    #[serde(default)]
    pub left: ClusterConfig,

    #[serde(default)]
    pub right: ClusterConfig,
}

/// One cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Hive 1/2 cluster (no ACID v2, no purge or discover-partitions properties).
    #[serde(default)]
    pub legacy_hive: bool,

    /// Storage namespace, e.g. `hdfs://NAMESERVICE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcfs_namespace: Option<String>,

    /// Emit `CREATE ... IF NOT EXISTS`.
    #[serde(default)]
    pub create_if_not_exists: bool,

    /// Partition discovery behavior.
    #[serde(default)]
    pub partition_discovery: PartitionDiscovery,
}

impl ClusterConfig {
    /// Namespace without a trailing slash, or an empty string when unset.
    pub fn namespace(&self) -> &str {
        self.hcfs_namespace
            .as_deref()
            .map(|ns| ns.trim_end_matches('/'))
            .unwrap_or("")
    }
}

/// Partition discovery settings for a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionDiscovery {
    /// Set `discover.partitions` on external partitioned tables (default: true).
    #[serde(default = "default_true")]
    pub auto: bool,

    /// Emit `MSCK REPAIR TABLE` after creating a partitioned table (default: true).
    #[serde(default = "default_true")]
    pub init_msck: bool,
}

impl Default for PartitionDiscovery {
    fn default() -> Self {
        Self {
            auto: true,
            init_msck: true,
        }
    }
}

/// ACID migration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateAcidConfig {
    /// Migrate ACID tables.
    #[serde(default)]
    pub on: bool,

    /// Migrate ACID tables only.
    #[serde(default)]
    pub only: bool,

    /// Bucket counts at or below this are considered artificial and removed (default: 2).
    #[serde(default = "default_bucket_threshold")]
    pub artificial_bucket_threshold: i32,

    /// Partition ceiling for ACID SQL transfers (default: 500).
    #[serde(default = "default_partition_limit")]
    pub partition_limit: usize,

    /// Convert ACID tables to external tables on the target.
    #[serde(default)]
    pub downgrade: bool,

    /// Downgrade on the source cluster itself.
    #[serde(default)]
    pub in_place: bool,
}

impl Default for MigrateAcidConfig {
    fn default() -> Self {
        Self {
            on: false,
            only: false,
            artificial_bucket_threshold: default_bucket_threshold(),
            partition_limit: default_partition_limit(),
            downgrade: false,
            in_place: false,
        }
    }
}

impl MigrateAcidConfig {
    pub fn is_downgrade_in_place(&self) -> bool {
        self.downgrade && self.in_place
    }
}

/// View settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrateViewConfig {
    /// Process views only.
    #[serde(default)]
    pub on: bool,
}

/// Partition thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Above this partition count HYBRID switches from EXPORT_IMPORT to SQL (default: 100).
    #[serde(default = "default_export_import_limit")]
    pub export_import_partition_limit: usize,

    /// Partition ceiling for non-ACID SQL transfers (default: 500).
    #[serde(default = "default_partition_limit")]
    pub sql_partition_limit: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            export_import_partition_limit: default_export_import_limit(),
            sql_partition_limit: default_partition_limit(),
        }
    }
}

/// Transfer mechanics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Tables planned in parallel (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Name prefix for TRANSFER tables.
    #[serde(default = "default_transfer_prefix")]
    pub transfer_prefix: String,

    /// Name prefix for SHADOW tables.
    #[serde(default = "default_shadow_prefix")]
    pub shadow_prefix: String,

    /// Export directory prefix used by EXPORT_IMPORT without bridged storage.
    #[serde(default = "default_export_base_dir_prefix")]
    pub export_base_dir_prefix: String,

    /// Working directory under intermediate/common storage.
    #[serde(default = "default_remote_working_directory")]
    pub remote_working_directory: String,

    /// Storage reachable from both clusters, used to stage data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_storage: Option<String>,

    /// Storage shared by both clusters; data is written once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_storage: Option<String>,

    /// Storage migration settings.
    #[serde(default)]
    pub storage_migration: StorageMigrationConfig,

    /// Warehouse directories for the target.
    #[serde(default)]
    pub warehouse: WarehouseConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            transfer_prefix: default_transfer_prefix(),
            shadow_prefix: default_shadow_prefix(),
            export_base_dir_prefix: default_export_base_dir_prefix(),
            remote_working_directory: default_remote_working_directory(),
            intermediate_storage: None,
            common_storage: None,
            storage_migration: StorageMigrationConfig::default(),
            warehouse: WarehouseConfig::default(),
        }
    }
}

/// Storage migration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageMigrationConfig {
    /// Data moves by external `distcp` instead of SQL.
    #[serde(default)]
    pub distcp: bool,

    /// Which cluster runs the copy.
    #[serde(default)]
    pub data_flow: DataFlow,
}

/// Direction of a distcp copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataFlow {
    /// Target cluster pulls from the source.
    #[default]
    Pull,

    /// Source cluster pushes to the target.
    Push,
}

/// Warehouse directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_directory: Option<String>,
}

impl WarehouseConfig {
    pub fn is_complete(&self) -> bool {
        self.external_directory.is_some() && self.managed_directory.is_some()
    }
}

/// Location translation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Always write an explicit LOCATION for translated tables.
    #[serde(default)]
    pub force_external_location: bool,

    /// Relative-directory rewrites, longest prefix wins.
    #[serde(default)]
    pub global_location_map: BTreeMap<String, String>,

    /// Directory levels trimmed when grouping distcp work (default: 1).
    #[serde(default = "default_consolidation_level")]
    pub consolidation_level: usize,

    /// Per-database overrides.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseTranslation>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            force_external_location: false,
            global_location_map: BTreeMap::new(),
            consolidation_level: default_consolidation_level(),
            databases: BTreeMap::new(),
        }
    }
}

impl TranslatorConfig {
    /// Translation is "on" once any database override exists.
    pub fn is_on(&self) -> bool {
        !self.databases.is_empty()
    }
}

/// Per-database translation overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseTranslation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_location: Option<String>,

    /// Place every external table directly under `location`.
    #[serde(default)]
    pub consolidate_external: bool,

    #[serde(default)]
    pub tables: BTreeMap<String, TableTranslation>,
}

/// Per-table translation overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableTranslation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Transfer SQL tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Plain declarative partitioned inserts.
    #[serde(default)]
    pub skip: bool,

    /// Let Hive sort dynamic-partition inserts.
    #[serde(default)]
    pub sort_dynamic_partition_inserts: bool,

    /// Session settings emitted before transfer SQL.
    #[serde(default)]
    pub overrides: SessionOverrides,
}

/// Session settings per cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOverrides {
    #[serde(default)]
    pub left: BTreeMap<String, String>,

    #[serde(default)]
    pub right: BTreeMap<String, String>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_bucket_threshold() -> i32 {
    2
}

fn default_partition_limit() -> usize {
    500
}

fn default_export_import_limit() -> usize {
    100
}

fn default_concurrency() -> usize {
    4
}

fn default_transfer_prefix() -> String {
    "hms_mirror_transfer_".to_string()
}

fn default_shadow_prefix() -> String {
    "hms_mirror_shadow_".to_string()
}

fn default_export_base_dir_prefix() -> String {
    "/apps/hive/warehouse/export_".to_string()
}

fn default_remote_working_directory() -> String {
    "hms_mirror_working".to_string()
}

fn default_consolidation_level() -> usize {
    1
}

fn default_transient_patterns() -> Vec<String> {
    vec![
        "Could not open client transport".to_string(),
        "Connection refused".to_string(),
        "timed out".to_string(),
    ]
}
