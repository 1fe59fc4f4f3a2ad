//! HiveQL statement templates and the shared statement builders.
//!
//! Each template is a small function rather than a format string so call
//! sites read like the statement they produce.

use crate::config::Config;
use crate::core::{Environment, Statement, TableDefinition};

// Statement descriptions, as they appear next to each statement in the scripts.
pub const USE_DESC: &str = "Selecting DB";
pub const CREATE_DESC: &str = "Creating Table";
pub const CREATE_SHADOW_DESC: &str = "Creating Shadow Table";
pub const CREATE_TRANSFER_DESC: &str = "Creating Transfer Table";
pub const DROP_DESC: &str = "Dropping Table";
pub const DROP_SHADOW_DESC: &str = "Dropping Shadow Table";
pub const DROP_TRANSFER_DESC: &str = "Dropping Transfer Table";
pub const RENAME_DESC: &str = "Renaming table";
pub const REPAIR_DESC: &str = "Repairing Table (MSCK)";
pub const SET_OWNER_DESC: &str = "Set table owner";
pub const EXPORT_DESC: &str = "Export Table";
pub const IMPORT_DESC: &str = "Import Table";
pub const REMOVE_TABLE_PROP_DESC: &str = "Remove table property";
pub const ADD_TABLE_PROP_DESC: &str = "Add/Update Table Property";
pub const ALTER_TABLE_LOCATION_DESC: &str = "Alter Table Location";
pub const STORAGE_MIGRATION_TRANSFER_DESC: &str = "Moving data to new Namespace";
pub const STAGE_TRANSFER_DESC: &str = "Moving data to transfer table";
pub const LOAD_FROM_SHADOW_DESC: &str = "Loading table from Shadow";
pub const CREATE_DB_DESC: &str = "Create Database";
pub const ALTER_DB_LOCATION_DESC: &str = "Alter Database Location";
pub const ALTER_DB_MNGD_LOCATION_DESC: &str = "Alter Database Managed Location";
pub const DISTCP_DESC: &str = "distcp specified";
pub const ALTER_PARTITION_LOCATION_DESC: &str = "Alter Partition Location";
pub const TEZ_EXECUTION_DESC: &str = "Set 'tez' as the execution engine";
pub const POST_MIGRATION_CLEANUP_DESC: &str = "Post Migration Cleanup";

/// Legacy clusters may default to MapReduce, which can't run the transfer inserts reliably.
pub const SET_TEZ_AS_EXECUTION_ENGINE: &str = "set hive.execution.engine=tez";

pub const SORT_DYNAMIC_PARTITION: &str = "hive.optimize.sort.dynamic.partition";
pub const SORT_DYNAMIC_PARTITION_THRESHOLD: &str = "hive.optimize.sort.dynamic.partition.threshold";

/// Suffix of the table an in-place downgrade leaves behind.
pub const ARCHIVE_SUFFIX: &str = "_archive";

pub fn use_db(database: &str) -> String {
    format!("USE {}", database)
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}

pub fn drop_view(view: &str) -> String {
    format!("DROP VIEW IF EXISTS {}", view)
}

pub fn rename_table(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME TO {}", from, to)
}

pub fn set_owner(table: &str, owner: &str) -> String {
    format!("ALTER TABLE {} SET OWNER USER {}", table, owner)
}

pub fn export_table(table: &str, location: &str) -> String {
    format!("EXPORT TABLE {} TO \"{}\"", table, location)
}

pub fn import_table(table: &str, location: &str) -> String {
    format!("IMPORT TABLE {} FROM \"{}\"", table, location)
}

pub fn import_external_table(table: &str, location: &str) -> String {
    format!("IMPORT EXTERNAL TABLE {} FROM \"{}\"", table, location)
}

pub fn import_external_table_location(table: &str, from: &str, location: &str) -> String {
    format!(
        "IMPORT EXTERNAL TABLE {} FROM \"{}\" LOCATION \"{}\"",
        table, from, location
    )
}

pub fn set_table_property(table: &str, key: &str, value: &str) -> String {
    format!("ALTER TABLE {} SET TBLPROPERTIES (\"{}\"=\"{}\")", table, key, value)
}

pub fn unset_table_property(table: &str, key: &str) -> String {
    format!("ALTER TABLE {} UNSET TBLPROPERTIES (\"{}\")", table, key)
}

pub fn set_table_location(table: &str, location: &str) -> String {
    format!("ALTER TABLE {} SET LOCATION \"{}\"", table, location)
}

pub fn set_partition_location(table: &str, partition_spec: &str, location: &str) -> String {
    format!(
        "ALTER TABLE {} PARTITION ({}) SET LOCATION \"{}\"",
        table, partition_spec, location
    )
}

pub fn msck_repair(table: &str) -> String {
    format!("MSCK REPAIR TABLE {}", table)
}

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

pub fn alter_db_location(database: &str, location: &str) -> String {
    format!("ALTER DATABASE {} SET LOCATION \"{}\"", database, location)
}

pub fn alter_db_managed_location(database: &str, location: &str) -> String {
    format!("ALTER DATABASE {} SET MANAGEDLOCATION \"{}\"", database, location)
}

pub fn session_set(key: &str, value: &str) -> String {
    format!("set {}={}", key, value)
}

pub fn insert_overwrite(from: &str, to: &str) -> String {
    format!("FROM {} INSERT OVERWRITE TABLE {} SELECT *", from, to)
}

pub fn insert_partitioned_declarative(from: &str, to: &str, partitions: &str) -> String {
    format!(
        "FROM {} INSERT OVERWRITE TABLE {} PARTITION ({}) SELECT * ",
        from, to, partitions
    )
}

pub fn insert_partitioned_prescriptive(from: &str, to: &str, partitions: &str) -> String {
    format!(
        "FROM {} INSERT OVERWRITE TABLE {} PARTITION ({}) SELECT * DISTRIBUTE BY {}",
        from, to, partitions, partitions
    )
}

/// Where a data-moving insert is headed; only changes the statement descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Source table into its TRANSFER table.
    Stage,
    /// SHADOW table into the final RIGHT table.
    FromShadow,
    /// Archived or renamed table into its new-namespace replacement.
    NewNamespace,
}

impl TransferKind {
    fn description(&self, partitions: Option<usize>) -> String {
        match (self, partitions) {
            (TransferKind::Stage, Some(n)) => format!("Moving data to partitioned ({}) transfer table", n),
            (TransferKind::Stage, None) => STAGE_TRANSFER_DESC.to_string(),
            (TransferKind::FromShadow, Some(n)) => format!("Loading table from Partitioned ({}) Shadow", n),
            (TransferKind::FromShadow, None) => LOAD_FROM_SHADOW_DESC.to_string(),
            (TransferKind::NewNamespace, Some(n)) => format!("Moving partitioned ({}) data to new Namespace", n),
            (TransferKind::NewNamespace, None) => STORAGE_MIGRATION_TRANSFER_DESC.to_string(),
        }
    }
}

/// `set k=v` statements from the per-cluster optimization overrides.
pub fn session_overrides(config: &Config, environment: Environment) -> Vec<Statement> {
    let overrides = match environment {
        Environment::Left | Environment::Transfer => &config.optimization.overrides.left,
        Environment::Right | Environment::Shadow => &config.optimization.overrides.right,
    };
    overrides
        .iter()
        .map(|(k, v)| Statement::new(format!("Setting {}", k), session_set(k, v)))
        .collect()
}

/// Insert statements moving all rows of `source` (table `from`) into `to`, run on `environment`.
///
/// Partitioned tables get a dynamic-partition insert whose shape follows the
/// optimization settings: `skip` is a plain declarative insert, sorted inserts
/// let Hive sort, and the default distributes by the partition columns so each
/// partition is written by one reducer.
pub fn data_transfer(
    config: &Config,
    environment: Environment,
    source: &TableDefinition,
    from: &str,
    to: &str,
    kind: TransferKind,
) -> Vec<Statement> {
    let mut statements = Vec::new();
    if !source.is_partitioned() {
        statements.push(Statement::new(kind.description(None), insert_overwrite(from, to)));
        return statements;
    }

    let legacy = config.cluster(environment).legacy_hive;
    let partitions = source.partition_elements();
    let description = kind.description(Some(source.partitions.len()));
    let optimization = &config.optimization;

    if optimization.skip {
        if !legacy {
            statements.push(setting(SORT_DYNAMIC_PARTITION, "false"));
        }
        statements.push(Statement::new(
            description,
            insert_partitioned_declarative(from, to, &partitions),
        ));
    } else if optimization.sort_dynamic_partition_inserts {
        if !legacy {
            statements.push(setting(SORT_DYNAMIC_PARTITION, "true"));
            statements.push(setting(SORT_DYNAMIC_PARTITION_THRESHOLD, "0"));
        }
        statements.push(Statement::new(
            description,
            insert_partitioned_declarative(from, to, &partitions),
        ));
    } else {
        if !legacy {
            statements.push(setting(SORT_DYNAMIC_PARTITION, "false"));
            statements.push(setting(SORT_DYNAMIC_PARTITION_THRESHOLD, "-1"));
        }
        statements.push(Statement::new(
            description,
            insert_partitioned_prescriptive(from, to, &partitions),
        ));
    }
    statements
}

fn setting(key: &str, value: &str) -> Statement {
    Statement::new(format!("Setting {}", key), session_set(key, value))
}
