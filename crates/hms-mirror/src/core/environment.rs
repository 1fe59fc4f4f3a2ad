//! Role tags and the small enums shared across planning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role one projection of a table plays in a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Source cluster.
    Left,
    /// Target cluster.
    Right,
    /// Unowned pointer table on the target that reads source data in place.
    Shadow,
    /// Staging table on the source used to normalize shape before transfer.
    Transfer,
}

impl Environment {
    /// LEFT and RIGHT map to real clusters; SHADOW and TRANSFER are planning slots.
    pub fn is_cluster(&self) -> bool {
        matches!(self, Environment::Left | Environment::Right)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Left => "LEFT",
            Environment::Right => "RIGHT",
            Environment::Shadow => "SHADOW",
            Environment::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level data movement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataStrategy {
    #[default]
    SchemaOnly,
    Linked,
    Common,
    Sql,
    ExportImport,
    Hybrid,
    /// Storage-bridged path shared by SQL, HYBRID and ACID migrations.
    /// Never selected directly in configuration.
    Intermediate,
    StorageMigration,
    Dump,
    /// LEFT-only rewrite of an ACID table into an external one.
    #[serde(rename = "ACID_DOWNGRADE_INPLACE")]
    AcidDowngradeInPlace,
}

impl DataStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStrategy::SchemaOnly => "SCHEMA_ONLY",
            DataStrategy::Linked => "LINKED",
            DataStrategy::Common => "COMMON",
            DataStrategy::Sql => "SQL",
            DataStrategy::ExportImport => "EXPORT_IMPORT",
            DataStrategy::Hybrid => "HYBRID",
            DataStrategy::Intermediate => "INTERMEDIATE",
            DataStrategy::StorageMigration => "STORAGE_MIGRATION",
            DataStrategy::Dump => "DUMP",
            DataStrategy::AcidDowngradeInPlace => "ACID_DOWNGRADE_INPLACE",
        }
    }

    /// Strategies that only ever touch the LEFT cluster.
    pub fn is_left_only(&self) -> bool {
        matches!(
            self,
            DataStrategy::Dump | DataStrategy::StorageMigration | DataStrategy::AcidDowngradeInPlace
        )
    }

    /// Strategies whose target shares the source's storage.
    pub fn shares_storage(&self) -> bool {
        matches!(self, DataStrategy::Linked | DataStrategy::Common)
    }
}

impl fmt::Display for DataStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "SCHEMA_ONLY" => Ok(DataStrategy::SchemaOnly),
            "LINKED" => Ok(DataStrategy::Linked),
            "COMMON" => Ok(DataStrategy::Common),
            "SQL" => Ok(DataStrategy::Sql),
            "EXPORT_IMPORT" => Ok(DataStrategy::ExportImport),
            "HYBRID" => Ok(DataStrategy::Hybrid),
            "STORAGE_MIGRATION" => Ok(DataStrategy::StorageMigration),
            "DUMP" => Ok(DataStrategy::Dump),
            "ACID_DOWNGRADE_INPLACE" => Ok(DataStrategy::AcidDowngradeInPlace),
            other => Err(format!("unknown data strategy '{}'", other)),
        }
    }
}

/// Disposition of a target object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateStrategy {
    #[default]
    Nothing,
    Leave,
    Drop,
    Replace,
    Create,
}

impl CreateStrategy {
    /// Whether this disposition removes an existing object.
    pub fn is_destructive(&self) -> bool {
        matches!(self, CreateStrategy::Drop | CreateStrategy::Replace)
    }
}

impl fmt::Display for CreateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CreateStrategy::Nothing => "NOTHING",
            CreateStrategy::Leave => "LEAVE",
            CreateStrategy::Drop => "DROP",
            CreateStrategy::Replace => "REPLACE",
            CreateStrategy::Create => "CREATE",
        };
        f.write_str(s)
    }
}

/// Terminal/progress state of a migration unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    #[default]
    Init,
    Started,
    Success,
    Error,
    RetrySkippedPastSuccess,
}

impl PhaseState {
    /// Legal transitions. ERROR and INIT may restart on retry.
    pub fn can_transition_to(&self, next: PhaseState) -> bool {
        use PhaseState::*;
        matches!(
            (self, next),
            (Init, Started)
                | (Started, Success)
                | (Started, Error)
                | (Success, RetrySkippedPastSuccess)
                | (Error, Started)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseState::Success | PhaseState::Error | PhaseState::RetrySkippedPastSuccess
        )
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseState::Init => "INIT",
            PhaseState::Started => "STARTED",
            PhaseState::Success => "SUCCESS",
            PhaseState::Error => "ERROR",
            PhaseState::RetrySkippedPastSuccess => "RETRY_SKIPPED_PAST_SUCCESS",
        };
        f.write_str(s)
    }
}
