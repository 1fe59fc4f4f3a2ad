//! File-based run state for resume.
//!
//! The whole collection of databases and units is persisted after each unit
//! finishes. A resumed run reuses the units that already succeeded and
//! replans everything else from scratch.

use crate::core::{DatabaseMirror, PhaseState, TableMirror};
use crate::error::{MirrorError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Persisted state of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA256 hash of the configuration the run was planned with.
    pub config_hash: String,

    pub started_at: DateTime<Utc>,

    pub status: RunStatus,

    /// Databases keyed by source name, each carrying its units.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseMirror>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// HMAC-SHA256 over the serialized state (without this field), keyed by `config_hash`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn new(run_id: String, config_hash: String) -> Self {
        Self {
            run_id,
            config_hash,
            started_at: Utc::now(),
            status: RunStatus::Running,
            databases: BTreeMap::new(),
            completed_at: None,
            hmac: None,
        }
    }

    fn compute_hmac(&self) -> Result<String> {
        let mut unsigned = self.clone();
        unsigned.hmac = None;

        let content = serde_json::to_string(&unsigned)
            .map_err(|e| MirrorError::State(format!("Failed to serialize state for HMAC: {}", e)))?;

        let mut mac = HmacSha256::new_from_slice(self.config_hash.as_bytes())
            .map_err(|e| MirrorError::State(format!("Failed to create HMAC: {}", e)))?;
        mac.update(content.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Load state from a file, verifying its HMAC when present.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;

        match &state.hmac {
            Some(stored) => {
                if *stored != state.compute_hmac()? {
                    return Err(MirrorError::State(
                        "State file integrity check failed: HMAC mismatch (possible tampering)".to_string(),
                    ));
                }
            }
            None => warn!("State file has no HMAC signature, integrity cannot be verified"),
        }
        Ok(state)
    }

    /// Save state atomically (temp file, then rename) with a fresh HMAC.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.hmac = Some(self.compute_hmac()?);

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MirrorError::State(format!("Failed to serialize state: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Resume is only allowed with the configuration the state was written with.
    pub fn validate_config(&self, config_hash: &str) -> Result<()> {
        if self.config_hash != config_hash {
            return Err(MirrorError::ConfigChanged);
        }
        Ok(())
    }

    /// Store the database-level part of a record; its units are kept.
    pub fn record_database(&mut self, database: &DatabaseMirror) {
        let entry = self
            .databases
            .entry(database.name.clone())
            .or_insert_with(|| DatabaseMirror::new(&database.name, &database.resolved_name));
        entry.resolved_name = database.resolved_name.clone();
        entry.properties = database.properties.clone();
        entry.issues = database.issues.clone();
        entry.sql = database.sql.clone();
        entry.filtered_out = database.filtered_out.clone();
    }

    /// Store a unit's latest state.
    pub fn record_unit(&mut self, unit: &TableMirror) {
        let database = self
            .databases
            .entry(unit.database.clone())
            .or_insert_with(|| DatabaseMirror::new(&unit.database, &unit.resolved_database));
        database.tables.insert(unit.name.clone(), unit.clone());
    }

    pub fn unit(&self, database: &str, table: &str) -> Option<&TableMirror> {
        self.databases.get(database)?.tables.get(table)
    }

    /// Unit carried over from the previous attempt, when it already succeeded.
    ///
    /// The returned copy is moved to RETRY_SKIPPED_PAST_SUCCESS; units skipped
    /// by an earlier resume are returned as they are.
    pub fn carried_over(&self, database: &str, table: &str) -> Option<TableMirror> {
        let previous = self.unit(database, table)?;
        match previous.phase_state {
            PhaseState::Success => {
                let mut unit = previous.clone();
                unit.set_phase_state(PhaseState::RetrySkippedPastSuccess).ok()?;
                Some(unit)
            }
            PhaseState::RetrySkippedPastSuccess => Some(previous.clone()),
            _ => None,
        }
    }

    /// Count of units per phase state.
    pub fn phase_counts(&self) -> BTreeMap<PhaseState, usize> {
        let mut counts = BTreeMap::new();
        for unit in self.databases.values().flat_map(|d| d.tables.values()) {
            *counts.entry(unit.phase_state).or_insert(0) += 1;
        }
        counts
    }

    pub fn mark_completed(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}
