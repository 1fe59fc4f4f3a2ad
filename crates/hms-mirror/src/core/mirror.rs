//! The per-table migration unit.

use super::{DataStrategy, Environment, PhaseState, TableDefinition};
use crate::error::{MirrorError, Result};
use crate::translator::LocationTranslation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A timestamped step in a unit's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub mark: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub at: DateTime<Utc>,
    /// Milliseconds since the previous marker.
    pub elapsed_ms: i64,
}

/// One table's migration: its projections, chosen strategy and progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMirror {
    /// Source table name.
    pub name: String,

    /// Source database.
    pub database: String,

    /// Target database after prefix/rename rules.
    pub resolved_database: String,

    /// Strategy actually applied; may differ from the configured one (HYBRID, INTERMEDIATE).
    #[serde(default)]
    pub strategy: DataStrategy,

    /// Projections keyed by environment.
    #[serde(default)]
    pub environments: BTreeMap<Environment, TableDefinition>,

    #[serde(default)]
    pub phase_state: PhaseState,

    #[serde(default)]
    pub current_phase: u32,

    #[serde(default)]
    pub total_phase_count: u32,

    /// Message for the stage in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_message: Option<String>,

    #[serde(default)]
    pub steps: Vec<Marker>,

    /// A global location map entry applied to this table.
    #[serde(default)]
    pub remapped: bool,

    /// Location translations recorded for distcp planning.
    #[serde(default)]
    pub translations: Vec<LocationTranslation>,
}

impl TableMirror {
    pub fn new(
        database: impl Into<String>,
        resolved_database: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let mut mirror = Self {
            name: name.into(),
            database: database.into(),
            resolved_database: resolved_database.into(),
            strategy: DataStrategy::default(),
            environments: BTreeMap::new(),
            phase_state: PhaseState::Init,
            current_phase: 0,
            total_phase_count: 0,
            stage_message: None,
            steps: Vec::new(),
            remapped: false,
            translations: Vec::new(),
        };
        mirror.add_step("init", None);
        mirror
    }

    /// Qualified `db.table` name used in logs.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    pub fn table(&self, environment: Environment) -> Option<&TableDefinition> {
        self.environments.get(&environment)
    }

    /// Projection for an environment, created (named after the source table) on first use.
    pub fn table_mut(&mut self, environment: Environment) -> &mut TableDefinition {
        let name = self.name.clone();
        self.environments
            .entry(environment)
            .or_insert_with(|| TableDefinition::new(name))
    }

    /// Projection that must already be captured.
    pub fn require(&self, environment: Environment) -> Result<&TableDefinition> {
        self.environments.get(&environment).ok_or_else(|| {
            MirrorError::Invariant(format!(
                "{} has no {} definition",
                self.qualified_name(),
                environment
            ))
        })
    }

    pub fn add_issue(&mut self, environment: Environment, issue: impl Into<String>) {
        self.table_mut(environment).add_issue(issue);
    }

    pub fn add_step(&mut self, mark: impl Into<String>, description: Option<String>) {
        let now = Utc::now();
        let elapsed_ms = self
            .steps
            .last()
            .map(|m| (now - m.at).num_milliseconds())
            .unwrap_or(0);
        self.steps.push(Marker {
            mark: mark.into(),
            description,
            at: now,
            elapsed_ms,
        });
    }

    /// Advance the phase counter. Only drives the progress indicator.
    pub fn next_phase(&mut self, message: impl Into<String>) {
        self.current_phase += 1;
        if self.current_phase >= self.total_phase_count {
            self.total_phase_count = self.current_phase + 1;
        }
        self.stage_message = Some(message.into());
    }

    pub fn processing_done(&mut self) {
        self.total_phase_count = self.current_phase;
        self.stage_message = None;
    }

    /// Text progress bar of `width` characters.
    pub fn progress_indicator(&self, width: usize) -> String {
        let total = self.total_phase_count.max(1) as usize;
        let done = (width * self.current_phase as usize / total).min(width);
        format!("{}{}|", "=".repeat(done), "-".repeat(width - done))
    }

    /// Move to a new phase state, rejecting illegal transitions.
    pub fn set_phase_state(&mut self, state: PhaseState) -> Result<()> {
        if self.phase_state == state {
            return Ok(());
        }
        if !self.phase_state.can_transition_to(state) {
            return Err(MirrorError::Invariant(format!(
                "{}: illegal phase transition {} -> {}",
                self.qualified_name(),
                self.phase_state,
                state
            )));
        }
        self.phase_state = state;
        self.add_step("phase", Some(state.to_string()));
        Ok(())
    }

    /// Structural equality of two projections. False when either is missing.
    pub fn schemas_equal(&self, one: Environment, two: Environment) -> bool {
        match (self.table(one), self.table(two)) {
            (Some(a), Some(b)) if a.is_defined() && b.is_defined() => {
                super::ddl::schemas_equal(&a.definition, &b.definition)
            }
            _ => false,
        }
    }

    pub fn has_issues(&self) -> bool {
        self.environments.values().any(|t| !t.issues.is_empty())
    }

    pub fn has_sql(&self, environment: Environment) -> bool {
        self.table(environment)
            .map(|t| !t.sql.is_empty())
            .unwrap_or(false)
    }

    pub fn has_cleanup_sql(&self, environment: Environment) -> bool {
        self.table(environment)
            .map(|t| !t.cleanup_sql.is_empty())
            .unwrap_or(false)
    }

    pub fn record_translation(&mut self, translation: LocationTranslation) {
        self.translations.push(translation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ddl::fixtures;

    #[test]
    fn test_new_unit_has_init_step() {
        let unit = TableMirror::new("sales", "sales", "orders");
        assert_eq!(unit.steps.len(), 1);
        assert_eq!(unit.steps[0].mark, "init");
        assert_eq!(unit.phase_state, PhaseState::Init);
        assert_eq!(unit.qualified_name(), "sales.orders");
    }

    #[test]
    fn test_phase_counter_and_progress() {
        let mut unit = TableMirror::new("sales", "sales", "orders");
        unit.next_phase("Fetching metadata");
        unit.next_phase("Building definitions");
        assert_eq!(unit.current_phase, 2);
        assert_eq!(unit.total_phase_count, 3);
        assert_eq!(unit.progress_indicator(9), "======---|");
        unit.processing_done();
        assert_eq!(unit.progress_indicator(4), "====|");
        assert!(unit.stage_message.is_none());
    }

    #[test]
    fn test_phase_state_transitions() {
        let mut unit = TableMirror::new("sales", "sales", "orders");
        assert!(unit.set_phase_state(PhaseState::Success).is_err());
        unit.set_phase_state(PhaseState::Started).unwrap();
        unit.set_phase_state(PhaseState::Success).unwrap();
        unit.set_phase_state(PhaseState::RetrySkippedPastSuccess).unwrap();
        assert_eq!(unit.phase_state, PhaseState::RetrySkippedPastSuccess);
    }

    #[test]
    fn test_table_mut_names_after_source() {
        let mut unit = TableMirror::new("sales", "sales", "orders");
        unit.add_issue(Environment::Right, "Schema will be created");
        let right = unit.table(Environment::Right).unwrap();
        assert_eq!(right.name, "orders");
        assert!(unit.has_issues());
        assert!(unit.require(Environment::Shadow).is_err());
    }

    #[test]
    fn test_schemas_equal_requires_both() {
        let mut unit = TableMirror::new("sales", "sales", "orders");
        unit.table_mut(Environment::Left).definition = fixtures::external_partitioned();
        assert!(!unit.schemas_equal(Environment::Left, Environment::Right));
        unit.table_mut(Environment::Right).definition = fixtures::external_partitioned();
        assert!(unit.schemas_equal(Environment::Left, Environment::Right));
    }

    #[test]
    fn test_serializes_with_environment_keys() {
        let mut unit = TableMirror::new("sales", "sales", "orders");
        unit.table_mut(Environment::Left).exists = true;
        let json = serde_json::to_string(&unit).unwrap();
        assert!(json.contains("\"LEFT\""));
        let back: TableMirror = serde_json::from_str(&json).unwrap();
        assert!(back.table(Environment::Left).unwrap().exists);
    }
}
