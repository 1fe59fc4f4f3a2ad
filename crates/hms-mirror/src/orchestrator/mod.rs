//! Run orchestrator - discovery, per-table planning, execution and output.

mod output;

pub use output::{cleanup_script, execute_script, report, write_database, write_distcp};

use crate::config::{Config, TableFilter};
use crate::core::{
    DatabaseMirror, Environment, MetadataFetcher, PhaseState, StatementExecutor, TableDefinition,
    TableMirror,
};
use crate::error::{MirrorError, Result};
use crate::state::{RunState, RunStatus};
use crate::strategy::{self, PlanContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const FILTERED_OUT: &str = "Table filtered out by the include/exclude table filter.";

/// Run orchestrator.
pub struct Orchestrator {
    config: Arc<Config>,
    fetcher: Arc<dyn MetadataFetcher>,
    executor: Option<Arc<dyn StatementExecutor>>,
    state_file: Option<PathBuf>,
    state: Option<RunState>,
    output_dir: Option<PathBuf>,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: `completed`, `completed_with_errors` or `cancelled`.
    pub status: String,

    pub data_strategy: String,

    /// True when statements were planned but not executed.
    pub dry_run: bool,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    pub databases_total: usize,

    /// Units planned in this run, including carried-over ones.
    pub tables_total: usize,

    pub tables_success: usize,

    pub tables_failed: usize,

    /// Units that succeeded in a previous attempt and were not replanned.
    pub tables_carried_over: usize,

    /// Tables left out before planning (filter, table type).
    pub tables_skipped: usize,

    /// `db.table` names that ended in ERROR.
    pub failed_tables: Vec<String>,

    /// Files written to the output directory.
    pub output_files: Vec<String>,

    /// Planned databases. Not part of the JSON result.
    #[serde(skip)]
    pub databases: Vec<DatabaseMirror>,
}

/// What the worker made of one listed table.
enum Outcome {
    Skipped(String),
    Planned(TableMirror),
}

/// Everything a worker task needs to take one table from metadata to execution.
#[derive(Clone)]
struct TableWorker {
    config: Arc<Config>,
    fetcher: Arc<dyn MetadataFetcher>,
    executor: Option<Arc<dyn StatementExecutor>>,
    ctx: PlanContext,
    database: String,
    resolved_database: String,
    blocked: Option<String>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: Config, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            executor: None,
            state_file: None,
            state: None,
            output_dir: None,
        }
    }

    /// Executor used when `execute` is set.
    pub fn with_executor(mut self, executor: Arc<dyn StatementExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the state file path for resume capability.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Directory receiving scripts, reports and distcp plans.
    pub fn with_output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load existing state for resume.
    pub fn resume(mut self) -> Result<Self> {
        if let Some(ref path) = self.state_file {
            if path.exists() {
                let state = RunState::load(path)?;
                state.validate_config(&self.config.hash())?;
                info!("Resuming run {} from state file: {:?}", state.run_id, path);
                self.state = Some(state);
            }
        }
        Ok(self)
    }

    /// Run the migration plan.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<MirrorResult> {
        let started_at = Utc::now();

        info!("Phase 1: Validating configuration");
        self.config.validate()?;
        if self.config.databases.is_empty() {
            return Err(MirrorError::Config("No databases to migrate".into()));
        }
        let filter = TableFilter::new(&self.config.filter)?;

        let mut state = self
            .state
            .take()
            .unwrap_or_else(|| RunState::new(uuid::Uuid::new_v4().to_string(), self.config.hash()));
        state.status = RunStatus::Running;
        state.completed_at = None;
        let ctx = PlanContext::new(
            state.started_at.format("%Y%m%d_%H%M%S").to_string(),
            state.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        info!(
            "Starting run {}: {} over {} database(s) ({})",
            state.run_id,
            self.config.data_strategy,
            self.config.databases.len(),
            if self.config.execute { "execute" } else { "dry run" }
        );

        let databases = match self.plan_databases(&filter, &ctx, &mut state, &cancel).await {
            Ok(databases) => databases,
            Err(e) => {
                error!("Run {} failed: {}", state.run_id, e);
                state.mark_failed();
                self.save_state(&mut state)?;
                return Err(e);
            }
        };

        info!("Phase 5: Writing output");
        let mut output_files = Vec::new();
        if let Some(dir) = &self.output_dir {
            for db in &databases {
                output_files.extend(write_database(dir, db, &self.config, &state.run_id)?);
                output_files.extend(write_distcp(dir, db, &self.config)?);
            }
        }
        if let Some(executor) = self.active_executor() {
            executor.close().await?;
        }

        let completed_at = Utc::now();
        let units = || databases.iter().flat_map(|d| d.tables.values());
        let count = |phase: PhaseState| units().filter(|u| u.phase_state == phase).count();
        let failed_tables: Vec<String> = units()
            .filter(|u| u.phase_state == PhaseState::Error)
            .map(TableMirror::qualified_name)
            .collect();

        let status = if cancel.is_cancelled() {
            state.mark_cancelled();
            "cancelled"
        } else if !failed_tables.is_empty() {
            state.mark_completed();
            "completed_with_errors"
        } else {
            state.mark_completed();
            "completed"
        };
        self.save_state(&mut state)?;

        let mut result = MirrorResult {
            run_id: state.run_id.clone(),
            status: status.to_string(),
            data_strategy: self.config.data_strategy.to_string(),
            dry_run: !self.config.execute,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            started_at,
            completed_at,
            databases_total: databases.len(),
            tables_total: units().count(),
            tables_success: count(PhaseState::Success),
            tables_failed: failed_tables.len(),
            tables_carried_over: count(PhaseState::RetrySkippedPastSuccess),
            tables_skipped: databases.iter().map(|d| d.filtered_out.len()).sum(),
            failed_tables,
            output_files: Vec::new(),
            databases: Vec::new(),
        };

        if let Some(dir) = &self.output_dir {
            let path = dir.join("run-result.json");
            output_files.push(path.clone());
            result.output_files = output_files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            std::fs::write(&path, result.to_json()?)?;
        }

        info!(
            "Run {}: {} tables ({} success, {} failed, {} carried over, {} skipped) in {:.1}s",
            result.status,
            result.tables_total,
            result.tables_success,
            result.tables_failed,
            result.tables_carried_over,
            result.tables_skipped,
            result.duration_seconds
        );
        result.databases = databases;
        Ok(result)
    }

    fn active_executor(&self) -> Option<&Arc<dyn StatementExecutor>> {
        self.executor.as_ref().filter(|_| self.config.execute)
    }

    async fn plan_databases(
        &self,
        filter: &TableFilter,
        ctx: &PlanContext,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<Vec<DatabaseMirror>> {
        let mut databases = Vec::new();
        for name in &self.config.databases {
            if cancel.is_cancelled() {
                info!("Cancellation requested, not starting database {}", name);
                break;
            }

            info!("Phase 2: Discovering database {}", name);
            let (mut db, tables) = self.discover(name, filter).await;
            state.record_database(&db);

            info!("Phase 3: Database statements for {}", db.resolved_name);
            let blocked = self.execute_database(&mut db).await;

            info!(
                "Phase 4: Planning {} table(s) in {} ({} skipped)",
                tables.len(),
                name,
                db.filtered_out.len()
            );
            self.plan_tables(&mut db, tables, ctx, blocked, state, cancel)
                .await?;
            databases.push(db);
        }
        Ok(databases)
    }

    /// Describe the database on both sides, list and filter its tables and plan the database SQL.
    async fn discover(&self, name: &str, filter: &TableFilter) -> (DatabaseMirror, Vec<String>) {
        let config = &self.config;
        let mut db = DatabaseMirror::new(name, config.resolved_database(name));

        match self.fetcher.describe_database(Environment::Left, name).await {
            Ok(properties) => {
                db.properties.insert(Environment::Left, properties);
            }
            Err(e) => {
                let issue = fetch_issue(config, &e, || format!("Database {} does not exist on LEFT", name));
                warn!("{}: {}", name, issue);
                db.add_issue(Environment::Left, issue);
                return (db, Vec::new());
            }
        }

        if !config.data_strategy.is_left_only() {
            let resolved = db.resolved_name.clone();
            match self.fetcher.describe_database(Environment::Right, &resolved).await {
                Ok(properties) => {
                    db.properties.insert(Environment::Right, properties);
                }
                Err(e) if config.is_transient_failure(&e.to_string()) => {
                    warn!("{}: RIGHT database metadata unavailable: {}", resolved, e);
                    db.add_issue(
                        Environment::Right,
                        format!("Database metadata could not be fetched: {}", e),
                    );
                }
                Err(e) => debug!("{}: not found on RIGHT ({})", resolved, e),
            }
        }

        let mut tables = match self.fetcher.list_tables(Environment::Left, name).await {
            Ok(tables) => tables,
            Err(e) => {
                warn!("{}: could not list tables: {}", name, e);
                db.add_issue(Environment::Left, format!("Tables could not be listed: {}", e));
                Vec::new()
            }
        };
        if config.sync && !config.data_strategy.is_left_only() {
            // RIGHT-only tables need a unit so sync can drop them.
            let resolved = db.resolved_name.clone();
            match self.fetcher.list_tables(Environment::Right, &resolved).await {
                Ok(right) => tables.extend(right),
                Err(e) if config.is_transient_failure(&e.to_string()) => {
                    warn!("{}: could not list RIGHT tables: {}", resolved, e);
                    db.add_issue(
                        Environment::Right,
                        format!("Tables could not be listed: {}", e),
                    );
                }
                Err(e) => debug!("{}: no tables on RIGHT ({})", resolved, e),
            }
        }
        tables.sort();
        tables.dedup();
        tables.retain(|table| {
            let accepted = filter.accepts(table);
            if !accepted {
                db.filtered_out.insert(table.clone(), FILTERED_OUT.to_string());
            }
            accepted
        });

        db.build_statements(config);
        (db, tables)
    }

    /// Run the database statements. Returns the failure that blocks table execution, if any.
    async fn execute_database(&self, db: &mut DatabaseMirror) -> Option<String> {
        let executor = self.active_executor()?.clone();
        for environment in [Environment::Left, Environment::Right] {
            for statement in db.statements(environment).to_vec() {
                if let Err(e) = executor.execute(environment, &statement).await {
                    error!("{}: {} failed: {}", db.name, statement.description, e);
                    db.add_issue(environment, e.to_string());
                    return Some(e.to_string());
                }
            }
        }
        None
    }

    /// Plan every table of a database on the worker pool, saving state after each one.
    async fn plan_tables(
        &self,
        db: &mut DatabaseMirror,
        tables: Vec<String>,
        ctx: &PlanContext,
        blocked: Option<String>,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (location, managed) = db.target_locations(&self.config);
        let worker = TableWorker {
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            executor: self.active_executor().cloned(),
            ctx: ctx.for_database(location.as_deref(), managed.as_deref()),
            database: db.name.clone(),
            resolved_database: db.resolved_name.clone(),
            blocked,
            cancel: cancel.clone(),
        };

        let concurrency = self.config.transfer.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::new();

        for table in tables {
            if cancel.is_cancelled() {
                info!("Cancellation requested, not starting more tables in {}", db.name);
                break;
            }
            if let Some(unit) = state.carried_over(&db.name, &table) {
                info!("{}: succeeded in a previous attempt, not replanned", unit.qualified_name());
                state.record_unit(&unit);
                db.tables.insert(table, unit);
                continue;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| MirrorError::Invariant(format!("Worker pool closed: {}", e)))?;
            let worker = worker.clone();
            let name = table.clone();
            let handle = tokio::spawn(async move {
                let outcome = worker.process(&name).await;
                drop(permit);
                outcome
            });
            handles.push((table, handle));
        }

        for (table, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    error!("{}.{}: failed - {}", db.name, table, e);
                    Outcome::Planned(worker.failed(&table, e.to_string())?)
                }
                Err(e) => {
                    error!("{}.{}: task panicked - {}", db.name, table, e);
                    Outcome::Planned(worker.failed(&table, format!("Task panicked: {}", e))?)
                }
            };
            match outcome {
                Outcome::Skipped(reason) => {
                    info!("{}.{}: skipped, {}", db.name, table, reason);
                    db.filtered_out.insert(table, reason);
                }
                Outcome::Planned(unit) => {
                    state.record_unit(&unit);
                    db.tables.insert(table, unit);
                }
            }
            state.record_database(db);
            self.save_state(state)?;
        }
        Ok(())
    }

    /// Save state to file.
    fn save_state(&self, state: &mut RunState) -> Result<()> {
        if let Some(ref path) = self.state_file {
            state.save(path)?;
        }
        Ok(())
    }
}

impl TableWorker {
    async fn process(&self, table: &str) -> Result<Outcome> {
        let config = self.config.as_ref();
        let mut unit = TableMirror::new(&self.database, &self.resolved_database, table);

        unit.next_phase("Fetching metadata");
        let left_complete = self
            .capture(&mut unit, Environment::Left, &self.database)
            .await;
        if let Some(left) = unit.table(Environment::Left).filter(|t| t.exists) {
            if let Some(reason) = strategy::exclusion_reason(config, left) {
                return Ok(Outcome::Skipped(reason));
            }
        }
        unit.set_phase_state(PhaseState::Started)?;

        let right_complete = if config.data_strategy.is_left_only() {
            true
        } else {
            let resolved = self.resolved_database.clone();
            self.capture(&mut unit, Environment::Right, &resolved).await
        };
        if !(left_complete && right_complete) {
            unit.processing_done();
            unit.set_phase_state(PhaseState::Error)?;
            return Ok(Outcome::Planned(unit));
        }

        let planned = match strategy::plan_table(config, &self.ctx, &mut unit) {
            Ok(planned) => planned,
            Err(e) => {
                warn!("{}: {}", unit.qualified_name(), e);
                unit.add_issue(Environment::Left, e.to_string());
                false
            }
        };
        log_issues(&unit);
        if !planned {
            unit.processing_done();
            unit.set_phase_state(PhaseState::Error)?;
            return Ok(Outcome::Planned(unit));
        }

        if let Some(executor) = &self.executor {
            unit.next_phase("Executing");
            let executed = match &self.blocked {
                Some(reason) => {
                    unit.add_issue(
                        Environment::Right,
                        format!("Database statements failed, table statements were not run: {}", reason),
                    );
                    false
                }
                None => match self.execute(executor.as_ref(), &mut unit).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!("{}: execution failed - {}", unit.qualified_name(), e);
                        unit.add_issue(Environment::Left, e.to_string());
                        false
                    }
                },
            };
            if !executed {
                unit.processing_done();
                unit.set_phase_state(PhaseState::Error)?;
                return Ok(Outcome::Planned(unit));
            }
        }

        unit.processing_done();
        unit.set_phase_state(PhaseState::Success)?;
        debug!("{}: {}", unit.qualified_name(), unit.progress_indicator(20));
        Ok(Outcome::Planned(unit))
    }

    /// Capture one environment's definition. Returns false when the fetch failed transiently.
    async fn capture(&self, unit: &mut TableMirror, environment: Environment, database: &str) -> bool {
        let config = self.config.as_ref();
        let fetcher = self.fetcher.as_ref();
        let name = unit.name.clone();
        let mut complete = true;

        let mut definition = match fetcher.get_create_statement(environment, database, &name).await {
            Ok(lines) if !lines.is_empty() => TableDefinition::existing(&name, lines),
            Ok(_) => TableDefinition::new(&name),
            Err(e) if config.is_transient_failure(&e.to_string()) => {
                warn!("{}.{}: {} metadata unavailable: {}", database, name, environment, e);
                let mut definition = TableDefinition::new(&name);
                definition.add_issue(format!("Metadata could not be fetched: {}", e));
                complete = false;
                definition
            }
            Err(e) => {
                debug!("{}.{}: not found on {} ({})", database, name, environment, e);
                TableDefinition::new(&name)
            }
        };

        if definition.exists && definition.is_partitioned() {
            match fetcher.list_partitions(environment, database, &name).await {
                Ok(partitions) => definition.partitions = partitions,
                Err(e) if config.is_transient_failure(&e.to_string()) => {
                    warn!("{}.{}: {} partitions unavailable: {}", database, name, environment, e);
                    definition.add_issue(format!("Partitions could not be fetched: {}", e));
                    complete = false;
                }
                Err(e) => debug!("{}.{}: no partitions on {} ({})", database, name, environment, e),
            }
        }
        if definition.exists {
            match fetcher.table_owner(environment, database, &name).await {
                Ok(owner) => definition.owner = owner,
                Err(e) => debug!("{}.{}: owner unavailable on {} ({})", database, name, environment, e),
            }
        }

        unit.environments.insert(environment, definition);
        unit.add_step("fetch", Some(environment.to_string()));
        complete
    }

    /// Run a unit's statements, LEFT before RIGHT.
    async fn execute(&self, executor: &dyn StatementExecutor, unit: &mut TableMirror) -> Result<()> {
        for environment in [Environment::Left, Environment::Right] {
            let statements = unit
                .table(environment)
                .map(|t| t.sql.clone())
                .unwrap_or_default();
            if statements.is_empty() {
                continue;
            }
            for statement in &statements {
                if self.cancel.is_cancelled() {
                    return Err(MirrorError::Cancelled);
                }
                executor.execute(environment, statement).await?;
            }
            unit.add_step(
                "execute",
                Some(format!("{} ({} statements)", environment, statements.len())),
            );
        }
        Ok(())
    }

    /// Unit recording a failure that happened outside the planner.
    fn failed(&self, table: &str, message: String) -> Result<TableMirror> {
        let mut unit = TableMirror::new(&self.database, &self.resolved_database, table);
        unit.set_phase_state(PhaseState::Started)?;
        unit.add_issue(Environment::Left, message);
        unit.set_phase_state(PhaseState::Error)?;
        Ok(unit)
    }
}

fn fetch_issue(config: &Config, error: &MirrorError, absent: impl FnOnce() -> String) -> String {
    let message = error.to_string();
    if config.is_transient_failure(&message) {
        format!("Metadata could not be fetched: {}", message)
    } else {
        absent()
    }
}

fn log_issues(unit: &TableMirror) {
    for (environment, table) in &unit.environments {
        for issue in &table.issues {
            info!("{} [{}]: {}", unit.qualified_name(), environment, issue);
        }
    }
}

impl MirrorResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
