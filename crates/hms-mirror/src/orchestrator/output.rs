//! Run output: SQL scripts, the markdown report and distcp plans per database.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::core::{DatabaseMirror, Environment, PhaseState, Statement, TableMirror};
use crate::error::Result;
use crate::translator::{build_distcp_list, render_distcp};
use tracing::debug;

const PROGRESS_WIDTH: usize = 20;

/// Units whose statements belong in the scripts.
fn planned(db: &DatabaseMirror) -> impl Iterator<Item = &TableMirror> {
    db.tables.values().filter(|t| {
        matches!(
            t.phase_state,
            PhaseState::Success | PhaseState::RetrySkippedPastSuccess
        )
    })
}

fn push_statements(out: &mut String, statements: &[Statement]) {
    for statement in statements {
        let _ = writeln!(out, "-- {}\n{};\n", statement.description, statement.sql);
    }
}

/// `<db>_<ENV>_execute.sql`: database statements, then each planned table's statements.
pub fn execute_script(db: &DatabaseMirror, environment: Environment) -> String {
    let mut out = format!("-- EXECUTION script for {} on {} cluster\n\n", db.name, environment);
    push_statements(&mut out, db.statements(environment));
    for unit in planned(db) {
        if let Some(table) = unit.table(environment).filter(|t| !t.sql.is_empty()) {
            let _ = writeln!(out, "-- Table: {}\n", unit.name);
            push_statements(&mut out, &table.sql);
        }
    }
    out
}

/// `<db>_<ENV>_CleanUp_execute.sql`.
pub fn cleanup_script(db: &DatabaseMirror, environment: Environment) -> String {
    let mut out = format!("-- CLEANUP script for {} on {} cluster\n\n", db.name, environment);
    for unit in planned(db) {
        if let Some(table) = unit.table(environment).filter(|t| !t.cleanup_sql.is_empty()) {
            let _ = writeln!(out, "-- Table: {}\n", unit.name);
            push_statements(&mut out, &table.cleanup_sql);
        }
    }
    out
}

/// `<db>_hms-mirror.md`.
pub fn report(db: &DatabaseMirror, config: &Config, run_id: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# HMS-Mirror for: {}\n", db.name);
    let _ = writeln!(out, "| Run | Strategy | Target Database | Dry Run |");
    let _ = writeln!(out, "|:---|:---|:---|:---|");
    let _ = writeln!(
        out,
        "| {} | {} | {} | {} |\n",
        run_id, config.data_strategy, db.resolved_name, !config.execute
    );

    let _ = writeln!(out, "## Database\n");
    for (environment, properties) in &db.properties {
        let _ = writeln!(out, "### {}\n", environment);
        let _ = writeln!(out, "| Property | Value |\n|:---|:---|");
        for (key, value) in properties {
            let _ = writeln!(out, "| {} | {} |", key, value);
        }
        out.push('\n');
    }
    for (environment, issues) in db.issues.iter().filter(|(_, i)| !i.is_empty()) {
        let _ = writeln!(out, "**{} issues**\n", environment);
        for issue in issues {
            let _ = writeln!(out, "- {}", issue);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Tables\n");
    let _ = writeln!(
        out,
        "| Table | Strategy | Phase | Progress | LEFT | RIGHT | Issues |\n|:---|:---|:---|:---|:---|:---|:---|"
    );
    for unit in db.tables.values() {
        let disposition = |environment: Environment| {
            unit.table(environment)
                .map(|t| t.create_strategy.to_string())
                .unwrap_or_default()
        };
        let issues: usize = unit.environments.values().map(|t| t.issues.len()).sum();
        let _ = writeln!(
            out,
            "| {} | {} | {} | `{}` | {} | {} | {} |",
            unit.name,
            unit.strategy,
            unit.phase_state,
            unit.progress_indicator(PROGRESS_WIDTH),
            disposition(Environment::Left),
            disposition(Environment::Right),
            issues
        );
    }
    out.push('\n');

    for unit in db.tables.values() {
        let _ = writeln!(out, "### {}\n", unit.name);
        if unit.remapped {
            let _ = writeln!(out, "_Location re-mapped by the global location map._\n");
        }
        for (environment, table) in &unit.environments {
            let _ = writeln!(
                out,
                "**{}** `{}` exists: {} create: {}\n",
                environment, table.name, table.exists, table.create_strategy
            );
            for issue in &table.issues {
                let _ = writeln!(out, "- {}", issue);
            }
            for action in &table.actions {
                let _ = writeln!(out, "- _action_: {}", action);
            }
            if !table.issues.is_empty() || !table.actions.is_empty() {
                out.push('\n');
            }
        }
        let _ = writeln!(out, "| Step | Detail | Elapsed (ms) |\n|:---|:---|---:|");
        for step in &unit.steps {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                step.mark,
                step.description.as_deref().unwrap_or(""),
                step.elapsed_ms
            );
        }
        out.push('\n');
    }

    if !db.filtered_out.is_empty() {
        let _ = writeln!(out, "## Skipped\n");
        let _ = writeln!(out, "| Table | Reason |\n|:---|:---|");
        for (table, reason) in &db.filtered_out {
            let _ = writeln!(out, "| {} | {} |", table, reason);
        }
    }
    out
}

fn write(directory: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = directory.join(name);
    debug!("Writing {}", path.display());
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Write the scripts and the report of one database.
pub fn write_database(
    directory: &Path,
    db: &DatabaseMirror,
    config: &Config,
    run_id: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(directory)?;
    let mut files = Vec::new();
    for environment in [Environment::Left, Environment::Right] {
        files.push(write(
            directory,
            &format!("{}_{}_execute.sql", db.name, environment),
            &execute_script(db, environment),
        )?);
        files.push(write(
            directory,
            &format!("{}_{}_CleanUp_execute.sql", db.name, environment),
            &cleanup_script(db, environment),
        )?);
    }
    files.push(write(
        directory,
        &format!("{}_hms-mirror.md", db.name),
        &report(db, config, run_id),
    )?);
    Ok(files)
}

/// Write the distcp workbook, source lists and script for each environment with translations.
pub fn write_distcp(directory: &Path, db: &DatabaseMirror, config: &Config) -> Result<Vec<PathBuf>> {
    let translations = db.translations();
    let mut files = Vec::new();
    if translations.is_empty() {
        return Ok(files);
    }
    std::fs::create_dir_all(directory)?;
    for environment in [Environment::Left, Environment::Right] {
        let plan = build_distcp_list(
            &translations,
            &db.resolved_name,
            environment,
            config.translator.consolidation_level,
        );
        if plan.is_empty() {
            continue;
        }
        for (name, content) in render_distcp(&db.name, environment, &plan) {
            files.push(write(directory, &name, &content)?);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataStrategy;
    use crate::translator::LocationTranslation;

    fn database() -> DatabaseMirror {
        let mut db = DatabaseMirror::new("sales", "sales");
        db.sql.insert(
            Environment::Right,
            vec![Statement::new("Create Database", "CREATE DATABASE IF NOT EXISTS sales")],
        );

        let orders = db.add_table("orders");
        orders.strategy = DataStrategy::SchemaOnly;
        orders.set_phase_state(PhaseState::Started).unwrap();
        let right = orders.table_mut(Environment::Right);
        right.add_sql("Use", "USE sales");
        right.add_sql("Create Table", "CREATE EXTERNAL TABLE `orders`(\n  `id` string)");
        right.add_cleanup_sql("Drop Table", "DROP TABLE IF EXISTS orders_shadow");
        right.add_issue("Schema will be created");
        orders.set_phase_state(PhaseState::Success).unwrap();

        let broken = db.add_table("broken");
        broken.set_phase_state(PhaseState::Started).unwrap();
        broken.table_mut(Environment::Right).add_sql("Use", "USE sales");
        broken.set_phase_state(PhaseState::Error).unwrap();

        db.filtered_out
            .insert("v_orders".into(), "This is a VIEW and VIEW processing wasn't selected.".into());
        db
    }

    #[test]
    fn test_execute_script_skips_failed_units() {
        let script = execute_script(&database(), Environment::Right);
        assert!(script.starts_with("-- EXECUTION script for sales on RIGHT cluster"));
        assert!(script.contains("-- Create Database\nCREATE DATABASE IF NOT EXISTS sales;\n"));
        assert!(script.contains("-- Table: orders"));
        assert!(!script.contains("-- Table: broken"));
        assert_eq!(script.matches("USE sales;").count(), 1);
    }

    #[test]
    fn test_cleanup_script() {
        let script = cleanup_script(&database(), Environment::Right);
        assert!(script.contains("DROP TABLE IF EXISTS orders_shadow;"));
        assert!(!cleanup_script(&database(), Environment::Left).contains("-- Table:"));
    }

    #[test]
    fn test_report_lists_tables_and_skips() {
        let report = report(&database(), &Config::default(), "run-1");
        assert!(report.starts_with("# HMS-Mirror for: sales"));
        assert!(report.contains("| run-1 | SCHEMA_ONLY | sales | true |"));
        assert!(report.contains("| orders | SCHEMA_ONLY | SUCCESS |"));
        assert!(report.contains("| broken |"));
        assert!(report.contains("- Schema will be created"));
        assert!(report.contains("| v_orders | This is a VIEW"));
    }

    #[test]
    fn test_write_database_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_database(dir.path(), &database(), &Config::default(), "run-1").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "sales_LEFT_execute.sql",
                "sales_LEFT_CleanUp_execute.sql",
                "sales_RIGHT_execute.sql",
                "sales_RIGHT_CleanUp_execute.sql",
                "sales_hms-mirror.md",
            ]
        );
        assert!(files.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_write_distcp_only_with_translations() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = database();
        assert!(write_distcp(dir.path(), &db, &Config::default()).unwrap().is_empty());

        let unit = db.add_table("orders");
        unit.record_translation(LocationTranslation {
            database: "sales".into(),
            environment: Environment::Right,
            original: "hdfs://LEFT/data/sales/orders".into(),
            translated: "hdfs://RIGHT/data/sales/orders".into(),
            level: 0,
        });
        let files = write_distcp(dir.path(), &db, &Config::default()).unwrap();
        assert_eq!(files.len(), 3);
        let source = std::fs::read_to_string(dir.path().join("sales_RIGHT_1_distcp_source.txt")).unwrap();
        assert_eq!(source, "hdfs://LEFT/data/sales/orders\n");
    }
}
