//! Executor that appends statements to one script file per cluster.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::core::{Environment, Statement, StatementExecutor};
use crate::error::{MirrorError, Result};

/// Collects executed statements and writes `<prefix>_<ENV>_executed.sql` on close.
pub struct ScriptExecutor {
    directory: PathBuf,
    prefix: String,
    buffers: Mutex<BTreeMap<Environment, String>>,
}

impl ScriptExecutor {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            buffers: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn script_path(&self, environment: Environment) -> PathBuf {
        self.directory
            .join(format!("{}_{}_executed.sql", self.prefix, environment))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<Environment, String>>> {
        self.buffers
            .lock()
            .map_err(|e| MirrorError::State(format!("Script buffer poisoned: {}", e)))
    }
}

#[async_trait]
impl StatementExecutor for ScriptExecutor {
    async fn execute(&self, environment: Environment, statement: &Statement) -> Result<()> {
        if !environment.is_cluster() {
            return Err(MirrorError::execution(
                environment,
                "statements can only run on LEFT or RIGHT",
            ));
        }
        let mut buffers = self.lock()?;
        let buffer = buffers.entry(environment).or_default();
        buffer.push_str(&format!("-- {}\n{};\n", statement.description, statement.sql));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let buffers = std::mem::take(&mut *self.lock()?);
        tokio::fs::create_dir_all(&self.directory).await?;
        for (environment, content) in buffers {
            let path = self.script_path(environment);
            debug!("Writing {} statements to {}", environment, path.display());
            write_appending(&path, &content).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "script"
    }
}

async fn write_appending(path: &Path, content: &str) -> Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_per_environment() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ScriptExecutor::new(dir.path(), "sales");
        executor
            .execute(Environment::Right, &Statement::new("Create Table", "CREATE TABLE t (a int)"))
            .await
            .unwrap();
        executor
            .execute(Environment::Right, &Statement::new("Use", "USE sales"))
            .await
            .unwrap();
        executor
            .execute(Environment::Left, &Statement::new("Export", "EXPORT TABLE t TO '/x'"))
            .await
            .unwrap();
        executor.close().await.unwrap();

        let right = std::fs::read_to_string(executor.script_path(Environment::Right)).unwrap();
        assert_eq!(right, "-- Create Table\nCREATE TABLE t (a int);\n-- Use\nUSE sales;\n");
        let left = std::fs::read_to_string(dir.path().join("sales_LEFT_executed.sql")).unwrap();
        assert!(left.contains("EXPORT TABLE t"));
    }

    #[tokio::test]
    async fn test_rejects_planning_slots() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ScriptExecutor::new(dir.path(), "sales");
        let result = executor
            .execute(Environment::Shadow, &Statement::new("Create Table", "CREATE TABLE s (a int)"))
            .await;
        assert!(matches!(result, Err(MirrorError::Execution { .. })));
    }
}
