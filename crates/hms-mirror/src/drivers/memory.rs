//! Executor that records statements in memory, with optional failure injection.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::core::{Environment, Statement, StatementExecutor};
use crate::error::{MirrorError, Result};

#[derive(Default)]
pub struct MemoryExecutor {
    executed: Mutex<Vec<(Environment, Statement)>>,
    fail_on: Option<String>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement whose SQL contains `pattern`.
    pub fn failing_on(pattern: impl Into<String>) -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            fail_on: Some(pattern.into()),
        }
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<(Environment, Statement)> {
        self.executed
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// SQL text executed on one environment.
    pub fn sql_for(&self, environment: Environment) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|(env, _)| *env == environment)
            .map(|(_, s)| s.sql)
            .collect()
    }
}

#[async_trait]
impl StatementExecutor for MemoryExecutor {
    async fn execute(&self, environment: Environment, statement: &Statement) -> Result<()> {
        if let Some(pattern) = &self.fail_on {
            if statement.sql.contains(pattern.as_str()) {
                return Err(MirrorError::execution(
                    environment,
                    format!("{} failed: {}", statement.description, statement.sql),
                ));
            }
        }
        self.executed
            .lock()
            .map_err(|e| MirrorError::State(format!("Executor log poisoned: {}", e)))?
            .push((environment, statement.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fails() {
        let executor = MemoryExecutor::failing_on("DROP");
        executor
            .execute(Environment::Right, &Statement::new("Use", "USE sales"))
            .await
            .unwrap();
        let err = executor
            .execute(Environment::Right, &Statement::new("Drop", "DROP TABLE t"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("RIGHT"));
        assert_eq!(executor.sql_for(Environment::Right), vec!["USE sales"]);
        assert!(executor.sql_for(Environment::Left).is_empty());
    }
}
