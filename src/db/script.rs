use anyhow::{Context, Result};
use sqlx::PgConnection;
use std::path::Path;
use tracing::debug;

use super::error_context::SqlErrorContext;

/// A SQL script run against a probe database before its checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitScript {
    /// Display name used in logs and error messages
    pub name: String,
    pub sql: String,
}

impl InitScript {
    /// Script compiled into the binary
    pub fn builtin(name: &str, sql: &str) -> Self {
        Self {
            name: name.to_string(),
            sql: sql.to_string(),
        }
    }

    /// Script read from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let sql = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SQL script {}", path.display()))?;

        Ok(Self {
            name: path.display().to_string(),
            sql,
        })
    }

    /// Execute the whole script in one round trip
    ///
    /// Uses the simple query protocol, so scripts may contain any number of
    /// statements. Empty scripts are skipped.
    pub async fn execute(&self, conn: &mut PgConnection) -> Result<()> {
        if self.sql.trim().is_empty() {
            debug!("Skipping empty script {}", self.name);
            return Ok(());
        }

        match sqlx::raw_sql(&self.sql).execute(&mut *conn).await {
            Ok(result) => {
                debug!(
                    "Executed {} ({} rows affected)",
                    self.name,
                    result.rows_affected()
                );
                Ok(())
            }
            Err(e) => {
                let ctx = SqlErrorContext::from_sqlx_error(&e, &self.sql);
                Err(anyhow::anyhow!("{}", ctx.format(&self.name, &self.sql)))
            }
        }
    }
}
