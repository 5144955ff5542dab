use anyhow::Result;
use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A temporary project directory to run the pgprobe binary in
pub struct CliTestHelper {
    pub temp_dir: TempDir,
    pub project_root: PathBuf,
}

impl CliTestHelper {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let project_root = temp_dir.path().to_path_buf();

        Self {
            temp_dir,
            project_root,
        }
    }

    /// Create a command for the pgprobe binary running in the project root
    ///
    /// Database and debugging variables from the outer environment are
    /// cleared so tests see only what they configure.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("pgprobe").unwrap();
        cmd.current_dir(&self.project_root)
            .env_remove("PGPROBE_DATABASE_URL")
            .env_remove("PGPROBE_KEEP_CONTAINER_ON_FAILURE")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn write_config(&self, content: &str) -> Result<()> {
        fs::write(self.project_root.join("pgprobe.yaml"), content)?;
        Ok(())
    }

    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.project_root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for CliTestHelper {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn with_cli_helper<F, R>(test_fn: F) -> R
where
    F: std::ops::AsyncFnOnce(&CliTestHelper) -> R,
{
    let helper = CliTestHelper::new();
    test_fn(&helper).await
}
