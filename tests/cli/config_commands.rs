use crate::helpers::cli::with_cli_helper;
use anyhow::Result;
use predicates::prelude::*;

#[tokio::test]
async fn test_config_show_defaults() -> Result<()> {
    with_cli_helper(async |helper| {
        helper
            .command()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("postgres:10.14"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_config_show_json_reflects_file() -> Result<()> {
    with_cli_helper(async |helper| {
        helper.write_config("container:\n  version: \"16\"\n  reuse: true\n")?;

        let output = helper
            .command()
            .args(["config", "show", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let json: serde_json::Value = serde_json::from_slice(&output)?;
        assert_eq!(json["container"]["version"], "16");
        assert_eq!(json["container"]["reuse"], true);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_config_validate_success() -> Result<()> {
    with_cli_helper(async |helper| {
        helper.write_file("sql/setup.sql", "SET client_min_messages = warning;")?;
        helper.write_config("probes:\n  setup_scripts: [sql/setup.sql]\n")?;

        helper
            .command()
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("is valid"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_config_validate_without_file_fails() -> Result<()> {
    with_cli_helper(async |helper| {
        helper
            .command()
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_keep_on_failure_env_false_is_respected() -> Result<()> {
    with_cli_helper(async |helper| {
        for value in ["false", "0", "no"] {
            let output = helper
                .command()
                .env("PGPROBE_KEEP_CONTAINER_ON_FAILURE", value)
                .args(["config", "show", "--format", "json"])
                .assert()
                .success()
                .get_output()
                .stdout
                .clone();

            let json: serde_json::Value = serde_json::from_slice(&output)?;
            assert_eq!(json["container"]["keep_on_failure"], false, "{value}");
        }

        let output = helper
            .command()
            .env("PGPROBE_KEEP_CONTAINER_ON_FAILURE", "1")
            .args(["config", "show", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let json: serde_json::Value = serde_json::from_slice(&output)?;
        assert_eq!(json["container"]["keep_on_failure"], true);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_keep_on_failure_env_rejects_garbage() -> Result<()> {
    with_cli_helper(async |helper| {
        helper
            .command()
            .env("PGPROBE_KEEP_CONTAINER_ON_FAILURE", "maybe")
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("PGPROBE_KEEP_CONTAINER_ON_FAILURE"));

        Ok(())
    })
    .await
}
