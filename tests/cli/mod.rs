/// CLI integration tests that exercise the actual binary with assert_cmd
///
/// ```rust
/// helper.command()
///     .args(["list"])
///     .assert()
///     .success()
///     .stdout(predicate::str::contains("hstore"));
/// ```
pub mod config_commands;
pub mod error_handling;
pub mod list;
