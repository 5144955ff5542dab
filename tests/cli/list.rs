use crate::helpers::cli::with_cli_helper;
use anyhow::Result;
use predicates::prelude::*;

#[tokio::test]
async fn test_list_builtin_probes() -> Result<()> {
    with_cli_helper(async |helper| {
        helper
            .command()
            .arg("list")
            .assert()
            .success()
            .stdout(
                predicate::str::contains("simple")
                    .and(predicate::str::contains("jsonb"))
                    .and(predicate::str::contains("tsvector"))
                    .and(predicate::str::contains("ltree"))
                    .and(predicate::str::contains("hstore")),
            );

        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_list_json_marks_selection() -> Result<()> {
    with_cli_helper(async |helper| {
        let output = helper
            .command()
            .args(["list", "--format", "json", "--exclude", "h*"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let json: serde_json::Value = serde_json::from_slice(&output)?;
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 5);

        let hstore = entries.iter().find(|e| e["name"] == "hstore").unwrap();
        assert_eq!(hstore["selected"], false);
        let jsonb = entries.iter().find(|e| e["name"] == "jsonb").unwrap();
        assert_eq!(jsonb["selected"], true);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn test_list_includes_custom_probes() -> Result<()> {
    with_cli_helper(async |helper| {
        helper.write_config(
            r#"
probes:
  custom:
    - name: arrays
      description: array containment operators
      checks:
        - query: SELECT ARRAY[1,2,3] @> ARRAY[2]
          expect:
            kind: truthy
            value: true
"#,
        )?;

        helper
            .command()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("arrays").and(predicate::str::contains(
                "array containment operators",
            )));

        Ok(())
    })
    .await
}
