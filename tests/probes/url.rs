//! Runs against an existing server (`PGPROBE_DATABASE_URL`)

use pgprobe::config::{Config, Target};
use pgprobe::db::{InitScript, mask_url_password};
use pgprobe::probe::{Check, Expectation, Probe, ProbeRunner, builtin_probes};
use pgprobe::report::ProbeStatus;
use rstest::rstest;

use crate::helpers::database::database_url_or_skip;

fn url_config(url: String) -> Config {
    Config {
        target: Target::Url(url),
        ..Default::default()
    }
}

fn custom(name: &str, init: Option<&str>, checks: Vec<Check>) -> Probe {
    Probe {
        name: name.to_string(),
        description: String::new(),
        init_script: init.map(|sql| InitScript::builtin(name, sql)),
        checks,
    }
}

#[rstest]
#[case::simple("simple")]
#[case::jsonb("jsonb")]
#[case::tsvector("tsvector")]
#[case::ltree("ltree")]
#[case::hstore("hstore")]
#[tokio::test]
async fn test_builtin_passes_on_existing_server(#[case] name: &str) {
    let Some(url) = database_url_or_skip() else {
        return;
    };

    let builtin = builtin_probes()
        .into_iter()
        .find(|p| p.name == name)
        .unwrap();
    let config = url_config(url.clone());

    let report = ProbeRunner::new(&config).run(&[builtin]).await.unwrap();
    let result = &report.probes[0];

    assert_eq!(result.status, ProbeStatus::Passed, "{}: {:?}", name, result);
    assert_eq!(report.target, mask_url_password(&url));
}

#[tokio::test]
async fn test_existing_server_runs_each_in_scratch_database() {
    let Some(url) = database_url_or_skip() else {
        return;
    };

    let creates = custom(
        "creates",
        Some("CREATE TABLE marker (id int); INSERT INTO marker VALUES (1);"),
        vec![
            Check::new(
                "SELECT count(*) FROM marker",
                Expectation::Scalar {
                    value: "1".to_string(),
                },
            ),
            Check::new(
                "SELECT current_database() LIKE 'pgprobe\\_%'",
                Expectation::Truthy { value: true },
            ),
        ],
    );
    let observes = custom(
        "observes",
        None,
        vec![Check::new(
            "SELECT tablename FROM pg_tables WHERE tablename = 'marker'",
            Expectation::Empty,
        )],
    );

    let config = url_config(url);
    let report = ProbeRunner::new(&config)
        .run(&[creates, observes])
        .await
        .unwrap();

    assert!(report.succeeded(), "{:#?}", report.probes);
}

#[tokio::test]
async fn test_existing_server_timeout_leaves_session_usable() {
    let Some(url) = database_url_or_skip() else {
        return;
    };

    let slow = custom(
        "slow",
        None,
        vec![
            Check::new("SELECT pg_sleep(4)", Expectation::Empty),
            Check::new(
                "SELECT 1",
                Expectation::Scalar {
                    value: "1".to_string(),
                },
            ),
        ],
    );

    let mut config = url_config(url);
    config.probes.query_timeout_secs = 1;

    let report = ProbeRunner::new(&config).run(&[slow]).await.unwrap();
    let checks = &report.probes[0].checks;

    let message = checks[0].message.clone().unwrap();
    assert!(message.contains("timed out after 1s"), "got: {}", message);
    assert!(checks[0].duration_ms < 4000, "{:#?}", checks[0]);
    assert!(checks[1].passed, "{:#?}", checks[1]);
    assert_eq!(report.probes[0].status, ProbeStatus::Failed);
}
