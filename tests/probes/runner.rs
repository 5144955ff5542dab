//! Runner behaviour with custom probes on a shared container

use pgprobe::config::{Config, ContainerConfig};
use pgprobe::db::InitScript;
use pgprobe::probe::{Check, Expectation, Probe, ProbeRunner};
use pgprobe::report::ProbeStatus;

use crate::helpers::docker::{docker_or_skip, with_docker_cleanup};

fn shared_config() -> Config {
    Config {
        container: ContainerConfig {
            image: "postgres:16-alpine".to_string(),
            reuse: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn probe(name: &str, init: Option<&str>, checks: Vec<Check>) -> Probe {
    Probe {
        name: name.to_string(),
        description: String::new(),
        init_script: init.map(|sql| InitScript::builtin(name, sql)),
        checks,
    }
}

#[tokio::test]
async fn test_probes_are_isolated() {
    with_docker_cleanup(async {
        if docker_or_skip().await.is_none() {
            return;
        }

        let creates = probe(
            "creates",
            Some("CREATE TABLE marker (id int); INSERT INTO marker VALUES (1);"),
            vec![Check::new(
                "SELECT count(*) FROM marker",
                Expectation::Scalar {
                    value: "1".to_string(),
                },
            )],
        );
        // A later probe must not see tables created by an earlier one
        let observes = probe(
            "observes",
            None,
            vec![Check::new(
                "SELECT tablename FROM pg_tables WHERE tablename = 'marker'",
                Expectation::Empty,
            )],
        );

        let config = shared_config();
        let report = ProbeRunner::new(&config)
            .run(&[creates, observes])
            .await
            .unwrap();

        assert!(report.succeeded(), "{:#?}", report.probes);
    })
    .await;
}

#[tokio::test]
async fn test_failures_are_reported_and_fail_fast_skips() {
    with_docker_cleanup(async {
        if docker_or_skip().await.is_none() {
            return;
        }

        let failing = probe(
            "failing",
            None,
            vec![Check::new(
                "SELECT 'Dubliners'",
                Expectation::Scalar {
                    value: "Ulysses".to_string(),
                },
            )],
        );
        let broken_init = probe("broken_init", Some("CREATE TABLE ("), vec![]);
        let never_run = probe(
            "never_run",
            None,
            vec![Check::new("SELECT 1", Expectation::Truthy { value: true })],
        );

        let mut config = shared_config();
        let report = ProbeRunner::new(&config)
            .run(&[failing.clone(), broken_init.clone()])
            .await
            .unwrap();

        assert_eq!(report.probes[0].status, ProbeStatus::Failed);
        assert_eq!(
            report.probes[0].checks[0].message.as_deref(),
            Some("expected 'Ulysses', got 'Dubliners'")
        );
        assert_eq!(report.probes[1].status, ProbeStatus::Errored);
        assert!(
            report.probes[1]
                .error
                .as_deref()
                .unwrap()
                .contains("SQL error in 'broken_init'")
        );

        config.probes.fail_fast = true;
        let report = ProbeRunner::new(&config)
            .run(&[failing, never_run])
            .await
            .unwrap();

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.probes[1].status, ProbeStatus::Skipped);
    })
    .await;
}

#[tokio::test]
async fn test_query_timeout_fails_check_and_later_checks_still_run() {
    with_docker_cleanup(async {
        if docker_or_skip().await.is_none() {
            return;
        }

        let slow = probe(
            "slow",
            None,
            vec![
                Check::new("SELECT pg_sleep(5)", Expectation::Empty),
                Check::new(
                    "SELECT 1",
                    Expectation::Scalar {
                        value: "1".to_string(),
                    },
                ),
            ],
        );

        let mut config = shared_config();
        config.probes.query_timeout_secs = 1;

        let report = ProbeRunner::new(&config).run(&[slow]).await.unwrap();
        let checks = &report.probes[0].checks;

        let message = checks[0].message.clone().unwrap();
        assert!(message.contains("timed out"), "got: {}", message);
        assert!(checks[1].passed, "{:#?}", checks[1]);
        assert_eq!(report.probes[0].status, ProbeStatus::Failed);
    })
    .await;
}
