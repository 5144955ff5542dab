//! Builtin probes against real PostgreSQL containers

use pgprobe::config::{Config, ContainerConfig};
use pgprobe::probe::{ProbeRunner, builtin_probes};
use pgprobe::report::ProbeStatus;
use rstest::rstest;

use crate::helpers::docker::{docker_or_skip, with_docker_cleanup};

#[rstest]
#[case::simple("simple")]
#[case::jsonb("jsonb")]
#[case::tsvector("tsvector")]
#[case::ltree("ltree")]
#[case::hstore("hstore")]
#[tokio::test]
async fn test_builtin_probe_passes(#[case] name: &str) {
    with_docker_cleanup(async {
        if docker_or_skip().await.is_none() {
            return;
        }

        let probe = builtin_probes()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap();
        let config = Config::default();

        let report = ProbeRunner::new(&config).run(&[probe]).await.unwrap();
        let result = &report.probes[0];

        assert_eq!(
            result.status,
            ProbeStatus::Passed,
            "probe {} did not pass: {:?}",
            name,
            result
        );
        assert!(result.checks.iter().all(|c| c.passed));
    })
    .await;
}

#[tokio::test]
async fn test_builtin_probes_on_newer_image() {
    with_docker_cleanup(async {
        if docker_or_skip().await.is_none() {
            return;
        }

        let config = Config {
            container: ContainerConfig {
                version: Some("16-alpine".to_string()),
                reuse: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let report = ProbeRunner::new(&config)
            .run(&builtin_probes())
            .await
            .unwrap();

        assert_eq!(report.target, "postgres:16-alpine");
        assert!(report.succeeded(), "{:#?}", report.probes);
    })
    .await;
}
