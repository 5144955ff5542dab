//! Integration tests for disposable probe containers

use anyhow::Result;
use pgprobe::config::ContainerConfig;
use pgprobe::docker::{container_name_for, registered_containers};
use sqlx::Connection;
use std::collections::HashMap;

use crate::helpers::docker::{docker_or_skip, with_docker_cleanup};

fn alpine_config() -> ContainerConfig {
    ContainerConfig {
        image: "postgres:16-alpine".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_postgres_container_accepts_queries() -> Result<()> {
    with_docker_cleanup(async {
        let Some(manager) = docker_or_skip().await else {
            return;
        };

        let mut config = alpine_config();
        config
            .environment
            .insert("POSTGRES_PASSWORD".to_string(), "test_password".to_string());
        let name = container_name_for(&config, Some("component"));

        // RAII: the container is removed when `container` goes out of scope
        let container = manager.start_postgres(&config, &name).await.unwrap();

        let url = container.connection_string();
        assert!(url.starts_with("postgres://"));
        assert!(url.contains("test_password"));
        assert!(url.contains("/pgprobe"));
        assert!(registered_containers().contains(&container.info().id));

        let mut conn = sqlx::PgConnection::connect(&url).await.unwrap();
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(one, 1);
        conn.close().await.unwrap();

        let id = container.info().id.clone();
        container.shutdown().await.unwrap();
        assert!(!registered_containers().contains(&id));
    })
    .await;

    Ok(())
}

#[tokio::test]
async fn test_startup_failure_includes_logs() -> Result<()> {
    with_docker_cleanup(async {
        let Some(manager) = docker_or_skip().await else {
            return;
        };

        let config = ContainerConfig {
            environment: HashMap::from([(
                // An invalid initdb flag makes the container exit during startup
                "POSTGRES_INITDB_ARGS".to_string(),
                "--invalid-flag".to_string(),
            )]),
            ready_attempts: 10,
            ready_interval_ms: 500,
            ..alpine_config()
        };
        let name = container_name_for(&config, Some("broken"));

        let result = manager.start_postgres(&config, &name).await;
        let Err(err) = result else {
            panic!("Container with invalid initdb args should not start");
        };

        let message = err.to_string();
        assert!(message.contains("Container logs"), "got: {}", message);
        assert!(message.contains("PGPROBE_KEEP_CONTAINER_ON_FAILURE"));
    })
    .await;

    Ok(())
}

#[tokio::test]
async fn test_shared_container_is_reused_by_name() -> Result<()> {
    with_docker_cleanup(async {
        let Some(manager) = docker_or_skip().await else {
            return;
        };

        let config = ContainerConfig {
            reuse: true,
            container_name: Some(format!(
                "pgprobe_reuse_test_{}",
                uuid::Uuid::new_v4().simple()
            )),
            ..alpine_config()
        };
        let name = container_name_for(&config, None);

        let first = manager.start_postgres(&config, &name).await.unwrap();
        let first_id = first.info().id.clone();
        let first_url = first.into_connection_string();

        let second = manager.start_postgres(&config, &name).await.unwrap();
        assert_eq!(second.info().id, first_id);
        assert_eq!(second.connection_string(), first_url);
    })
    .await;

    Ok(())
}
