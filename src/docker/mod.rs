//! Disposable PostgreSQL containers for probe runs
//!
//! Containers are started through the Docker Engine API, bound to an
//! auto-assigned port on 127.0.0.1 and tracked in a global registry so they
//! are removed even when a run is interrupted.

use anyhow::{Result, anyhow};
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    LogsOptionsBuilder, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::secret::{ContainerInspectResponse, HostConfig, PortBinding};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ContainerConfig;
use crate::constants::{
    CLEANUP_TIMEOUT, CONTAINER_NAME_PREFIX, DEFAULT_DATABASE, DEFAULT_PASSWORD, DEFAULT_USER,
    KEEP_ON_FAILURE_ENV, POSTGRES_PORT,
};

const HOST: &str = "127.0.0.1";
const LOG_TAIL_LINES: &str = "50";

/// Docker container manager for probe databases
pub struct DockerManager {
    docker: Docker,
}

/// Information about a running PostgreSQL container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ContainerInfo {
    /// Get the connection string for this container
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// Build a Docker-safe container name
///
/// A configured name is used verbatim for shared containers; otherwise the
/// name is `pgprobe_<label>_<uuid>` with the label reduced to characters
/// Docker accepts.
pub fn container_name_for(config: &ContainerConfig, label: Option<&str>) -> String {
    if config.reuse
        && let Some(name) = &config.container_name
    {
        return name.clone();
    }

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    match label {
        Some(label) => {
            let clean: String = label
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            format!("{}_{}_{}", CONTAINER_NAME_PREFIX, clean, &suffix[..12])
        }
        None => format!("{}_{}", CONTAINER_NAME_PREFIX, suffix),
    }
}

/// RAII handle for a probe container; stops and removes it on drop
pub struct PostgresContainer {
    info: ContainerInfo,
    auto_cleanup: bool,
}

impl PostgresContainer {
    pub fn info(&self) -> &ContainerInfo {
        &self.info
    }

    pub fn connection_string(&self) -> String {
        self.info.connection_string()
    }

    /// Consume the handle and return the connection string, leaving the
    /// container running (the global registry still removes it at exit)
    pub fn into_connection_string(mut self) -> String {
        self.auto_cleanup = false;
        self.info.connection_string()
    }

    /// Stop and remove the container without blocking the runtime
    pub async fn shutdown(mut self) -> Result<()> {
        if !self.auto_cleanup {
            return Ok(());
        }
        self.auto_cleanup = false;

        let manager = DockerManager::new().await?;
        match manager.stop_container(&self.info.id, true).await {
            Ok(()) => {
                debug!("Removed container {}", self.info.name);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for PostgresContainer {
    fn drop(&mut self) {
        if !self.auto_cleanup {
            return;
        }

        let container_id = self.info.id.clone();
        unregister_container(&container_id);

        // Block on cleanup so test runtimes do not shut down before it finishes
        let cleanup = std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    debug!("Failed to create runtime for cleanup: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                match DockerManager::new().await {
                    Ok(manager) => match manager.stop_container(&container_id, true).await {
                        Ok(()) => debug!("Cleaned up container {}", container_id),
                        Err(e) if is_not_found(&e) => {}
                        Err(e) => debug!("Failed to clean up container {}: {}", container_id, e),
                    },
                    Err(e) => debug!("Failed to create Docker manager for cleanup: {}", e),
                }
            });
        });

        let _ = cleanup.join();
    }
}

fn is_not_found(error: &anyhow::Error) -> bool {
    let message = error.to_string();
    message.contains("404") || message.contains("No such container")
}

/// Value of `KEY=value` in a container environment list
fn env_value(env: &[String], key: &str) -> Option<String> {
    let prefix = format!("{}=", key);
    env.iter()
        .find_map(|entry| entry.strip_prefix(&prefix))
        .map(str::to_string)
}

/// Environment for a new container; user-provided values win over defaults
fn container_env(config: &ContainerConfig) -> Vec<String> {
    let mut env: Vec<String> = [
        ("POSTGRES_DB", DEFAULT_DATABASE),
        ("POSTGRES_USER", DEFAULT_USER),
        ("POSTGRES_PASSWORD", DEFAULT_PASSWORD),
    ]
    .into_iter()
    .filter(|(key, _)| !config.environment.contains_key(*key))
    .map(|(key, value)| format!("{}={}", key, value))
    .collect();

    let mut custom: Vec<String> = config
        .environment
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    custom.sort();
    env.extend(custom);

    env
}

/// Host port bound to 5432/tcp
fn host_port(inspect: &ContainerInspectResponse) -> Result<u16> {
    let binding = inspect
        .network_settings
        .as_ref()
        .and_then(|settings| settings.ports.as_ref())
        .and_then(|ports| ports.get(POSTGRES_PORT))
        .and_then(|bindings| bindings.as_ref())
        .and_then(|bindings| bindings.first())
        .ok_or_else(|| anyhow!("Container has no host binding for {}", POSTGRES_PORT))?;

    let port = binding
        .host_port
        .as_ref()
        .ok_or_else(|| anyhow!("Host port not set"))?;

    port.parse::<u16>()
        .map_err(|e| anyhow!("Invalid host port '{}': {}", port, e))
}

/// Connection details of a container, read back from its inspect data
fn info_from_inspect(
    inspect: &ContainerInspectResponse,
    container_id: &str,
) -> Result<ContainerInfo> {
    let env = inspect
        .config
        .as_ref()
        .and_then(|c| c.env.clone())
        .unwrap_or_default();

    let name = inspect
        .name
        .as_deref()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_else(|| container_id.to_string());

    Ok(ContainerInfo {
        id: container_id.to_string(),
        name,
        host: HOST.to_string(),
        port: host_port(inspect)?,
        database: env_value(&env, "POSTGRES_DB")
            .or_else(|| env_value(&env, "POSTGRES_USER"))
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        username: env_value(&env, "POSTGRES_USER").unwrap_or_else(|| DEFAULT_USER.to_string()),
        password: env_value(&env, "POSTGRES_PASSWORD")
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
    })
}

impl DockerManager {
    /// Check if Docker is available with detailed debug information
    pub async fn is_available_verbose() -> (bool, String) {
        match Self::try_connect_verbose().await {
            Ok((_, debug_info)) => (true, debug_info),
            Err(e) => (false, format!("Docker not available: {}", e)),
        }
    }

    /// Create a new Docker manager with retry logic
    pub async fn new() -> Result<Self> {
        const MAX_RETRIES: u32 = 5;
        const RETRY_DELAY: Duration = Duration::from_millis(200);

        for attempt in 0..=MAX_RETRIES {
            match Self::try_connect().await {
                Ok(manager) => {
                    if attempt > 0 {
                        debug!("Connected to Docker after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        debug!("Docker not ready ({}), retrying...", e);
                        sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        let (_, debug_info) = Self::is_available_verbose().await;

        Err(anyhow!(
            "Failed to connect to Docker after {} attempts.\n\n{}\nTroubleshooting:\n  - Make sure Docker is running\n  - Set DOCKER_HOST if the daemon socket lives elsewhere\n  - Or pass --database-url to probe an existing server",
            MAX_RETRIES + 1,
            debug_info
        ))
    }

    async fn try_connect() -> Result<Self> {
        for (_description, socket_path) in Self::get_docker_socket_candidates() {
            if let Ok(docker) = Self::try_socket_path(&socket_path).await {
                return Ok(Self { docker });
            }
        }

        // Fall back to bollard's own detection
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| anyhow!("Failed to connect to Docker daemon: {}", e))?;
        docker
            .ping()
            .await
            .map_err(|e| anyhow!("Docker daemon not responding: {}", e))?;

        Ok(Self { docker })
    }

    async fn try_connect_verbose() -> Result<(Self, String)> {
        let mut debug_info = String::from("Docker socket detection:\n");

        for (description, socket_path) in Self::get_docker_socket_candidates() {
            debug_info.push_str(&format!("  • {}: ", description));
            match Self::try_socket_path(&socket_path).await {
                Ok(docker) => {
                    debug_info.push_str(&format!("connected ({})\n", socket_path));
                    return Ok((Self { docker }, debug_info));
                }
                Err(e) => debug_info.push_str(&format!("failed - {}\n", e)),
            }
        }

        debug_info.push_str("  • bollard default detection: ");
        match Docker::connect_with_local_defaults() {
            Ok(docker) => match docker.ping().await {
                Ok(_) => {
                    debug_info.push_str("connected\n");
                    return Ok((Self { docker }, debug_info));
                }
                Err(e) => debug_info.push_str(&format!("failed to ping - {}\n", e)),
            },
            Err(e) => debug_info.push_str(&format!("failed to connect - {}\n", e)),
        }

        Err(anyhow!(
            "Failed to connect to Docker daemon after trying all methods:\n{}",
            debug_info
        ))
    }

    /// Docker socket candidates in priority order
    fn get_docker_socket_candidates() -> Vec<(String, String)> {
        let mut candidates = Vec::new();

        if let Ok(docker_host) = std::env::var("DOCKER_HOST") {
            candidates.push(("DOCKER_HOST environment variable".to_string(), docker_host));
        }

        #[cfg(target_os = "macos")]
        {
            if let Ok(home) = std::env::var("HOME") {
                for (label, path) in [
                    ("macOS Docker Desktop", ".docker/run/docker.sock"),
                    ("Colima", ".colima/default/docker.sock"),
                    ("OrbStack", ".orbstack/run/docker.sock"),
                ] {
                    candidates.push((label.to_string(), format!("unix://{}/{}", home, path)));
                }
            }
        }

        candidates.push((
            "Standard Linux location".to_string(),
            "unix:///var/run/docker.sock".to_string(),
        ));

        candidates
    }

    async fn try_socket_path(socket_path: &str) -> Result<Docker> {
        let Some(socket_file) = socket_path.strip_prefix("unix://") else {
            return Err(anyhow!("Unsupported socket protocol: {}", socket_path));
        };

        let docker = Docker::connect_with_socket(socket_file, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| anyhow!("Failed to connect to socket {}: {}", socket_path, e))?;
        docker
            .ping()
            .await
            .map_err(|e| anyhow!("Socket {} not responding: {}", socket_path, e))?;

        Ok(docker)
    }

    /// Start (or reuse) a PostgreSQL container and wait until it accepts queries
    pub async fn start_postgres(
        &self,
        config: &ContainerConfig,
        container_name: &str,
    ) -> Result<PostgresContainer> {
        if let Some(existing) = self.find_existing_container(container_name).await? {
            if self.is_container_healthy(&existing).await {
                debug!("Reusing healthy container {}", container_name);
                if config.auto_cleanup {
                    register_container(existing.id.clone());
                }
                return Ok(PostgresContainer {
                    info: existing,
                    auto_cleanup: config.auto_cleanup,
                });
            }

            warn!("Existing container {} is unhealthy, removing", container_name);
            self.remove_container(&existing.id, true).await?;
        }

        let image = config.resolved_image();
        self.ensure_image_available(&image).await?;

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            POSTGRES_PORT.to_string(),
            Some(vec![PortBinding {
                host_ip: Some(HOST.to_string()),
                host_port: None, // Docker picks a free port
            }]),
        );

        let body = ContainerCreateBody {
            image: Some(image.clone()),
            env: Some(container_env(config)),
            labels: Some(HashMap::from([(
                CONTAINER_NAME_PREFIX.to_string(),
                "true".to_string(),
            )])),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        info!("Starting {} as {}", image, container_name);

        let container = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(container_name.to_string()),
                    ..Default::default()
                }),
                body,
            )
            .await
            .map_err(|e| anyhow!("Failed to create container: {}", e))?;

        if let Err(e) = self
            .docker
            .start_container(&container.id, None::<StartContainerOptions>)
            .await
        {
            let _ = self.remove_container(&container.id, true).await;
            return Err(anyhow!("Failed to start container: {}", e));
        }

        // Register right away so an interrupted startup is still cleaned up
        if config.auto_cleanup {
            register_container(container.id.clone());
        }

        let info = match self.wait_for_postgres_ready(&container.id, config).await {
            Ok(info) => info,
            Err(readiness_err) => {
                let logs = self.fetch_container_logs(&container.id).await;

                if config.keep_on_failure {
                    unregister_container(&container.id);
                    return Err(anyhow!(
                        "{readiness_err}\n\n\
                         Container logs (last {LOG_TAIL_LINES} lines):\n{logs}\n\n\
                         The container has been kept for debugging:\n  \
                         docker logs {container_name}\n  \
                         docker rm -f {container_name}"
                    ));
                }

                let _ = self.stop_container(&container.id, true).await;
                return Err(anyhow!(
                    "{readiness_err}\n\n\
                     Container logs (last {LOG_TAIL_LINES} lines):\n{logs}\n\n\
                     Tip: set {KEEP_ON_FAILURE_ENV}=1 to keep the container for debugging."
                ));
            }
        };

        info!("PostgreSQL ready on {}:{}", info.host, info.port);

        Ok(PostgresContainer {
            info,
            auto_cleanup: config.auto_cleanup,
        })
    }

    /// Stop and optionally remove a container
    ///
    /// If the stop fails (e.g. the container already exited) removal is
    /// still attempted with force.
    pub async fn stop_container(&self, container_id: &str, remove: bool) -> Result<()> {
        let stop_result = self
            .docker
            .stop_container(container_id, None::<StopContainerOptions>)
            .await;
        unregister_container(container_id);

        match stop_result {
            Ok(()) if remove => self.remove_container(container_id, false).await,
            Ok(()) => Ok(()),
            Err(e) => {
                let error = anyhow!("Failed to stop container: {}", e);
                if remove && !is_not_found(&error) {
                    return self.remove_container(container_id, true).await;
                }
                Err(error)
            }
        }
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| anyhow!("Failed to remove container: {}", e))
    }

    /// Last lines of container output, or a placeholder when unavailable
    async fn fetch_container_logs(&self, container_id: &str) -> String {
        let options = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .tail(LOG_TAIL_LINES)
            .build();

        let log_stream = self.docker.logs(container_id, Some(options));

        match tokio::time::timeout(
            Duration::from_secs(3),
            log_stream.collect::<Vec<Result<LogOutput, _>>>(),
        )
        .await
        {
            Ok(results) => {
                let lines: String = results
                    .into_iter()
                    .filter_map(|r| r.ok())
                    .map(|output| output.to_string())
                    .collect();
                if lines.is_empty() {
                    "(no logs available)".to_string()
                } else {
                    lines
                }
            }
            Err(_) => "(timed out fetching container logs)".to_string(),
        }
    }

    async fn find_existing_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters: Some(HashMap::from([(
                    "name".to_string(),
                    vec![format!("^/{}$", name)],
                )])),
                ..Default::default()
            }))
            .await
            .map_err(|e| anyhow!("Failed to list containers: {}", e))?;

        let Some(id) = containers.first().and_then(|c| c.id.clone()) else {
            return Ok(None);
        };

        let inspect = self
            .docker
            .inspect_container(&id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| anyhow!("Failed to inspect container: {}", e))?;

        // A stopped container has no port binding; treat it as unhealthy
        match info_from_inspect(&inspect, &id) {
            Ok(info) => Ok(Some(info)),
            Err(_) => Ok(Some(ContainerInfo {
                id: id.clone(),
                name: name.to_string(),
                host: HOST.to_string(),
                port: 0,
                database: String::new(),
                username: String::new(),
                password: String::new(),
            })),
        }
    }

    async fn is_container_healthy(&self, info: &ContainerInfo) -> bool {
        if info.port == 0 {
            return false;
        }

        let running = self
            .docker
            .inspect_container(&info.id, None::<InspectContainerOptions>)
            .await
            .ok()
            .and_then(|inspect| inspect.state)
            .is_some_and(|state| state.status == Some(ContainerStateStatusEnum::RUNNING));

        running && Self::try_database_connection(info).await.is_ok()
    }

    /// Single attempt to connect and prove the server can read and write
    async fn try_database_connection(info: &ContainerInfo) -> Result<()> {
        use sqlx::postgres::PgPoolOptions;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&info.connection_string())
            .await
            .map_err(|e| anyhow!("Failed to connect to PostgreSQL: {}", e))?;

        let result = async {
            sqlx::query("SELECT 1").fetch_one(&pool).await?;
            sqlx::query("CREATE TEMPORARY TABLE pgprobe_readiness (id INTEGER)")
                .execute(&pool)
                .await?;
            Ok::<_, sqlx::Error>(())
        }
        .await;

        pool.close().await;
        result.map_err(|e| anyhow!("Readiness query failed: {}", e))
    }

    async fn ensure_image_available(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        info!("Pulling image {}", image);

        let mut pull_stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(image.to_string()),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = pull_stream.next().await {
            result.map_err(|e| anyhow!("Failed to pull image {}: {}", image, e))?;
        }

        debug!("Pulled image {}", image);
        Ok(())
    }

    /// Poll until PostgreSQL answers queries, failing fast if the container exits
    async fn wait_for_postgres_ready(
        &self,
        container_id: &str,
        config: &ContainerConfig,
    ) -> Result<ContainerInfo> {
        let interval = Duration::from_millis(config.ready_interval_ms);
        let max_attempts = config.ready_attempts;

        // The entrypoint restarts the server once after initdb; give it a head start
        sleep(Duration::from_millis(500)).await;

        let mut last_error = anyhow!("no readiness attempt was made");

        for attempt in 1..=max_attempts {
            debug!("Readiness check {}/{}", attempt, max_attempts);

            let inspect = self
                .docker
                .inspect_container(container_id, None::<InspectContainerOptions>)
                .await
                .map_err(|e| anyhow!("Failed to inspect container: {}", e))?;

            if let Some(state) = &inspect.state
                && matches!(
                    state.status,
                    Some(ContainerStateStatusEnum::EXITED) | Some(ContainerStateStatusEnum::DEAD)
                )
            {
                return Err(anyhow!(
                    "PostgreSQL container exited with code {}.",
                    state.exit_code.unwrap_or(-1)
                ));
            }

            match info_from_inspect(&inspect, container_id) {
                Ok(info) => match Self::try_database_connection(&info).await {
                    Ok(()) => {
                        debug!("PostgreSQL ready after {} attempt(s)", attempt);
                        return Ok(info);
                    }
                    Err(e) => {
                        debug!("PostgreSQL not ready yet (attempt {}): {}", attempt, e);
                        last_error = e;
                    }
                },
                Err(e) => {
                    debug!("No connection info yet (attempt {}): {}", attempt, e);
                    last_error = e;
                }
            }

            if attempt < max_attempts {
                sleep(interval).await;
            }
        }

        Err(anyhow!(
            "PostgreSQL failed to become ready after {} attempts. Last error: {}",
            max_attempts,
            last_error
        ))
    }
}

use once_cell::sync::Lazy;
use std::sync::Mutex;

/// Containers to remove at process exit
static CONTAINER_REGISTRY: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn registry() -> std::sync::MutexGuard<'static, Vec<String>> {
    // A panic while holding the lock leaves the list itself intact
    CONTAINER_REGISTRY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register a container for cleanup at process exit
pub fn register_container(container_id: String) {
    let mut ids = registry();
    if !ids.contains(&container_id) {
        ids.push(container_id);
    }
}

/// Unregister a container (when manually cleaned up)
pub fn unregister_container(container_id: &str) {
    registry().retain(|id| id != container_id);
}

/// IDs currently awaiting cleanup
pub fn registered_containers() -> Vec<String> {
    registry().clone()
}

/// Clean up all registered containers
pub async fn cleanup_all_containers() -> Result<()> {
    let container_ids = std::mem::take(&mut *registry());

    if container_ids.is_empty() {
        return Ok(());
    }

    info!("Cleaning up {} container(s)", container_ids.len());

    let tasks: Vec<_> = container_ids
        .into_iter()
        .map(|id| {
            tokio::spawn(async move {
                match DockerManager::new().await {
                    Ok(manager) => match manager.stop_container(&id, true).await {
                        Ok(()) => debug!("Cleaned up container {}", id),
                        Err(e) if is_not_found(&e) => {
                            debug!("Container {} already removed", id)
                        }
                        Err(e) => warn!("Failed to clean up container {}: {}", id, e),
                    },
                    Err(e) => warn!("Failed to create Docker manager for cleanup of {}: {}", id, e),
                }
            })
        })
        .collect();

    if tokio::time::timeout(CLEANUP_TIMEOUT, futures_util::future::join_all(tasks))
        .await
        .is_err()
    {
        warn!(
            "Container cleanup timed out after {} seconds",
            CLEANUP_TIMEOUT.as_secs()
        );
    }

    Ok(())
}
