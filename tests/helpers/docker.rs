//! Docker test helpers for ensuring proper cleanup

use pgprobe::docker::DockerManager;
use std::future::Future;

/// Run a test with automatic Docker container cleanup
///
/// Containers registered during the test are removed afterwards, even when
/// the test body returned early.
pub async fn with_docker_cleanup<F>(test: F)
where
    F: Future<Output = ()>,
{
    test.await;

    if let Err(e) = pgprobe::docker::cleanup_all_containers().await {
        eprintln!("Warning: Failed to cleanup Docker containers: {}", e);
    }
}

/// A Docker manager, or `None` (with a note on stdout) when no daemon is reachable
pub async fn docker_or_skip() -> Option<DockerManager> {
    match DockerManager::new().await {
        Ok(manager) => Some(manager),
        Err(e) => {
            println!("Skipping Docker test - Docker daemon not available: {}", e);
            None
        }
    }
}
