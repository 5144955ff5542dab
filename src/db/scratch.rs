//! Throwaway databases on an existing PostgreSQL server.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use sqlx::PgPool;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::{connect_to_database, mask_url_password};
use crate::constants::SCRATCH_DROP_TIMEOUT;

/// Replace the database component of a connection URL
///
/// Query parameters (e.g. `?sslmode=disable`) are preserved.
pub fn database_url_for(base_url: &str, database: &str) -> String {
    let (without_query, query) = match base_url.split_once('?') {
        Some((url, query)) => (url, Some(query)),
        None => (base_url, None),
    };

    // Only a slash after the authority separates the database name
    let authority_start = without_query.find("://").map(|i| i + 3).unwrap_or(0);
    let prefix = match without_query[authority_start..].find('/') {
        Some(slash) => &without_query[..authority_start + slash],
        None => without_query,
    };

    match query {
        Some(query) => format!("{}/{}?{}", prefix, database, query),
        None => format!("{}/{}", prefix, database),
    }
}

/// Quote a name as a PostgreSQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A uniquely named database that is dropped on teardown
#[derive(Debug)]
pub struct ScratchDatabase {
    base_url: String,
    name: String,
}

impl ScratchDatabase {
    /// Create `<prefix>_<uuid>` on the server behind `base_url`
    pub async fn create(base_url: &str, prefix: &str) -> Result<Self> {
        let name = format!("{}_{}", prefix, Uuid::new_v4().simple());

        let pool = connect_to_database(base_url, "probe server").await?;
        let created = sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&name)))
            .execute(&pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to create database {} on {}",
                    name,
                    mask_url_password(base_url)
                )
            });
        pool.close().await;
        created?;

        debug!("Created scratch database {}", name);
        register_scratch_database(base_url, &name);

        Ok(Self {
            base_url: base_url.to_string(),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> String {
        database_url_for(&self.base_url, &self.name)
    }

    /// Drop the database - best effort with a timeout
    pub async fn drop_database(self) {
        drop_with_timeout(&self.base_url, self.name()).await;
        unregister_scratch_database(&self.base_url, self.name());
    }
}

async fn drop_with_timeout(base_url: &str, name: &str) {
    match tokio::time::timeout(SCRATCH_DROP_TIMEOUT, drop_scratch(base_url, name)).await {
        Ok(Ok(())) => debug!("Dropped scratch database {}", name),
        Ok(Err(e)) => warn!("Failed to drop scratch database {}: {}", name, e),
        Err(_) => warn!("Timed out dropping scratch database {}", name),
    }
}

async fn drop_scratch(base_url: &str, name: &str) -> Result<(), sqlx::Error> {
    let pool = PgPool::connect(base_url).await?;
    let ident = quote_ident(name);
    // WITH (FORCE) needs PostgreSQL 13+
    let forced = sqlx::query(&format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", ident))
        .execute(&pool)
        .await;
    let result = match forced {
        Ok(_) => Ok(()),
        Err(_) => sqlx::query(&format!("DROP DATABASE IF EXISTS {}", ident))
            .execute(&pool)
            .await
            .map(|_| ()),
    };
    pool.close().await;
    result
}

/// Scratch databases created by this process and not yet dropped, as
/// `(server url, database name)`
static SCRATCH_REGISTRY: Lazy<Mutex<Vec<(String, String)>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

fn registry() -> std::sync::MutexGuard<'static, Vec<(String, String)>> {
    SCRATCH_REGISTRY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn register_scratch_database(base_url: &str, name: &str) {
    let mut entries = registry();
    if !entries.iter().any(|(_, n)| n == name) {
        entries.push((base_url.to_string(), name.to_string()));
    }
}

fn unregister_scratch_database(base_url: &str, name: &str) {
    registry().retain(|(url, n)| !(url == base_url && n == name));
}

/// Names of scratch databases awaiting cleanup
pub fn registered_scratch_databases() -> Vec<String> {
    registry().iter().map(|(_, name)| name.clone()).collect()
}

/// Drop every scratch database that was not torn down, e.g. after Ctrl-C
pub async fn cleanup_all_scratch_databases() {
    let entries = std::mem::take(&mut *registry());
    if entries.is_empty() {
        return;
    }

    info!("Cleaning up {} scratch database(s)", entries.len());

    let drops = entries
        .iter()
        .map(|(base_url, name)| drop_with_timeout(base_url, name));
    futures_util::future::join_all(drops).await;
}
