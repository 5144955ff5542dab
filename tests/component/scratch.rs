//! Scratch databases on an existing server

use anyhow::Result;
use pgprobe::constants::SCRATCH_DATABASE_PREFIX;
use pgprobe::db::{ScratchDatabase, registered_scratch_databases};
use sqlx::{Connection, PgConnection};

use crate::helpers::database::database_url_or_skip;

async fn database_exists(base_url: &str, name: &str) -> Result<bool> {
    let mut conn = PgConnection::connect(base_url).await?;
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM pg_database WHERE datname = $1")
        .bind(name)
        .fetch_one(&mut conn)
        .await?;
    conn.close().await?;
    Ok(count == 1)
}

#[tokio::test]
async fn test_scratch_database_lifecycle() -> Result<()> {
    let Some(base_url) = database_url_or_skip() else {
        return Ok(());
    };

    let db = ScratchDatabase::create(&base_url, SCRATCH_DATABASE_PREFIX).await?;
    let name = db.name().to_string();

    assert!(name.starts_with("pgprobe_"), "{}", name);
    assert!(db.url().contains(&format!("/{}", name)));
    assert!(registered_scratch_databases().contains(&name));
    assert!(database_exists(&base_url, &name).await?);

    let mut conn = PgConnection::connect(&db.url()).await?;
    let current: String = sqlx::query_scalar("SELECT current_database()")
        .fetch_one(&mut conn)
        .await?;
    assert_eq!(current, name);
    conn.close().await?;

    db.drop_database().await;

    assert!(!registered_scratch_databases().contains(&name));
    assert!(!database_exists(&base_url, &name).await?);
    Ok(())
}

#[tokio::test]
async fn test_scratch_database_dropped_with_open_session() -> Result<()> {
    let Some(base_url) = database_url_or_skip() else {
        return Ok(());
    };

    let mut admin = PgConnection::connect(&base_url).await?;
    let version: String = sqlx::query_scalar("SELECT current_setting('server_version_num')")
        .fetch_one(&mut admin)
        .await?;
    admin.close().await?;
    if version.parse::<u32>()? < 130000 {
        println!("Skipping - DROP DATABASE ... WITH (FORCE) needs PostgreSQL 13");
        return Ok(());
    }

    let db = ScratchDatabase::create(&base_url, SCRATCH_DATABASE_PREFIX).await?;
    let name = db.name().to_string();

    // A session left behind, e.g. by an interrupted check
    let lingering = PgConnection::connect(&db.url()).await?;

    db.drop_database().await;
    assert!(!database_exists(&base_url, &name).await?);

    drop(lingering);
    Ok(())
}
