use crate::log_internal;
use anyhow::{anyhow, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;

/// Open (creating if needed) the database and bring its schema up to date.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| anyhow!("Invalid database url `{}`: {}", url, e))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(|e| anyhow!("Could not open database `{}`: {}", url, e))?;

    migrate(&pool).await?;
    log_internal!("Database `{}` ready", url);
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow!("Could not migrate database: {}", e))
}

/// Fresh in-memory database.  One connection, since every sqlite memory connection is its own
/// database.
#[cfg(test)]
pub async fn memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}
