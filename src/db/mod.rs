pub mod domain_repo;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;

/// Open a single registry connection, creating the database file if needed.
pub async fn connect(url: &str) -> anyhow::Result<SqliteConnection> {
    let conn = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .connect()
        .await?;
    Ok(conn)
}

/// Bring the schema up to date. Run once at startup.
pub async fn migrate(conn: &mut SqliteConnection) -> anyhow::Result<()> {
    sqlx::migrate!().run(conn).await?;
    Ok(())
}
