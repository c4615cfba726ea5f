use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

pub type DbPool = Arc<PgPool>;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a connection pool capped at `max_connections`. The write pool
/// and the optional read-replica pool are sized independently so heavy
/// list traffic cannot starve acknowledgement writes of connections.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(Arc::new(pool))
}
