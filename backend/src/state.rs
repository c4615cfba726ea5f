use crate::{config::Config, db::connection::DbPool, utils::time::Clock};

#[derive(Clone)]
pub struct AppState {
    pub write_pool: DbPool,
    pub read_pool: Option<DbPool>,
    pub config: Config,
    pub clock: Clock,
}

impl AppState {
    pub fn new(write_pool: DbPool, read_pool: Option<DbPool>, config: Config, clock: Clock) -> Self {
        Self {
            write_pool,
            read_pool,
            config,
            clock,
        }
    }

    /// Returns the read pool if configured, otherwise falls back to the write pool.
    /// Use this for SELECT queries that don't require read-after-write consistency.
    pub fn read_pool(&self) -> &DbPool {
        self.read_pool.as_ref().unwrap_or(&self.write_pool)
    }
}
