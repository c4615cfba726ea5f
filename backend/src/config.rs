use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Optional read replica for list queries; stale reads are
    /// acceptable there, lost writes are not.
    pub read_database_url: Option<String>,
    pub database_max_connections: u32,
    pub default_page_size: i64,
    pub bind_addr: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/marketplace".to_string());

        let read_database_url = env::var("READ_DATABASE_URL").ok().filter(|s| !s.is_empty());

        let database_max_connections: u32 = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| anyhow!("Invalid DATABASE_MAX_CONNECTIONS value"))?;
        if database_max_connections < 1 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }

        let default_page_size: i64 = env::var("DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|_| anyhow!("Invalid DEFAULT_PAGE_SIZE value"))?;
        if default_page_size < 1 {
            return Err(anyhow!("DEFAULT_PAGE_SIZE must be at least 1"));
        }

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(Config {
            database_url,
            read_database_url,
            database_max_connections,
            default_page_size,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_env_is_empty() {
        // Only inspects fields that have hard defaults; DATABASE_URL may
        // be set by the environment running the tests.
        let config = Config::load().expect("load config");
        assert!(config.default_page_size >= 1);
        assert!(config.database_max_connections >= 1);
        assert!(!config.bind_addr.is_empty());
    }
}
