use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_backend::config::Config;
use marketplace_backend::db::connection::create_pool;
use marketplace_backend::state::AppState;
use marketplace_backend::utils::time::Clock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        read_replica = config.read_database_url.is_some(),
        default_page_size = config.default_page_size,
        bind_addr = %config.bind_addr,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let write_pool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(write_pool.as_ref()).await?;

    let read_pool = match config.read_database_url.as_deref() {
        Some(url) => Some(create_pool(url, config.database_max_connections).await?),
        None => None,
    };

    let state = AppState::new(write_pool, read_pool, config.clone(), Clock::System);
    let app = marketplace_backend::app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
