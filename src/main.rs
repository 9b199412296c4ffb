#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use studio_booking::{
    api::{self, AppState},
    config::{database, studio},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the studio configuration
    let config_path = studio::get_config_path();
    let studio_config = studio::load_config(&config_path)
        .inspect_err(|e| error!("Failed to load studio configuration from {}: {}", config_path, e))?;
    let clock = studio_config.clock()?;
    info!(
        studio = %studio_config.studio.name,
        timezone = %clock.timezone(),
        "Loaded studio configuration"
    );

    // 4. Initialize database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed configured classes and sessions
    studio::seed_from_config(&db, &studio_config)
        .await
        .inspect_err(|e| error!("Failed to seed studio configuration: {}", e))?;

    // 6. Serve
    let app = api::create_router(AppState { db, clock });
    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Booking service listening on {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
