//! MoodTune API Server

use std::path::PathBuf;

use clap::Parser;
use moodtune_api::{build_state, create_router, error::set_expose_internal_details};
use moodtune_core::{config::LoggingConfig, AppConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "moodtune-api", version, about = "MoodTune REST API server")]
struct Args {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, env = "MOODTUNE_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=debug", logging.level).into());

    if logging.json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path.clone())?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;

    init_tracing(&config.logging);
    set_expose_internal_details(config.server.environment.is_development());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        environment = ?config.server.environment,
        store = ?config.database.backend,
        "Starting MoodTune API"
    );

    let state = build_state(config).await?;
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("MoodTune API listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
