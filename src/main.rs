//! Resono's backend web server.

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use resono_backend::{api, db, AppState};

/// # Errors
///
/// See implementation.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let address = dotenvy::var("ADDRESS")?;
    let db_url = dotenvy::var("DATABASE_URL")?;

    tracing::info!("connecting to database");

    let db_pool = db::initialize(&db_url).await?;

    let listener = TcpListener::bind(&address).await?;

    tracing::info!(%address, "listening");

    axum::serve(listener, api::routes::router(AppState { db_pool })).await?;

    Ok(())
}
