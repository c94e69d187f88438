use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

use estateserver::api_router::configure_api_routes;
use estateserver::config::AppConfig;
use estateserver::shared::state::AppState;
use estateserver::shared::utils::create_conn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let pool = create_conn()?;
    let state = Arc::new(AppState::new(pool, config.clone()));

    let app = configure_api_routes().with_state(state);
    let addr = config.bind_addr();
    info!("estateserver listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
