mod app;
mod auth;
mod config;
mod db;
mod error;
#[cfg(test)]
mod memory;
mod state;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "bookshelf_auth=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    if let Some(every) = app_state.config.sweep_interval {
        tracing::info!(?every, "starting expired token sweep");
        auth::services::spawn_expiry_sweep(app_state.sessions.tokens().clone(), every);
    }

    let config = app_state.config.clone();
    app::serve(app::build_app(app_state), &config).await
}
