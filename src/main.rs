use std::sync::Arc;

use yamdb::{AppState, config::Config, db, mail};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,yamdb=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url).await?;
    let mailer = mail::from_config(config.smtp.as_ref(), config.mail_rps)?;

    let state = Arc::new(AppState::new(config.clone(), db, mailer));
    let app = yamdb::app(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
