use axum::{Router, routing::post};
use paypal_gateway::{
    client::{Credentials, InMemoryTokenCache, PaypalClient},
    config::GatewayConfig,
    events::OrderEvents,
    handlers::webhooks::paypal_webhook_handler,
    state::AppState,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:paypal-gateway.db".to_string());
    let bind_addr =
        std::env::var("PAYPAL_GATEWAY_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3001".to_string());

    let client_id = std::env::var("PAYPAL_CLIENT_ID")?;
    let client_secret = std::env::var("PAYPAL_CLIENT_SECRET")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(&pool)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = GatewayConfig::from_env();
    let client = PaypalClient::new(
        config,
        Credentials::new(&client_id, &client_secret),
        Arc::new(InMemoryTokenCache::default()),
    );
    let state = AppState {
        pool,
        client,
        events: OrderEvents::default(),
    };

    let app = Router::new()
        .route("/paypal/webhooks", post(paypal_webhook_handler))
        .with_state(state);

    let addr: SocketAddr = bind_addr.parse()?;
    tracing::info!(%addr, "paypal gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
