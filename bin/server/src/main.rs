mod config;
mod error;
mod routes;
mod state;

use axum::routing::get;
use axum::Router;
use config::ServerConfig;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let bind_addr = config.bind_addr.clone();
    let app_state = Arc::new(AppState::new(&config, db_pool));

    let app = Router::new()
        .route("/api/health", get(routes::health::health))
        .route(
            "/api/public-chat",
            get(routes::chat::get_public_chat).post(routes::chat::post_public_chat),
        )
        .route(
            "/api/private-chat",
            get(routes::chat::get_private_chat).post(routes::chat::post_private_chat),
        )
        .route(
            "/api/private-chat/certificate/download/{application_number}",
            get(routes::certificate::download),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
