use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use boxoffice_server::config::Config;
use boxoffice_server::routes::create_routes;
use boxoffice_server::services::{NoDiscount, OrderService, ReservationManager};
use boxoffice_server::state::AppState;
use boxoffice_server::store::PgStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let store = Arc::new(PgStore::new(pool));
    let reservations = ReservationManager::new(Arc::clone(&store), config.hold_ttl);
    let orders = OrderService::new(
        Arc::clone(&store),
        reservations.clone(),
        Arc::new(NoDiscount),
    );
    let state = AppState {
        store,
        reservations: reservations.clone(),
        orders,
    };

    // Safety net for deployments without an external sweep scheduler; the
    // /internal/sweep route and this task share the same claim step, so
    // running both is fine.
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match reservations.sweep_expired().await {
                Ok(0) => {}
                Ok(expired) => tracing::info!(expired, "Sweeper expired stale holds"),
                Err(error) => tracing::error!(%error, "Hold sweep failed"),
            }
        }
    });

    let app: Router = create_routes(state);

    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
