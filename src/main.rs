// src/main.rs

use std::{net::SocketAddr, sync::Arc, time::Duration};

use codexam::{
    config::Config,
    judge::{JudgeClient, judge0::Judge0Client},
    repository::{Store, postgres::PgStore},
    routes,
    scheduler::Scheduler,
    services::reconciler::Reconciler,
    state::AppState,
};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let judge: Arc<dyn JudgeClient> = Arc::new(
        Judge0Client::new(
            &config.judge_url,
            config.judge_auth_token.clone(),
            Duration::from_secs(config.judge_timeout_secs),
        )
        .expect("Invalid judge configuration"),
    );
    tracing::info!("Judge at {}", config.judge_url);

    // Background grading
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = Arc::new(Reconciler::new(store.clone(), judge.clone()));
    let reconciler_task = Scheduler::new(Duration::from_secs(config.reconcile_interval_secs))
        .spawn(reconciler, shutdown_rx.clone());

    // Create AppState
    let state = AppState {
        config: config.clone(),
        store,
        judge,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .expect("BIND_ADDR must be a socket address");
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Ctrl-C flips the shared shutdown signal for the server and the scheduler.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    // Start the server
    let mut server_shutdown = shutdown_rx;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    })
    .await
    .unwrap();

    let _ = reconciler_task.await;
    tracing::info!("Shutdown complete");
}
