use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analytics_api::config::ServerConfig;
use analytics_api::router::build_app_router;
use analytics_api::state::AppState;
use analytics_core::blob::LocalBlobStore;
use analytics_core::scheduling::QueueConfig;
use analytics_db::{MemoryStore, PgStore, Store};
use analytics_events::{
    EmailConfig, EmailDelivery, EventBus, LogSink, NotificationRouter, NotificationSink,
};
use analytics_pipeline::{
    recover, AdmissionQueue, PipelineConfig, PipelineExecutor, ProcessRunner, StatusTracker,
    WorkerPool,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "analytics_api=debug,analytics_pipeline=debug,analytics_events=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let queue_config = QueueConfig::from_env().expect("Invalid queue configuration");
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        workers = config.worker_count,
        hard_limit = queue_config.hard_limit,
        hog_threshold = queue_config.hog_threshold,
        "Loaded server configuration"
    );

    // --- Store ---
    let store = open_store(&config).await;

    // --- Blob storage ---
    tokio::fs::create_dir_all(&config.media_root)
        .await
        .expect("Failed to create MEDIA_ROOT");
    let blobs = LocalBlobStore::new(&config.media_root, &config.public_base_url);

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // Spawn notification router (terminal events -> submitter email).
    let sink: Arc<dyn NotificationSink> = match EmailConfig::from_env() {
        Some(email) => {
            tracing::info!(smtp_host = %email.smtp_host, "Email delivery enabled");
            Arc::new(EmailDelivery::new(email))
        }
        None => {
            tracing::info!("SMTP_HOST not set, notifications will only be logged");
            Arc::new(LogSink)
        }
    };
    let router_handle = tokio::spawn(
        NotificationRouter::new(sink, &config.public_base_url).run(event_bus.subscribe_terminal()),
    );

    // --- Pipeline ---
    let queue = AdmissionQueue::new(queue_config);
    let tracker = StatusTracker::new(Arc::clone(&store), Arc::clone(&event_bus));

    let report = recover(&store, &queue, &tracker)
        .await
        .expect("Failed to recover submissions from storage");
    tracing::info!(
        requeued = report.requeued,
        crashed = report.crashed,
        "Startup recovery finished"
    );

    let executor = Arc::new(PipelineExecutor::new(
        Arc::clone(&store),
        Arc::new(ProcessRunner::new(blobs.clone())),
        blobs.clone(),
        tracker,
        pipeline_config,
    ));
    let workers = WorkerPool::start(config.worker_count, queue.clone(), executor);

    // --- App state ---
    let state = AppState {
        store,
        blobs,
        queue,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop taking work and give in-flight submissions time to finish.
    // Anything still queued stays Submitted and is recovered on next start.
    let drained = workers
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if !drained {
        tracing::warn!("Some submissions were still running at shutdown and will be crashed on restart");
    }

    // Drop the event bus so the notification router sees the channel close.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), router_handle).await;
    tracing::info!("Notification router shut down");

    tracing::info!("Graceful shutdown complete");
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise an in-memory store
/// seeded from `CATALOG_PATH`.
async fn open_store(config: &ServerConfig) -> Arc<dyn Store> {
    if let Some(database_url) = &config.database_url {
        let pool = analytics_db::create_pool(database_url)
            .await
            .expect("Failed to connect to database");
        tracing::info!("Database connection pool created");

        analytics_db::health_check(&pool)
            .await
            .expect("Database health check failed");
        tracing::info!("Database health check passed");

        analytics_db::run_migrations(&pool)
            .await
            .expect("Failed to run database migrations");
        tracing::info!("Database migrations applied");

        return Arc::new(PgStore::new(pool));
    }

    let store = match &config.catalog_path {
        Some(path) => MemoryStore::from_json_file(path)
            .await
            .expect("Failed to load CATALOG_PATH"),
        None => {
            tracing::warn!("Neither DATABASE_URL nor CATALOG_PATH is set, job catalog is empty");
            MemoryStore::new(Vec::new()).expect("Empty catalog is valid")
        }
    };
    tracing::info!("Using in-memory store");
    Arc::new(store)
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
