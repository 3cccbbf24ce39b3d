use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tasktrail::config::AppConfig;
use tasktrail::notify::{
    Mailer, NotificationDispatcher, NotificationGate, SmtpMailer, spawn_notification_worker,
};
use tasktrail::store::{LibSqlStore, TaskStore};
use tasktrail::tasks::routes::TaskRouteState;
use tasktrail::tasks::{TaskLifecycle, spawn_overdue_ticker, task_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    eprintln!("tasktrail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   REST API: http://0.0.0.0:{}/tasks", config.http_port);
    eprintln!("   SMTP: {}:{}", config.mail.host, config.mail.port);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn TaskStore> = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Notifications ───────────────────────────────────────────────────
    let mailer: Arc<dyn Mailer> =
        Arc::new(SmtpMailer::new(&config.mail).context("Failed to configure SMTP")?);
    let gate = Arc::new(NotificationGate::new(Arc::clone(&store), mailer));

    let (dispatcher, notify_rx) = NotificationDispatcher::channel(config.notify_queue);
    let _worker_handle = spawn_notification_worker(Arc::clone(&gate), notify_rx);

    // ── Lifecycle ───────────────────────────────────────────────────────
    let lifecycle = Arc::new(TaskLifecycle::new(Arc::clone(&store), gate, dispatcher));

    let _overdue_handle = spawn_overdue_ticker(Arc::clone(&lifecycle), config.overdue_interval);
    eprintln!(
        "   Overdue scan: every {}s",
        config.overdue_interval.as_secs()
    );

    // ── REST server ─────────────────────────────────────────────────────
    let app = task_routes(TaskRouteState { lifecycle })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "REST server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("REST server error")?;

    Ok(())
}
