//! Recap API server binary

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use recap_api::{build_router, AppState, Config};
use recap_billing_core::{BillingService, StripeProvider, UsageGate};
use recap_db::{
    MessageRepository, PoolOptions, ProfileRepository, Repositories, SubscriptionEventRepository,
    SummaryRepository,
};
use recap_llm::OpenAiClient;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("recap_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Recap API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        quota_free = config.quotas.free,
        quota_individual = config.quotas.individual,
        model = %config.llm.model,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool and apply migrations
    let pool = recap_db::create_pool_with_options(
        &config.database_url,
        PoolOptions {
            max_connections: config.database_max_connections,
            ..PoolOptions::default()
        },
    )
    .await?;
    recap_db::run_migrations(&pool).await?;
    tracing::info!("Database pool created");

    let repos = Repositories::new(pool.clone());
    let profiles: Arc<dyn ProfileRepository> = Arc::new(repos.profiles);
    let events: Arc<dyn SubscriptionEventRepository> = Arc::new(repos.events);
    let summaries: Arc<dyn SummaryRepository> = Arc::new(repos.summaries);
    let messages: Arc<dyn MessageRepository> = Arc::new(repos.messages);

    // Services
    let gate = UsageGate::new(Arc::clone(&profiles), config.quotas);
    let provider = Arc::new(StripeProvider::new(config.billing.clone()));
    let billing = BillingService::new(profiles, events, provider, config.billing.clone());
    let generator = Arc::new(OpenAiClient::new(config.llm.clone())?);

    let state = AppState::new(gate, billing, summaries, messages, generator)
        .with_pool(pool)
        .with_request_timeout(config.request_timeout);

    let app = build_router(state, metrics_handle);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    run_http_server(app, http_addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Gate decisions are a few DB round trips; generation is dominated by the model call
    let operation_buckets = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("recap_operation_duration_seconds".to_string()),
            operation_buckets,
        )?
        .install_recorder()?;

    // Register metrics with descriptions
    metrics::describe_counter!(
        "recap_gate_decisions_total",
        "Usage gate decisions by outcome"
    );
    metrics::describe_counter!(
        "recap_webhooks_processed_total",
        "Stripe webhooks processed by event type and outcome"
    );
    metrics::describe_counter!(
        "recap_checkouts_created_total",
        "Total checkout sessions created"
    );
    metrics::describe_histogram!(
        "recap_operation_duration_seconds",
        "Operation latency in seconds by operation and result"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
