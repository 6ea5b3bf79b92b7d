use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workflow_analytics::clock::SystemClock;
use workflow_analytics::notification::webhook::WebhookNotifier;
use workflow_analytics::sla::defaults::default_policies;
use workflow_analytics::{api, config, jobs, notification, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // OTLP export only when an endpoint is configured; stdout logging always.
    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "workflow-analytics"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "workflow_analytics=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Policy { command }) => handle_policy_command(command),
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    notification::spawn_breach_dispatcher(
        alert_rx,
        WebhookNotifier::new()?,
        cfg.webhook_urls.clone(),
        cfg.webhook_secret.clone(),
    );
    tracing::info!(
        webhooks = cfg.webhook_urls.len(),
        "Breach alert dispatcher started"
    );

    let cleanup_every = cfg.cleanup_interval_secs.map(Duration::from_secs);
    let retention_days = cfg.retention_days;
    let state = Arc::new(AppState::new(cfg, Arc::new(SystemClock), Some(alert_tx)));

    if let Some(every) = cleanup_every {
        jobs::cleanup::spawn(state.analytics.clone(), retention_days, every);
        tracing::info!(
            every_secs = every.as_secs(),
            retention_days,
            "Background cleanup job started"
        );
    }

    let app = api::build_router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            let dashboard_origin = std::env::var("DASHBOARD_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("x-request-id"),
                ])
        });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("workflow analytics listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn handle_policy_command(cmd: cli::PolicyCommands) -> anyhow::Result<()> {
    match cmd {
        cli::PolicyCommands::List { workflow_type } => {
            let policies: Vec<_> = default_policies()
                .into_iter()
                .filter(|p| {
                    workflow_type
                        .as_deref()
                        .map_or(true, |wt| p.workflow_type == wt)
                })
                .collect();

            if policies.is_empty() {
                println!("No policies found.");
                return Ok(());
            }

            println!(
                "{:<20} {:<22} {:<6} {:<8} {:<6} RULES",
                "ID", "WORKFLOW TYPE", "STEP", "TARGET", "WARN%"
            );
            for p in policies {
                println!(
                    "{:<20} {:<22} {:<6} {:<8} {:<6} {}",
                    p.id,
                    p.workflow_type,
                    p.step_number,
                    format!("{}h", p.target_hours),
                    p.warning_threshold_percent,
                    p.escalation_rules.len()
                );
            }
        }
    }
    Ok(())
}
