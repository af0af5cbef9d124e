//! Pinot Operator
//!
//! Watches `Pinot`, `PinotSchema`, `PinotTable` and `PinotTenant` resources
//! and keeps the Kubernetes workloads and the Pinot controller state in line
//! with them.

use clap::Parser;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pinot_operator::domain::ClusterGatewayRef;
use pinot_operator::{
    ApiServer, ApiServerConfig, ControllerMetrics, Engine, EngineConfig, EngineDeps, Error,
    HttpClusterGateway, KubePlatform, KubeResourceSource, KubeStatusSink, Pinot, PinotSchema,
    PinotTable, PinotTenant, Registries, Result, Sources,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Pinot Operator - reconciles Pinot clusters, schemas, tables and tenants
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// YAML file with engine settings
    #[arg(long, env = "OPERATOR_CONFIG")]
    config: Option<String>,

    /// Seconds between reconciliation passes
    #[arg(long, env = "RECONCILE_INTERVAL")]
    reconcile_interval_secs: Option<u64>,

    /// Seconds to wait before reopening a closed watch
    #[arg(long, env = "WATCH_RETRY_DELAY")]
    watch_retry_delay_secs: Option<u64>,

    /// Upper bound for a single Pinot controller call, in seconds
    #[arg(long, env = "GATEWAY_TIMEOUT")]
    gateway_timeout_secs: Option<u64>,

    /// Field manager for server-side apply
    #[arg(long, env = "FIELD_MANAGER")]
    field_manager: Option<String>,

    /// Only watch this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Print the CRDs as YAML and exit
    #[arg(long)]
    print_crds: bool,
}

impl Args {
    /// File settings (or defaults) with flag overrides applied
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };

        if let Some(secs) = self.reconcile_interval_secs {
            config.reconcile_interval_secs = secs;
        }
        if let Some(secs) = self.watch_retry_delay_secs {
            config.watch_retry_delay_secs = secs;
        }
        if let Some(secs) = self.gateway_timeout_secs {
            config.gateway_timeout_secs = secs;
        }
        if let Some(fm) = &self.field_manager {
            config.field_manager = fm.clone();
        }
        if self.namespace.is_some() {
            config.namespace = self.namespace.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_addr(addr: &str, what: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| Error::Configuration(format!("Invalid {} address {}: {}", what, addr, e)))
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_crds {
        print!("{}", pinot_operator::crd::crds_yaml()?);
        return Ok(());
    }

    init_logging(&args)?;

    let config = args.engine_config()?;
    let api_addr = parse_addr(&args.api_addr, "REST API")?;
    let health_addr = parse_addr(&args.health_addr, "health server")?;
    let metrics_addr = parse_addr(&args.metrics_addr, "metrics server")?;

    info!("Starting Pinot Operator");
    info!("  Version: {}", pinot_operator::VERSION);
    info!("  REST API: {}", api_addr);
    info!("  Reconcile interval: {}s", config.reconcile_interval_secs);
    info!("  Gateway timeout: {}s", config.gateway_timeout_secs);
    info!(
        "  Namespace: {}",
        config.namespace.as_deref().unwrap_or("<all>")
    );

    let client = kube::Client::try_default().await?;
    let metrics = ControllerMetrics::new()
        .map_err(|e| Error::Internal(format!("Failed to register metrics: {}", e)))?;

    let gateway: ClusterGatewayRef = Arc::new(HttpClusterGateway::new(config.gateway_timeout())?);
    let deps = EngineDeps {
        sources: Sources {
            clusters: Arc::new(KubeResourceSource::<Pinot>::new(
                client.clone(),
                config.namespace.clone(),
            )),
            schemas: Arc::new(KubeResourceSource::<PinotSchema>::new(
                client.clone(),
                config.namespace.clone(),
            )),
            tables: Arc::new(KubeResourceSource::<PinotTable>::new(
                client.clone(),
                config.namespace.clone(),
            )),
            tenants: Arc::new(KubeResourceSource::<PinotTenant>::new(
                client.clone(),
                config.namespace.clone(),
            )),
        },
        platform: Arc::new(KubePlatform::new(client.clone(), &config.field_manager)),
        gateway: gateway.clone(),
        status_sink: Arc::new(KubeStatusSink::new(client)),
    };

    let engine = Engine::new(config, deps, metrics.clone());
    let registries = engine.registries();
    let shutdown = CancellationToken::new();

    let health_registries = registries.clone();
    let health_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(health_addr, health_registries, health_shutdown).await {
            error!("Health server error: {}", e);
        }
    });

    let metrics_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(metrics_addr, metrics, metrics_shutdown).await {
            error!("Metrics server error: {}", e);
        }
    });

    let api_server = ApiServer::new(
        ApiServerConfig { rest_addr: api_addr },
        registries,
        gateway,
    );
    let api_handle = tokio::spawn(api_server.run(shutdown.clone()));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal_shutdown.cancel();
    });

    engine.run(shutdown).await;

    match api_handle.await {
        Ok(Err(e)) => error!("REST server error: {}", e),
        Err(e) => error!("REST server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    info!("Operator shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "axum=info"] {
        let directive = directive
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid log directive: {}", e)))?;
        filter = filter.add_directive(directive);
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Health Server
// =============================================================================

fn text_response(status: hyper::StatusCode, body: &'static str) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(hyper::Body::from(body));
    *response.status_mut() = status;
    response
}

async fn run_health_server(
    addr: SocketAddr,
    registries: Arc<Registries>,
    shutdown: CancellationToken,
) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let registries = registries.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let registries = registries.clone();
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => text_response(StatusCode::OK, "ok"),
                        "/readyz" if registries.all_synced() => text_response(StatusCode::OK, "ok"),
                        "/readyz" => {
                            text_response(StatusCode::SERVICE_UNAVAILABLE, "initial list pending")
                        }
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    info!("Health server listening on {}", addr);
    Server::try_bind(&addr)
        .map_err(|e| Error::Internal(format!("Failed to bind health server: {}", e)))?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(
    addr: SocketAddr,
    metrics: ControllerMetrics,
    shutdown: CancellationToken,
) -> Result<()> {
    use hyper::header::CONTENT_TYPE;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};
    use prometheus::{Encoder, TextEncoder};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let metrics = metrics.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match metrics.encode() {
                            Ok(buffer) => {
                                let mut response = Response::new(Body::from(buffer));
                                if let Ok(value) = TextEncoder::new().format_type().parse() {
                                    response.headers_mut().insert(CONTENT_TYPE, value);
                                }
                                response
                            }
                            Err(e) => {
                                error!("Failed to encode metrics: {}", e);
                                text_response(StatusCode::INTERNAL_SERVER_ERROR, "encode failed")
                            }
                        },
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    info!("Metrics server listening on {}", addr);
    Server::try_bind(&addr)
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
