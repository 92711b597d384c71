// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Patch, PatchParams},
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use platform_service_gateway::{
    access::{AccessRequestBroker, KubeconfigConnector},
    constants::{
        CONTROLLER_NAME, DEFAULT_METRICS_BIND_ADDRESS, ERROR_REQUEUE_DURATION, TOKIO_WORKER_THREADS,
    },
    context::{Context, Settings},
    crd::{gateway_service_config_crd, Cluster, GatewayServiceConfig},
    errors::Error,
    events::KubeEventPublisher,
    gateway::ClusterIdentity,
    metrics,
    reconcilers::{clusters_to_requeue, reconcile_cluster},
    store::{KubeStore, Registry},
};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] Error);

/// Gateway platform service: provisions Envoy Gateway on inventory clusters
#[derive(Parser, Debug)]
#[command(name = "platform-service-gateway", version, about, long_about = None)]
struct Cli {
    /// Name of this provider, also the name of its `GatewayServiceConfig`
    #[arg(long, env = "PROVIDER_NAME", default_value = "gateway", global = true)]
    provider_name: String,

    /// Namespace the provider runs in
    #[arg(long, env = "POD_NAMESPACE", default_value = "openmcp-system", global = true)]
    provider_namespace: String,

    /// Environment name
    #[arg(long, env = "ENVIRONMENT", default_value = "default", global = true)]
    environment: String,

    /// Address serving `/metrics` and `/healthz`
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS, global = true)]
    metrics_bind_address: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install or update the `GatewayServiceConfig` CRD and exit
    Init,
    /// Run the controller (default)
    Run,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            provider_name: self.provider_name.clone(),
            provider_namespace: self.provider_namespace.clone(),
            environment: self.environment.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("gateway-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Format: timestamp file:line LEVEL message
    // RUST_LOG selects the level (default info), RUST_LOG_FORMAT=json|text the format
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    match cli.command {
        Some(Commands::Init) => init(client).await,
        Some(Commands::Run) | None => run(client, &cli).await,
    }
}

/// Server-side applies the `GatewayServiceConfig` CRD on the platform cluster.
async fn init(client: Client) -> Result<()> {
    let crd = gateway_service_config_crd();
    let name = crd.name_any();
    info!(crd = %name, "Installing GatewayServiceConfig CRD");

    let crds: Api<CustomResourceDefinition> = Api::all(client);
    crds.patch(
        &name,
        &PatchParams::apply(CONTROLLER_NAME).force(),
        &Patch::Apply(&crd),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install {name}: {e}"))?;

    info!(crd = %name, "GatewayServiceConfig CRD installed");
    Ok(())
}

async fn run(client: Client, cli: &Cli) -> Result<()> {
    let settings = cli.settings();
    info!(
        provider = %settings.provider_name,
        namespace = %settings.provider_namespace,
        environment = %settings.environment,
        "Starting gateway platform service"
    );

    let platform = Arc::new(KubeStore::new(client.clone(), Arc::new(Registry::platform())));
    let broker = Arc::new(AccessRequestBroker::new(
        platform.clone(),
        &settings.provider_name,
        Arc::new(KubeconfigConnector::new()),
    ));
    let ctx = Arc::new(Context {
        platform,
        broker,
        events: Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
        settings,
    });

    // The controller and the metrics endpoint should never exit
    tokio::select! {
        result = shutdown_signal() => {
            result?;
            info!("Shutdown signal received, stopping");
            Ok(())
        }
        result = run_cluster_controller(client, ctx) => {
            error!("CRITICAL: Cluster controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Cluster controller exited unexpectedly without error")
        }
        result = serve_metrics(&cli.metrics_bind_address) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Run the `Cluster` controller
///
/// Configuration changes are fanned out to the clusters held in the
/// controller's own `Cluster` cache.
async fn run_cluster_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting Cluster controller");

    let clusters = Api::<Cluster>::all(client.clone());
    let configs = Api::<GatewayServiceConfig>::all(client);

    let controller = Controller::new(clusters, Config::default());
    let cache = controller.store();
    let provider_name = ctx.settings.provider_name.clone();

    controller
        .watches(configs, Config::default(), move |config| {
            clusters_to_requeue(&provider_name, &config, &cache.state())
        })
        .run(reconcile_cluster_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Cluster`
async fn reconcile_cluster_wrapper(
    cluster: Arc<Cluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let id = ClusterIdentity::new(&cluster.namespace().unwrap_or_default(), &cluster.name_any());
    debug!(cluster = %id, "Reconcile wrapper called for Cluster");

    Ok(reconcile_cluster(&ctx, &id).await?)
}

/// Error policy for the `Cluster` controller
fn error_policy(_resource: Arc<Cluster>, _err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    Action::requeue(ERROR_REQUEUE_DURATION)
}

/// Serves `/metrics` and `/healthz`.
async fn serve_metrics(bind_address: &str) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(address = %bind_address, "Serving metrics");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
