// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, Resource, ResourceExt,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use threescale_operator::{
    constants::{
        DEFAULT_METRICS_ADDR, ERROR_REQUEUE_DURATION_SECS, KIND_APIMANAGER, KIND_OPENAPI,
        OPERATOR_VERSION, REQUEUE_STEADY_SECS, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::{APIManager, Backend, OpenAPI, Product},
    errors::Error,
    metrics,
    reconcilers::{is_terminal, reconcile_apimanager, reconcile_openapi},
};
use tracing::{debug, error, info, warn};

/// 3scale API Management operator
#[derive(Parser, Debug)]
#[command(name = "threescale-operator", version)]
#[command(about = "Kubernetes operator for the 3scale API management platform")]
struct Args {
    /// Address serving `/metrics` and `/healthz`
    #[arg(long, default_value = DEFAULT_METRICS_ADDR)]
    metrics_addr: SocketAddr,

    /// Namespace to watch; all namespaces when omitted
    #[arg(long)]
    namespace: Option<String>,

    /// Requeue delay in seconds after a retryable reconciliation error
    #[arg(long, default_value_t = ERROR_REQUEUE_DURATION_SECS)]
    error_requeue_secs: u64,
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

impl From<Error> for ReconcileError {
    fn from(e: Error) -> Self {
        Self(e.into())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("threescale-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_tracing() {
    // Respects RUST_LOG if set, otherwise defaults to INFO level.
    // RUST_LOG_FORMAT=json switches to JSON output.
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
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();

    info!(
        version = OPERATOR_VERSION,
        namespace = args.namespace.as_deref().unwrap_or("all"),
        "Starting 3scale operator"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let ctx = Arc::new(Context::new(
        client,
        http_client,
        Duration::from_secs(args.error_requeue_secs),
    ));
    debug!("Controller context created");

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the main process
    tokio::select! {
        result = run_apimanager_controller(ctx.clone(), args.namespace.clone()) => {
            error!("CRITICAL: APIManager controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("APIManager controller exited unexpectedly without error")
        }
        result = run_openapi_controller(ctx.clone(), args.namespace.clone()) => {
            error!("CRITICAL: OpenAPI controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("OpenAPI controller exited unexpectedly without error")
        }
        result = run_metrics_server(args.metrics_addr) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping controllers");
            Ok(())
        }
    }
}

/// Namespaced API for `K`, or cluster-wide when no namespace is watched.
fn watched_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the `APIManager` controller
async fn run_apimanager_controller(ctx: Arc<Context>, namespace: Option<String>) -> Result<()> {
    info!("Starting APIManager controller");

    let ns = namespace.as_deref();
    let api = watched_api::<APIManager>(&ctx.client, ns);

    Controller::new(api, Config::default())
        .owns(watched_api::<Deployment>(&ctx.client, ns), Config::default())
        .owns(
            watched_api::<PodDisruptionBudget>(&ctx.client, ns),
            Config::default(),
        )
        .run(reconcile_apimanager_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `OpenAPI` controller
async fn run_openapi_controller(ctx: Arc<Context>, namespace: Option<String>) -> Result<()> {
    info!("Starting OpenAPI controller");

    let ns = namespace.as_deref();
    let api = watched_api::<OpenAPI>(&ctx.client, ns);

    Controller::new(api, Config::default())
        .owns(watched_api::<Product>(&ctx.client, ns), Config::default())
        .owns(watched_api::<Backend>(&ctx.client, ns), Config::default())
        .run(reconcile_openapi_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Map a reconciler's requested delay to a controller action.
fn requeue_action(kind: &str, reason: &str, requeue: Option<Duration>) -> Action {
    match requeue {
        None => Action::await_change(),
        Some(delay) => {
            if delay < Duration::from_secs(REQUEUE_STEADY_SECS) {
                metrics::record_reconciliation_requeue(kind, reason);
                debug!(kind = kind, reason = reason, delay = ?delay, "Requeueing");
            }
            Action::requeue(delay)
        }
    }
}

/// Reconcile wrapper for `APIManager`
async fn reconcile_apimanager_wrapper(
    apim: Arc<APIManager>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = apim.namespace().unwrap_or_default();
    let name = apim.name_any();

    match reconcile_apimanager(&ctx.store, &namespace, &name).await {
        Ok(outcome) => {
            info!(
                namespace = %namespace,
                name = %name,
                outcome = outcome.reason(),
                "Reconciled APIManager"
            );
            metrics::record_reconciliation_success(KIND_APIMANAGER, start.elapsed());
            Ok(requeue_action(
                KIND_APIMANAGER,
                outcome.reason(),
                outcome.requeue(),
            ))
        }
        Err(e) => {
            error!(namespace = %namespace, name = %name, error = %e, "Failed to reconcile APIManager");
            metrics::record_reconciliation_error(KIND_APIMANAGER, start.elapsed());
            metrics::record_error(KIND_APIMANAGER, e.error_type());
            Err(e.into())
        }
    }
}

/// Reconcile wrapper for `OpenAPI`
async fn reconcile_openapi_wrapper(
    openapi: Arc<OpenAPI>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = openapi.namespace().unwrap_or_default();
    let name = openapi.name_any();

    match reconcile_openapi(&ctx.store, &ctx.http_client, &namespace, &name).await {
        Ok(outcome) => {
            info!(
                namespace = %namespace,
                name = %name,
                outcome = outcome.reason(),
                "Reconciled OpenAPI"
            );
            metrics::record_reconciliation_success(KIND_OPENAPI, start.elapsed());
            Ok(requeue_action(KIND_OPENAPI, outcome.reason(), outcome.requeue()))
        }
        Err(e) => {
            error!(namespace = %namespace, name = %name, error = %e, "Failed to import OpenAPI");
            metrics::record_reconciliation_error(KIND_OPENAPI, start.elapsed());
            metrics::record_error(KIND_OPENAPI, e.error_type());
            Err(e.into())
        }
    }
}

/// Retry policy shared by both controllers.
///
/// Errors that need a user change (invalid spec, unsupported upgrade) are retried at
/// the steady-state interval; everything else after `--error-requeue-secs`.
fn error_policy<K>(resource: Arc<K>, err: &ReconcileError, ctx: Arc<Context>) -> Action
where
    K: Resource,
{
    let terminal = err.0.downcast_ref::<Error>().is_some_and(is_terminal);
    if terminal {
        warn!(
            name = %resource.name_any(),
            error = %err,
            "Reconciliation needs user action, retrying at steady-state interval"
        );
        Action::requeue(Duration::from_secs(REQUEUE_STEADY_SECS))
    } else {
        Action::requeue(ctx.error_requeue)
    }
}

/// Serve Prometheus metrics and a liveness probe.
async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Starting metrics server");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn metrics_handler() -> (StatusCode, String) {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
